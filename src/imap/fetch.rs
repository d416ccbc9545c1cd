use tracing::info;

use crate::error::AppResult;
use crate::imap::conn::{self, CONNECT_TIMEOUT};
use crate::models::MailboxConfig;

/// Bounded recent window; full-history backfill is out of scope.
pub const FETCH_WINDOW: u32 = 50;

pub struct FetchedMessage {
    pub seq: u32,
    pub raw: Vec<u8>,
}

/// Newest `FETCH_WINDOW` messages by sequence number.
fn window_range(total: u32) -> String {
    if total > FETCH_WINDOW {
        format!("{}:{}", total - FETCH_WINDOW + 1, total)
    } else {
        "1:*".to_string()
    }
}

/// Connect, select INBOX read-only and pull the recent window as raw
/// RFC822 bytes. An empty inbox is an empty result, not an error; any
/// transport error aborts this mailbox only.
pub async fn fetch_inbox_window(
    mailbox: &MailboxConfig,
    password: &str,
) -> AppResult<Vec<FetchedMessage>> {
    let mut session = conn::connect(
        &mailbox.imap_host,
        mailbox.imap_port,
        &mailbox.email_address,
        password,
        mailbox.use_tls,
        CONNECT_TIMEOUT,
    )
    .await?;

    let total = match session.examine_inbox().await {
        Ok(total) => total,
        Err(e) => {
            session.logout().await;
            return Err(e);
        }
    };

    if total == 0 {
        info!(email = %mailbox.email_address, "inbox is empty, nothing to fetch");
        session.logout().await;
        return Ok(Vec::new());
    }

    let range = window_range(total);
    info!(email = %mailbox.email_address, total, range = %range, "fetching inbox window");

    let fetched = session.fetch_raw(&range).await;
    session.logout().await;

    Ok(fetched?
        .into_iter()
        .map(|(seq, raw)| FetchedMessage { seq, raw })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_covers_everything_when_small() {
        assert_eq!(window_range(1), "1:*");
        assert_eq!(window_range(50), "1:*");
    }

    #[test]
    fn window_takes_newest_fifty() {
        assert_eq!(window_range(51), "2:51");
        assert_eq!(window_range(200), "151:200");
    }
}
