use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::imap::fetch::fetch_inbox_window;
use crate::mail::decode::decode_message;
use crate::mail::thread::resolve_threads;
use crate::models::MailboxConfig;
use crate::services::graph_service::{self, NodeWithEdges};

/// Per-mailbox outcome; a failed mailbox never fails the batch.
#[derive(Debug, Clone, Serialize)]
pub struct MailboxSyncResult {
    pub success: bool,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MailboxSyncResult {
    fn synced(email: String, count: usize) -> Self {
        Self {
            success: true,
            email,
            count: Some(count),
            error: None,
        }
    }

    fn failed(email: String, error: String) -> Self {
        Self {
            success: false,
            email,
            count: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    pub success: bool,
    pub message: String,
    pub results: Vec<MailboxSyncResult>,
    pub graph_data: Vec<NodeWithEdges>,
}

/// Sync every active mailbox concurrently and aggregate the outcomes.
/// Partial success is still an overall success; per-mailbox detail
/// carries the failures.
pub async fn sync_all(pool: &SqlitePool) -> AppResult<SyncSummary> {
    let mailboxes: Vec<MailboxConfig> =
        sqlx::query_as("SELECT * FROM mailboxes WHERE is_active = 1")
            .fetch_all(pool)
            .await?;

    if mailboxes.is_empty() {
        return Err(AppError::NoActiveMailboxes);
    }

    let total = mailboxes.len();
    info!(mailboxes = total, "starting sync");

    // One task per mailbox; the set is joined to completion so a slow
    // or failing mailbox cannot cancel its siblings.
    let mut tasks = JoinSet::new();
    for mailbox in mailboxes {
        let pool = pool.clone();
        tasks.spawn(async move { sync_mailbox(&pool, mailbox).await });
    }

    let mut results = Vec::with_capacity(total);
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(e) => warn!(error = %e, "sync task panicked"),
        }
    }

    let succeeded = results.iter().filter(|r| r.success).count();
    let graph_data = graph_service::graph_snapshot(pool, 100).await?;

    Ok(SyncSummary {
        success: true,
        message: format!("Synced {succeeded}/{total} mailbox(es)"),
        results,
        graph_data,
    })
}

async fn sync_mailbox(pool: &SqlitePool, mailbox: MailboxConfig) -> MailboxSyncResult {
    let email = mailbox.email_address.clone();
    match sync_mailbox_inner(pool, &mailbox).await {
        Ok(count) => {
            info!(email = %email, count, "mailbox synced");
            MailboxSyncResult::synced(email, count)
        }
        Err(e) => {
            warn!(email = %email, error = %e, "mailbox sync failed");
            MailboxSyncResult::failed(email, e.to_string())
        }
    }
}

/// Transport → decode → thread-resolve → graph-mutate for one mailbox.
/// Returns the number of messages fetched and decoded in this window.
async fn sync_mailbox_inner(pool: &SqlitePool, mailbox: &MailboxConfig) -> AppResult<usize> {
    let password = mailbox.decode_password()?;
    let fetched = fetch_inbox_window(mailbox, &password).await?;

    // Decode failures skip the message, never the batch.
    let mut emails = Vec::with_capacity(fetched.len());
    for message in &fetched {
        match decode_message(message.seq, &message.raw) {
            Ok(email) => emails.push(email),
            Err(e) => warn!(email = %mailbox.email_address, seq = message.seq, error = %e, "skipping undecodable message"),
        }
    }
    let count = emails.len();

    let threads = resolve_threads(emails);
    graph_service::save_batch(pool, mailbox, threads).await?;

    touch_last_synced(pool, &mailbox.email_address).await?;
    Ok(count)
}

async fn touch_last_synced(pool: &SqlitePool, email_address: &str) -> AppResult<()> {
    sqlx::query("UPDATE mailboxes SET last_synced_at = ? WHERE email_address = ?")
        .bind(Utc::now().to_rfc3339())
        .bind(email_address)
        .execute(pool)
        .await?;
    Ok(())
}
