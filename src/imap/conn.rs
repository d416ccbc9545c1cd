use std::fmt::Debug;
use std::time::Duration;

use async_imap::types::Fetch;
use async_imap::Session;
use futures::StreamExt;
use native_tls::TlsConnector;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_native_tls::TlsStream;

use crate::error::{AppError, AppResult};

/// Upper bound for connect + auth. A mailbox that cannot be reached in
/// this window fails with `Connection` and does not block siblings.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(60);

/// Shorter bound for validation-only handshakes (configure/update).
pub const VALIDATE_TIMEOUT: Duration = Duration::from_secs(10);

type TlsSession = Session<TlsStream<TcpStream>>;
type PlainSession = Session<TcpStream>;

/// An authenticated IMAP session over either transport. The mailbox
/// row's TLS flag picks the arm; everything downstream is identical.
pub enum MailSession {
    Tls(TlsSession),
    Plain(PlainSession),
}

pub async fn connect(
    host: &str,
    port: u16,
    user: &str,
    password: &str,
    use_tls: bool,
    timeout: Duration,
) -> AppResult<MailSession> {
    tokio::time::timeout(timeout, establish(host, port, user, password, use_tls))
        .await
        .map_err(|_| {
            AppError::Connection(format!(
                "timed out after {}s connecting to {host}:{port}",
                timeout.as_secs()
            ))
        })?
}

async fn establish(
    host: &str,
    port: u16,
    user: &str,
    password: &str,
    use_tls: bool,
) -> AppResult<MailSession> {
    let tcp = TcpStream::connect((host, port))
        .await
        .map_err(|e| AppError::Connection(format!("{host}:{port}: {e}")))?;

    if use_tls {
        let connector = TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| AppError::Connection(e.to_string()))?;
        let connector = tokio_native_tls::TlsConnector::from(connector);
        let tls_stream = connector
            .connect(host, tcp)
            .await
            .map_err(|e| AppError::Connection(format!("TLS handshake failed: {e}")))?;
        let client = async_imap::Client::new(tls_stream);
        let session = client
            .login(user, password)
            .await
            .map_err(|(e, _)| AppError::Connection(format!("login failed: {e}")))?;
        Ok(MailSession::Tls(session))
    } else {
        let client = async_imap::Client::new(tcp);
        let session = client
            .login(user, password)
            .await
            .map_err(|(e, _)| AppError::Connection(format!("login failed: {e}")))?;
        Ok(MailSession::Plain(session))
    }
}

impl MailSession {
    /// Select INBOX read-only; returns the total message count.
    pub async fn examine_inbox(&mut self) -> AppResult<u32> {
        match self {
            Self::Tls(session) => examine_inbox(session).await,
            Self::Plain(session) => examine_inbox(session).await,
        }
    }

    /// Fetch raw RFC822 bytes for a sequence range, in arrival order.
    pub async fn fetch_raw(&mut self, range: &str) -> AppResult<Vec<(u32, Vec<u8>)>> {
        match self {
            Self::Tls(session) => fetch_raw(session, range).await,
            Self::Plain(session) => fetch_raw(session, range).await,
        }
    }

    pub async fn logout(&mut self) {
        match self {
            Self::Tls(session) => {
                let _ = session.logout().await;
            }
            Self::Plain(session) => {
                let _ = session.logout().await;
            }
        }
    }
}

async fn examine_inbox<T>(session: &mut Session<T>) -> AppResult<u32>
where
    T: AsyncRead + AsyncWrite + Unpin + Debug + Send,
{
    let mailbox = session
        .examine("INBOX")
        .await
        .map_err(|e| AppError::Connection(format!("failed to select INBOX: {e}")))?;
    Ok(mailbox.exists)
}

async fn fetch_raw<T>(session: &mut Session<T>, range: &str) -> AppResult<Vec<(u32, Vec<u8>)>>
where
    T: AsyncRead + AsyncWrite + Unpin + Debug + Send,
{
    let mut out = Vec::new();
    {
        let mut stream = session
            .fetch(range, "(RFC822)")
            .await
            .map_err(|e| AppError::Connection(format!("fetch failed: {e}")))?;
        while let Some(item) = stream.next().await {
            let fetch: Fetch =
                item.map_err(|e| AppError::Connection(format!("fetch failed: {e}")))?;
            if let Some(body) = fetch.body() {
                out.push((fetch.message, body.to_vec()));
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Both transport arms must satisfy the session bounds and be
    // movable into spawned sync tasks.
    #[test]
    fn sessions_cross_task_boundaries() {
        fn assert_send<T: Send>() {}
        assert_send::<TlsSession>();
        assert_send::<PlainSession>();
        assert_send::<MailSession>();
    }
}
