use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::imap::conn::{self, CONNECT_TIMEOUT, VALIDATE_TIMEOUT};
use crate::models::{sales_node_id, MailboxConfig, StoredMessage};

#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    pub email: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    #[serde(default = "default_tls")]
    pub tls: bool,
}

fn default_tls() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub email_address: String,
    pub imap_host: String,
    pub imap_port: u16,
    pub imap_password: Option<String>,
    #[serde(default = "default_tls")]
    pub use_tls: bool,
}

/// Validation-only handshake, then upsert by unique email address.
/// The password is stored encoded; re-connecting an existing address
/// re-activates and re-configures it.
pub async fn connect_and_save(pool: &SqlitePool, req: &ConnectRequest) -> AppResult<()> {
    if req.email.is_empty() || req.password.is_empty() || req.host.is_empty() || req.port == 0 {
        return Err(AppError::Validation("Missing required fields".into()));
    }

    let mut session = conn::connect(
        &req.host,
        req.port,
        &req.email,
        &req.password,
        req.tls,
        CONNECT_TIMEOUT,
    )
    .await?;
    session.logout().await;
    info!(email = %req.email, "IMAP connection validated");

    sqlx::query(
        r#"
        INSERT INTO mailboxes (id, email_address, imap_host, imap_port, imap_password, use_tls, is_active, last_synced_at)
        VALUES (?, ?, ?, ?, ?, ?, 1, ?)
        ON CONFLICT(email_address) DO UPDATE SET
            imap_host = excluded.imap_host,
            imap_port = excluded.imap_port,
            imap_password = excluded.imap_password,
            use_tls = excluded.use_tls,
            is_active = excluded.is_active,
            last_synced_at = excluded.last_synced_at
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&req.email)
    .bind(&req.host)
    .bind(req.port)
    .bind(MailboxConfig::encode_password(&req.password))
    .bind(req.tls)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn list_mailboxes(pool: &SqlitePool) -> AppResult<Vec<MailboxConfig>> {
    let mailboxes = sqlx::query_as("SELECT * FROM mailboxes ORDER BY created_at DESC")
        .fetch_all(pool)
        .await?;
    Ok(mailboxes)
}

pub async fn get_mailbox(pool: &SqlitePool, id: &str) -> AppResult<Option<MailboxConfig>> {
    let mailbox = sqlx::query_as("SELECT * FROM mailboxes WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(mailbox)
}

/// Re-validate with merged (new-or-existing) credentials before
/// persisting anything; a failed handshake rejects the whole update.
pub async fn update_mailbox(pool: &SqlitePool, id: &str, req: &UpdateRequest) -> AppResult<()> {
    let existing = get_mailbox(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Mailbox not found".into()))?;

    let password = match &req.imap_password {
        Some(p) if !p.is_empty() => p.clone(),
        _ => existing.decode_password()?,
    };

    let mut session = conn::connect(
        &req.imap_host,
        req.imap_port,
        &req.email_address,
        &password,
        req.use_tls,
        VALIDATE_TIMEOUT,
    )
    .await?;
    session.logout().await;

    let encoded = req
        .imap_password
        .as_deref()
        .filter(|p| !p.is_empty())
        .map(MailboxConfig::encode_password);

    sqlx::query(
        r#"
        UPDATE mailboxes SET
            email_address = ?,
            imap_host = ?,
            imap_port = ?,
            imap_password = COALESCE(?, imap_password),
            use_tls = ?
        WHERE id = ?
        "#,
    )
    .bind(&req.email_address)
    .bind(&req.imap_host)
    .bind(req.imap_port)
    .bind(encoded)
    .bind(req.use_tls)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Idempotent delete: graph cleanup first (client nodes carry the
/// mailbox id prefix, the sales node carries its email), then the row.
/// Edge rows cascade via the schema's foreign keys. A missing mailbox
/// still deletes by id.
pub async fn delete_mailbox(pool: &SqlitePool, id: &str) -> AppResult<()> {
    let mailbox = get_mailbox(pool, id).await?;

    let mut tx = pool.begin().await?;
    if let Some(mailbox) = &mailbox {
        sqlx::query("DELETE FROM graph_nodes WHERE id LIKE ?")
            .bind(format!("client-{id}-%"))
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM graph_nodes WHERE id = ?")
            .bind(sales_node_id(&mailbox.email_address))
            .execute(&mut *tx)
            .await?;
    }
    sqlx::query("DELETE FROM mailboxes WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(mailbox_id = %id, "mailbox and related graph data deleted");
    Ok(())
}

/// Stored messages projection for one mailbox, newest first.
pub async fn mailbox_messages(
    pool: &SqlitePool,
    id: &str,
) -> AppResult<(String, Vec<StoredMessage>)> {
    let mailbox = get_mailbox(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Mailbox not found for ID: {id}")))?;

    let messages = sqlx::query_as("SELECT * FROM emails ORDER BY sent_at DESC")
        .fetch_all(pool)
        .await?;
    Ok((mailbox.email_address, messages))
}
