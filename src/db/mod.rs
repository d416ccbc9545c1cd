use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::error::AppResult;

/// One statement per table so a partially-created schema from an older
/// build does not abort the whole migration.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS mailboxes (
        id TEXT PRIMARY KEY,
        email_address TEXT NOT NULL UNIQUE,
        imap_host TEXT NOT NULL,
        imap_port INTEGER NOT NULL,
        imap_password TEXT,
        use_tls BOOLEAN NOT NULL DEFAULT 1,
        is_active BOOLEAN NOT NULL DEFAULT 1,
        last_synced_at TEXT,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS conversations (
        id TEXT PRIMARY KEY,
        subject TEXT,
        external_thread_id TEXT UNIQUE,
        email_count INTEGER NOT NULL DEFAULT 0,
        last_email_date TEXT,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS emails (
        id TEXT PRIMARY KEY,
        conversation_id TEXT NOT NULL,
        sender_email TEXT NOT NULL,
        sender_name TEXT,
        recipient_email TEXT,
        recipient_name TEXT,
        direction TEXT NOT NULL,
        subject TEXT,
        body TEXT,
        sent_at TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY (conversation_id) REFERENCES conversations (id)
            ON DELETE CASCADE ON UPDATE CASCADE
    )
    "#,
    // Cross-sync dedup key: repeated syncs must not duplicate a message.
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_emails_dedup
        ON emails (conversation_id, sender_email, sent_at)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS graph_nodes (
        id TEXT PRIMARY KEY,
        conversation_id TEXT,
        node_type TEXT NOT NULL,
        label TEXT,
        metadata TEXT,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY (conversation_id) REFERENCES conversations (id)
            ON DELETE CASCADE ON UPDATE CASCADE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS graph_edges (
        id TEXT PRIMARY KEY,
        from_node TEXT NOT NULL,
        to_node TEXT NOT NULL,
        label TEXT,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY (from_node) REFERENCES graph_nodes (id)
            ON DELETE CASCADE ON UPDATE CASCADE,
        FOREIGN KEY (to_node) REFERENCES graph_nodes (id)
            ON DELETE CASCADE ON UPDATE CASCADE
    )
    "#,
];

pub async fn connect(database_url: &str) -> AppResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| crate::error::AppError::Persistence(e.to_string()))?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

pub async fn migrate(pool: &SqlitePool) -> AppResult<()> {
    for stmt in SCHEMA {
        sqlx::query(stmt).execute(pool).await?;
    }
    Ok(())
}
