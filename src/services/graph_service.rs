use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::debug;
use uuid::Uuid;

use crate::error::AppResult;
use crate::mail::decode::DecodedEmail;
use crate::mail::thread::Thread;
use crate::models::{
    client_node_id, sales_node_id, Direction, GraphEdge, GraphNode, MailboxConfig, NodeKind,
};

static BRACKETED_ADDR: Lazy<Regex> = Lazy::new(|| Regex::new(r"<(.+?)>").expect("valid regex"));

#[derive(Debug, Default)]
pub struct BatchStats {
    pub threads: usize,
    pub inserted_messages: usize,
}

/// Split a combined "Name <addr>" field into (email, display name).
/// Without brackets the whole text doubles as the address. An empty or
/// self-referencing display name ("you"/"me") is replaced by the email.
pub fn split_address(text: &str) -> (String, String) {
    let email = BRACKETED_ADDR
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| text.trim().to_string());

    let raw_name = text.split('<').next().unwrap_or("").trim();
    let name = normalize_display_name(raw_name, &email);
    (email, name)
}

pub fn normalize_display_name(raw: &str, email: &str) -> String {
    let trimmed = raw.trim();
    let lower = trimmed.to_lowercase();
    if trimmed.is_empty() || lower == "you" || lower == "me" {
        email.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Persist one mailbox's resolved threads: conversations, deduplicated
/// message rows, sales/client nodes and directed edges, all inside a
/// single transaction so a concurrent sync of the same mailbox cannot
/// observe (or create) a half-saved batch.
pub async fn save_batch(
    pool: &SqlitePool,
    mailbox: &MailboxConfig,
    threads: Vec<Thread>,
) -> AppResult<BatchStats> {
    let mut stats = BatchStats {
        threads: threads.len(),
        ..Default::default()
    };

    let mut tx = pool.begin().await?;
    for thread in &threads {
        let conversation_id = upsert_conversation(&mut tx, thread).await?;
        for email in &thread.messages {
            let inserted = save_message(&mut tx, mailbox, &conversation_id, email).await?;
            if inserted {
                stats.inserted_messages += 1;
            }
        }
        refresh_conversation_counts(&mut tx, &conversation_id).await?;
    }
    tx.commit().await?;

    debug!(
        email = %mailbox.email_address,
        threads = stats.threads,
        inserted = stats.inserted_messages,
        "batch saved"
    );
    Ok(stats)
}

/// Atomic lookup-or-create keyed by the unique external thread id; a
/// concurrent sync racing on the same thread lands on the same row.
async fn upsert_conversation(
    tx: &mut Transaction<'_, Sqlite>,
    thread: &Thread,
) -> AppResult<String> {
    let id = Uuid::new_v4().to_string();
    let conversation_id: String = sqlx::query_scalar(
        r#"
        INSERT INTO conversations (id, subject, external_thread_id)
        VALUES (?, ?, ?)
        ON CONFLICT(external_thread_id) DO UPDATE SET updated_at = CURRENT_TIMESTAMP
        RETURNING id
        "#,
    )
    .bind(&id)
    .bind(&thread.key)
    .bind(&thread.external_thread_id)
    .fetch_one(&mut **tx)
    .await?;
    Ok(conversation_id)
}

/// Returns true when a new message row was inserted (false = dedup hit).
/// Graph nodes and the edge are written either way: the graph may have
/// been wiped independently of the emails table and must be repaired.
async fn save_message(
    tx: &mut Transaction<'_, Sqlite>,
    mailbox: &MailboxConfig,
    conversation_id: &str,
    email: &DecodedEmail,
) -> AppResult<bool> {
    let (sender_email, sender_name) = split_address(&email.from);
    let (recipient_email, recipient_name) = split_address(&email.to);
    let is_outbound = sender_email.eq_ignore_ascii_case(&mailbox.email_address);
    let direction = if is_outbound {
        Direction::Outbound
    } else {
        Direction::Inbound
    };
    let sent_at = email.date.to_rfc3339();

    let inserted = sqlx::query(
        r#"
        INSERT INTO emails (
            id, conversation_id, sender_email, sender_name,
            recipient_email, recipient_name, direction, subject, body, sent_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(conversation_id, sender_email, sent_at) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(conversation_id)
    .bind(&sender_email)
    .bind(&sender_name)
    .bind(&recipient_email)
    .bind(&recipient_name)
    .bind(direction.as_str())
    .bind(&email.subject)
    .bind(&email.body)
    .bind(&sent_at)
    .execute(&mut **tx)
    .await?
    .rows_affected()
        > 0;

    upsert_graph(
        tx,
        mailbox,
        conversation_id,
        email,
        &sender_email,
        &recipient_email,
        is_outbound,
    )
    .await?;

    Ok(inserted)
}

#[allow(clippy::too_many_arguments)]
async fn upsert_graph(
    tx: &mut Transaction<'_, Sqlite>,
    mailbox: &MailboxConfig,
    conversation_id: &str,
    email: &DecodedEmail,
    sender_email: &str,
    recipient_email: &str,
    is_outbound: bool,
) -> AppResult<()> {
    let sales_id = sales_node_id(&mailbox.email_address);
    upsert_node(
        tx,
        &sales_id,
        conversation_id,
        NodeKind::Sales,
        &mailbox.email_address,
        &json!({ "email": mailbox.email_address, "mailboxId": mailbox.id }),
    )
    .await?;

    let client_email = if is_outbound { recipient_email } else { sender_email };
    let raw_client_name = if is_outbound {
        email.to.split('<').next().unwrap_or("").trim()
    } else {
        email.from.split('<').next().unwrap_or("").trim()
    };
    let client_name = normalize_display_name(raw_client_name, client_email);
    let client_id = client_node_id(&mailbox.id, client_email);
    upsert_node(
        tx,
        &client_id,
        conversation_id,
        NodeKind::Client,
        &client_name,
        &json!({ "email": client_email }),
    )
    .await?;

    let (from_node, to_node) = if is_outbound {
        (&sales_id, &client_id)
    } else {
        (&client_id, &sales_id)
    };

    // Edge ids are random; the IGNORE guards against collision only,
    // multiple edges between the same pair are expected and kept.
    sqlx::query(
        "INSERT OR IGNORE INTO graph_edges (id, from_node, to_node, label) VALUES (?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(from_node)
    .bind(to_node)
    .bind(&email.subject)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Identity is stable, so repeated syncs overwrite label/metadata
/// in place (last-write-wins) instead of creating duplicates.
async fn upsert_node(
    tx: &mut Transaction<'_, Sqlite>,
    id: &str,
    conversation_id: &str,
    node_type: NodeKind,
    label: &str,
    metadata: &Value,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO graph_nodes (id, conversation_id, node_type, label, metadata)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            label = excluded.label,
            metadata = excluded.metadata
        "#,
    )
    .bind(id)
    .bind(conversation_id)
    .bind(node_type.as_str())
    .bind(label)
    .bind(metadata.to_string())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn refresh_conversation_counts(
    tx: &mut Transaction<'_, Sqlite>,
    conversation_id: &str,
) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE conversations SET
            email_count = (SELECT COUNT(*) FROM emails WHERE conversation_id = ?),
            last_email_date = (SELECT MAX(sent_at) FROM emails WHERE conversation_id = ?)
        WHERE id = ?
        "#,
    )
    .bind(conversation_id)
    .bind(conversation_id)
    .bind(conversation_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct NodeWithEdges {
    pub id: String,
    pub conversation_id: Option<String>,
    pub node_type: String,
    pub label: Option<String>,
    pub metadata: Value,
    pub created_at: String,
    pub edges_from: Vec<GraphEdge>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphStats {
    pub email_count: i64,
    pub node_count: i64,
    pub connection_count: i64,
}

/// Nodes with their outgoing edges, capped for display.
pub async fn graph_snapshot(pool: &SqlitePool, limit: i64) -> AppResult<Vec<NodeWithEdges>> {
    let nodes: Vec<GraphNode> = sqlx::query_as("SELECT * FROM graph_nodes LIMIT ?")
        .bind(limit)
        .fetch_all(pool)
        .await?;

    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        let edges_from: Vec<GraphEdge> =
            sqlx::query_as("SELECT * FROM graph_edges WHERE from_node = ?")
                .bind(&node.id)
                .fetch_all(pool)
                .await?;
        let metadata = node
            .metadata
            .as_deref()
            .and_then(|m| serde_json::from_str(m).ok())
            .unwrap_or_else(|| json!({}));
        out.push(NodeWithEdges {
            id: node.id,
            conversation_id: node.conversation_id,
            node_type: node.node_type,
            label: node.label,
            metadata,
            created_at: node.created_at,
            edges_from,
        });
    }
    Ok(out)
}

/// Snapshot plus aggregate stats, with sales-node label/metadata
/// repaired from the mailboxes table (covers graphs written before a
/// mailbox re-configuration).
pub async fn graph_overview(pool: &SqlitePool) -> AppResult<(Vec<NodeWithEdges>, GraphStats)> {
    let mut nodes = graph_snapshot(pool, 50).await?;

    for node in &mut nodes {
        if node.node_type != "sales" {
            continue;
        }
        let key = node.id.trim_start_matches("sales-").to_string();
        let mailbox: Option<(String, String)> = sqlx::query_as(
            "SELECT id, email_address FROM mailboxes WHERE email_address = ? OR id = ?",
        )
        .bind(&key)
        .bind(&key)
        .fetch_optional(pool)
        .await?;

        if let Some((mailbox_id, email_address)) = mailbox {
            if let Value::Object(map) = &mut node.metadata {
                map.insert("mailboxId".into(), json!(mailbox_id));
                map.insert("email".into(), json!(email_address));
            }
            let label_missing = node
                .label
                .as_deref()
                .map(|l| l.is_empty() || l.eq_ignore_ascii_case("you"))
                .unwrap_or(true);
            if label_missing {
                node.label = Some(email_address);
            }
        }
    }

    let email_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM emails")
        .fetch_one(pool)
        .await?;
    let connection_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM graph_edges")
        .fetch_one(pool)
        .await?;
    let stats = GraphStats {
        email_count,
        node_count: nodes.len() as i64,
        connection_count,
    };
    Ok((nodes, stats))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesClient {
    pub id: String,
    pub name: String,
    pub conversation_id: Option<String>,
    pub messages: Vec<crate::models::StoredMessage>,
}

#[derive(Debug, Serialize)]
pub struct SalesView {
    pub id: String,
    pub name: String,
    pub clients: Vec<SalesClient>,
}

/// Sales-scoped projection: the mailbox's client nodes (anything that
/// shares an edge with its sales node) with each client conversation's
/// messages ascending. Read-only.
pub async fn sales_view(pool: &SqlitePool, mailbox_id: &str) -> AppResult<SalesView> {
    let email: Option<String> =
        sqlx::query_scalar("SELECT email_address FROM mailboxes WHERE id = ?")
            .bind(mailbox_id)
            .fetch_optional(pool)
            .await?;
    let email =
        email.ok_or_else(|| crate::error::AppError::NotFound("Mailbox not found".into()))?;

    let sales_id = sales_node_id(&email);
    let clients: Vec<(String, Option<String>, Option<String>, Option<String>)> = sqlx::query_as(
        r#"
        SELECT DISTINCT gn.id, gn.label, gn.metadata, gn.conversation_id
        FROM graph_nodes gn
        JOIN graph_edges ge ON (gn.id = ge.from_node OR gn.id = ge.to_node)
        WHERE gn.node_type = 'client'
          AND (ge.from_node = ? OR ge.to_node = ?)
        "#,
    )
    .bind(&sales_id)
    .bind(&sales_id)
    .fetch_all(pool)
    .await?;

    let mut out = Vec::with_capacity(clients.len());
    for (id, label, metadata, conversation_id) in clients {
        let messages = match &conversation_id {
            Some(conversation_id) => {
                sqlx::query_as(
                    "SELECT * FROM emails WHERE conversation_id = ? ORDER BY sent_at ASC",
                )
                .bind(conversation_id)
                .fetch_all(pool)
                .await?
            }
            None => Vec::new(),
        };
        let name = label
            .filter(|l| !l.is_empty())
            .or_else(|| {
                metadata
                    .as_deref()
                    .and_then(|m| serde_json::from_str::<Value>(m).ok())
                    .and_then(|v| v.get("email").and_then(Value::as_str).map(String::from))
            })
            .unwrap_or_else(|| "Unknown Client".to_string());
        out.push(SalesClient {
            id,
            name,
            conversation_id,
            messages,
        });
    }

    Ok(SalesView {
        id: mailbox_id.to_string(),
        name: email,
        clients: out,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_bracketed_address() {
        let (email, name) = split_address("Alice Jones <a@x.com>");
        assert_eq!(email, "a@x.com");
        assert_eq!(name, "Alice Jones");
    }

    #[test]
    fn bare_address_doubles_as_name() {
        let (email, name) = split_address("b@y.com");
        assert_eq!(email, "b@y.com");
        assert_eq!(name, "b@y.com");
    }

    #[test]
    fn self_reference_names_become_the_email() {
        let (email, name) = split_address("you <a@x.com>");
        assert_eq!(email, "a@x.com");
        assert_eq!(name, "a@x.com");
        let (_, name) = split_address("Me <a@x.com>");
        assert_eq!(name, "a@x.com");
    }

    #[test]
    fn empty_display_name_becomes_the_email() {
        let (email, name) = split_address(" <a@x.com>");
        assert_eq!(email, "a@x.com");
        assert_eq!(name, "a@x.com");
    }
}
