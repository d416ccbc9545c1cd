//! End-to-end tests for thread resolution and graph mutation against an
//! in-memory SQLite database: dedup idempotence, node/edge identity,
//! direction, and mailbox-delete cascade.

use std::str::FromStr;

use chrono::{TimeZone, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use egraph::db;
use egraph::mail::decode::DecodedEmail;
use egraph::mail::thread::resolve_threads;
use egraph::models::MailboxConfig;
use egraph::services::{graph_service, mailbox_service};

async fn pool() -> SqlitePool {
    // Single connection: every connection to sqlite::memory: is its own
    // database, so the pool must not open a second one.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(
            SqliteConnectOptions::from_str("sqlite::memory:")
                .unwrap()
                .foreign_keys(true),
        )
        .await
        .unwrap();
    db::migrate(&pool).await.unwrap();
    pool
}

fn mailbox(id: &str, email: &str) -> MailboxConfig {
    MailboxConfig {
        id: id.to_string(),
        email_address: email.to_string(),
        imap_host: "imap.example.com".into(),
        imap_port: 993,
        imap_password: Some(MailboxConfig::encode_password("secret")),
        use_tls: true,
        is_active: true,
        last_synced_at: None,
        created_at: "2026-01-01T00:00:00Z".into(),
    }
}

async fn insert_mailbox(pool: &SqlitePool, mailbox: &MailboxConfig) {
    sqlx::query(
        "INSERT INTO mailboxes (id, email_address, imap_host, imap_port, imap_password, use_tls, is_active) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&mailbox.id)
    .bind(&mailbox.email_address)
    .bind(&mailbox.imap_host)
    .bind(mailbox.imap_port)
    .bind(&mailbox.imap_password)
    .bind(mailbox.use_tls)
    .bind(mailbox.is_active)
    .execute(pool)
    .await
    .unwrap();
}

fn email(message_id: &str, subject: &str, from: &str, to: &str, secs: i64) -> DecodedEmail {
    DecodedEmail {
        message_id: message_id.to_string(),
        subject: subject.to_string(),
        from: from.to_string(),
        to: to.to_string(),
        date: Utc.timestamp_opt(secs, 0).unwrap(),
        body: "hello".into(),
        in_reply_to: None,
    }
}

async fn save(pool: &SqlitePool, mailbox: &MailboxConfig, emails: Vec<DecodedEmail>) {
    let threads = resolve_threads(emails);
    graph_service::save_batch(pool, mailbox, threads)
        .await
        .unwrap();
}

fn two_party_exchange() -> Vec<DecodedEmail> {
    vec![
        email("<m1@x>", "Deal", "Alice <a@x.com>", "Bob <b@y.com>", 100),
        email("<m2@y>", "Re: Deal", "Bob <b@y.com>", "Alice <a@x.com>", 200),
    ]
}

async fn count(pool: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn two_party_thread_builds_the_expected_graph() {
    let pool = pool().await;
    let mb = mailbox("mb1", "a@x.com");
    save(&pool, &mb, two_party_exchange()).await;

    assert_eq!(count(&pool, "conversations").await, 1);
    assert_eq!(count(&pool, "emails").await, 2);
    assert_eq!(count(&pool, "graph_nodes").await, 2);
    assert_eq!(count(&pool, "graph_edges").await, 2);

    let node_ids: Vec<String> = sqlx::query_scalar("SELECT id FROM graph_nodes ORDER BY id")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(node_ids, vec!["client-mb1-b@y.com", "sales-a@x.com"]);

    // Outbound message: sales -> client; inbound reply: client -> sales.
    let edges: Vec<(String, String)> =
        sqlx::query_as("SELECT from_node, to_node FROM graph_edges ORDER BY from_node")
            .fetch_all(&pool)
            .await
            .unwrap();
    assert!(edges.contains(&("sales-a@x.com".into(), "client-mb1-b@y.com".into())));
    assert!(edges.contains(&("client-mb1-b@y.com".into(), "sales-a@x.com".into())));

    let directions: Vec<String> =
        sqlx::query_scalar("SELECT direction FROM emails ORDER BY sent_at")
            .fetch_all(&pool)
            .await
            .unwrap();
    assert_eq!(directions, vec!["outbound", "inbound"]);
}

#[tokio::test]
async fn resync_does_not_duplicate_messages_or_nodes() {
    let pool = pool().await;
    let mb = mailbox("mb1", "a@x.com");
    save(&pool, &mb, two_party_exchange()).await;
    save(&pool, &mb, two_party_exchange()).await;

    assert_eq!(count(&pool, "conversations").await, 1);
    assert_eq!(count(&pool, "emails").await, 2);
    assert_eq!(count(&pool, "graph_nodes").await, 2);
}

#[tokio::test]
async fn concurrent_saves_converge_on_one_conversation() {
    let pool = pool().await;
    let mb = mailbox("mb1", "a@x.com");

    // Two syncs of the same window racing on the same thread must land
    // on the same conversation row via the external_thread_id upsert.
    let spawn_save = |pool: SqlitePool, mb: MailboxConfig| {
        tokio::spawn(async move {
            let threads = resolve_threads(two_party_exchange());
            graph_service::save_batch(&pool, &mb, threads).await
        })
    };
    let first = spawn_save(pool.clone(), mb.clone());
    let second = spawn_save(pool.clone(), mb.clone());
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    assert_eq!(count(&pool, "conversations").await, 1);
    assert_eq!(count(&pool, "emails").await, 2);
    assert_eq!(count(&pool, "graph_nodes").await, 2);
}

#[tokio::test]
async fn reply_prefixes_share_one_conversation() {
    let pool = pool().await;
    let mb = mailbox("mb1", "a@x.com");
    save(
        &pool,
        &mb,
        vec![
            email("<m1@x>", "Pricing", "Alice <a@x.com>", "Bob <b@y.com>", 100),
            email("<m2@y>", "Re: Pricing", "Bob <b@y.com>", "Alice <a@x.com>", 200),
            email("<m3@x>", "FWD: Pricing", "Alice <a@x.com>", "Bob <b@y.com>", 300),
            email("<m4@z>", "Unrelated", "Carol <c@z.com>", "Alice <a@x.com>", 150),
        ],
    )
    .await;

    assert_eq!(count(&pool, "conversations").await, 2);
    let external_id: String = sqlx::query_scalar(
        "SELECT external_thread_id FROM conversations WHERE subject = 'Pricing'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(external_id, "<m1@x>");
}

#[tokio::test]
async fn conversation_counts_are_derived() {
    let pool = pool().await;
    let mb = mailbox("mb1", "a@x.com");
    save(&pool, &mb, two_party_exchange()).await;

    let (email_count, last_email_date): (i64, String) = sqlx::query_as(
        "SELECT email_count, last_email_date FROM conversations WHERE subject = 'Deal'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(email_count, 2);
    assert_eq!(
        last_email_date,
        Utc.timestamp_opt(200, 0).unwrap().to_rfc3339()
    );
}

#[tokio::test]
async fn empty_batch_writes_nothing() {
    let pool = pool().await;
    let mb = mailbox("mb1", "a@x.com");
    save(&pool, &mb, vec![]).await;

    assert_eq!(count(&pool, "conversations").await, 0);
    assert_eq!(count(&pool, "emails").await, 0);
    assert_eq!(count(&pool, "graph_nodes").await, 0);
}

#[tokio::test]
async fn self_reference_sender_name_is_normalized_to_email() {
    let pool = pool().await;
    let mb = mailbox("mb1", "a@x.com");
    save(
        &pool,
        &mb,
        vec![email("<m1@x>", "Note", "you", "Bob <b@y.com>", 100)],
    )
    .await;

    let (sender_email, sender_name): (String, String) =
        sqlx::query_as("SELECT sender_email, sender_name FROM emails")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(sender_name, sender_email);
}

#[tokio::test]
async fn node_upsert_is_last_write_wins() {
    let pool = pool().await;
    let mb = mailbox("mb1", "a@x.com");
    save(
        &pool,
        &mb,
        vec![email("<m1@y>", "Hi", "Bob <b@y.com>", "Alice <a@x.com>", 100)],
    )
    .await;
    save(
        &pool,
        &mb,
        vec![email(
            "<m2@y>",
            "Hi again",
            "Robert <b@y.com>",
            "Alice <a@x.com>",
            200,
        )],
    )
    .await;

    let label: String = sqlx::query_scalar("SELECT label FROM graph_nodes WHERE id = ?")
        .bind("client-mb1-b@y.com")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(label, "Robert");
}

#[tokio::test]
async fn deleting_a_mailbox_removes_only_its_graph() {
    let pool = pool().await;
    let mb1 = mailbox("mb1", "a@x.com");
    let mb2 = mailbox("mb2", "c@z.com");
    insert_mailbox(&pool, &mb1).await;
    insert_mailbox(&pool, &mb2).await;

    save(&pool, &mb1, two_party_exchange()).await;
    save(
        &pool,
        &mb2,
        vec![email("<n1@z>", "Intro", "Carol <c@z.com>", "Dan <d@w.com>", 100)],
    )
    .await;
    assert_eq!(count(&pool, "graph_nodes").await, 4);

    mailbox_service::delete_mailbox(&pool, "mb1").await.unwrap();

    let remaining: Vec<String> = sqlx::query_scalar("SELECT id FROM graph_nodes ORDER BY id")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(remaining, vec!["client-mb2-d@w.com", "sales-c@z.com"]);

    // Edges attached to the removed nodes cascade away; mb2's survive.
    let edges: Vec<(String, String)> = sqlx::query_as("SELECT from_node, to_node FROM graph_edges")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(edges, vec![("sales-c@z.com".into(), "client-mb2-d@w.com".into())]);

    assert_eq!(count(&pool, "mailboxes").await, 1);

    // Deleting again (or deleting an unknown id) is a no-op.
    mailbox_service::delete_mailbox(&pool, "mb1").await.unwrap();
}

#[tokio::test]
async fn sales_view_projects_clients_with_messages() {
    let pool = pool().await;
    let mb = mailbox("mb1", "a@x.com");
    insert_mailbox(&pool, &mb).await;
    save(&pool, &mb, two_party_exchange()).await;

    let view = graph_service::sales_view(&pool, "mb1").await.unwrap();
    assert_eq!(view.name, "a@x.com");
    assert_eq!(view.clients.len(), 1);
    let client = &view.clients[0];
    assert_eq!(client.id, "client-mb1-b@y.com");
    assert_eq!(client.messages.len(), 2);
    assert!(client.messages[0].sent_at <= client.messages[1].sent_at);
}

#[tokio::test]
async fn overview_repairs_sales_labels_and_counts() {
    let pool = pool().await;
    let mb = mailbox("mb1", "a@x.com");
    insert_mailbox(&pool, &mb).await;
    save(&pool, &mb, two_party_exchange()).await;

    // Simulate a legacy node labeled with a self-reference placeholder.
    sqlx::query("UPDATE graph_nodes SET label = 'You' WHERE id = 'sales-a@x.com'")
        .execute(&pool)
        .await
        .unwrap();

    let (nodes, stats) = graph_service::graph_overview(&pool).await.unwrap();
    let sales = nodes.iter().find(|n| n.node_type == "sales").unwrap();
    assert_eq!(sales.label.as_deref(), Some("a@x.com"));
    assert_eq!(sales.metadata["mailboxId"], "mb1");
    assert_eq!(stats.email_count, 2);
    assert_eq!(stats.node_count, 2);
    assert_eq!(stats.connection_count, 2);
}
