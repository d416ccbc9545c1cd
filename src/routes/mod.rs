use axum::routing::{delete, get, patch, post};
use axum::Router;

use crate::AppState;

pub mod data;
pub mod mailboxes;
pub mod summary;
pub mod sync;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/api/emails/connect", post(mailboxes::connect_mailbox))
        .route("/api/emails/sync", post(sync::sync_all_mailboxes))
        .route("/api/mailboxes", get(mailboxes::list_mailboxes))
        .route("/api/mailboxes/:id", patch(mailboxes::update_mailbox))
        .route("/api/mailboxes/:id", delete(mailboxes::delete_mailbox))
        .route("/api/mailboxes/:id/messages", get(mailboxes::mailbox_messages))
        .route("/api/data", get(data::graph_data))
        .route("/api/sales/:id", get(data::sales_conversations))
        .route("/api/summary", post(summary::summarize))
}
