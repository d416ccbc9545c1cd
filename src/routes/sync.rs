use axum::extract::State;
use axum::Json;

use crate::error::AppResult;
use crate::services::sync_service::{self, SyncSummary};
use crate::AppState;

/// POST /api/emails/sync: sync every active mailbox concurrently and
/// return the aggregate summary with a refreshed graph view.
pub async fn sync_all_mailboxes(State(state): State<AppState>) -> AppResult<Json<SyncSummary>> {
    let summary = sync_service::sync_all(&state.pool).await?;
    Ok(Json(summary))
}
