use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::services::summary_service;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeRequest {
    #[serde(default)]
    pub conversation_id: String,
}

#[derive(Debug, Serialize)]
pub struct SummarizeResponse {
    pub success: bool,
    pub summary: String,
}

/// POST /api/summary: assemble the conversation transcript and call
/// the completion endpoint.
pub async fn summarize(
    State(state): State<AppState>,
    Json(req): Json<SummarizeRequest>,
) -> AppResult<Json<SummarizeResponse>> {
    if req.conversation_id.is_empty() {
        return Err(AppError::Validation("Conversation ID is required".into()));
    }
    let summary = summary_service::summarize_conversation(
        &state.pool,
        &state.http,
        &state.summary,
        &req.conversation_id,
    )
    .await?;
    Ok(Json(SummarizeResponse {
        success: true,
        summary,
    }))
}
