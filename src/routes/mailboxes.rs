use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use crate::error::AppResult;
use crate::models::{MailboxConfig, StoredMessage};
use crate::services::mailbox_service::{self, ConnectRequest, UpdateRequest};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ConnectResponse {
    pub success: bool,
    pub message: String,
    pub email: String,
}

/// POST /api/emails/connect: validation-only handshake, then upsert.
pub async fn connect_mailbox(
    State(state): State<AppState>,
    Json(req): Json<ConnectRequest>,
) -> AppResult<Json<ConnectResponse>> {
    mailbox_service::connect_and_save(&state.pool, &req).await?;
    Ok(Json(ConnectResponse {
        success: true,
        message: "Mailbox connected successfully".into(),
        email: req.email,
    }))
}

#[derive(Debug, Serialize)]
pub struct MailboxListResponse {
    pub success: bool,
    pub mailboxes: Vec<MailboxConfig>,
}

/// GET /api/mailboxes
pub async fn list_mailboxes(State(state): State<AppState>) -> AppResult<Json<MailboxListResponse>> {
    let mailboxes = mailbox_service::list_mailboxes(&state.pool).await?;
    Ok(Json(MailboxListResponse {
        success: true,
        mailboxes,
    }))
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    pub message: String,
}

/// PATCH /api/mailboxes/:id: re-validates merged credentials first.
pub async fn update_mailbox(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateRequest>,
) -> AppResult<Json<StatusResponse>> {
    mailbox_service::update_mailbox(&state.pool, &id, &req).await?;
    Ok(Json(StatusResponse {
        success: true,
        message: "Mailbox updated successfully".into(),
    }))
}

/// DELETE /api/mailboxes/:id: cascades graph cleanup, idempotent.
pub async fn delete_mailbox(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<StatusResponse>> {
    mailbox_service::delete_mailbox(&state.pool, &id).await?;
    Ok(Json(StatusResponse {
        success: true,
        message: "Mailbox and related graph data deleted successfully".into(),
    }))
}

#[derive(Debug, Serialize)]
pub struct MailboxMessagesResponse {
    pub success: bool,
    pub email: String,
    pub messages: Vec<StoredMessage>,
}

/// GET /api/mailboxes/:id/messages: read-only projection.
pub async fn mailbox_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<MailboxMessagesResponse>> {
    let (email, messages) = mailbox_service::mailbox_messages(&state.pool, &id).await?;
    Ok(Json(MailboxMessagesResponse {
        success: true,
        email,
        messages,
    }))
}
