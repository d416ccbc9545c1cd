use std::time::Duration;

use serde_json::{json, Value};
use sqlx::SqlitePool;
use tracing::error;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::StoredMessage;

/// Upper bound for the completion call; a slow upstream is reported as
/// a timeout, distinct from an outright failure.
pub const SUMMARY_TIMEOUT: Duration = Duration::from_secs(30);

const ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";

#[derive(Clone)]
pub struct SummarySettings {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
}

impl SummarySettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            endpoint: ENDPOINT.to_string(),
            api_key: config.openrouter_api_key.clone(),
            model: config.openrouter_model.clone(),
        }
    }
}

/// Assemble the conversation transcript and ask the completion endpoint
/// for a short summary. The endpoint itself is an external
/// collaborator; this call is stateless.
pub async fn summarize_conversation(
    pool: &SqlitePool,
    http: &reqwest::Client,
    settings: &SummarySettings,
    conversation_id: &str,
) -> AppResult<String> {
    let emails: Vec<StoredMessage> =
        sqlx::query_as("SELECT * FROM emails WHERE conversation_id = ? ORDER BY sent_at ASC")
            .bind(conversation_id)
            .fetch_all(pool)
            .await?;

    if emails.is_empty() {
        return Err(AppError::NotFound(
            "No emails found for this conversation".into(),
        ));
    }

    let api_key = settings.api_key.as_deref().ok_or_else(|| {
        AppError::Upstream("AI summary is not configured (missing API key)".into())
    })?;

    let transcript = emails
        .iter()
        .enumerate()
        .map(|(i, email)| {
            format!(
                "Email {}:\nFrom: {}\nTo: {}\nSubject: {}\nDate: {}\nBody: {}\n---",
                i + 1,
                email.sender_name.as_deref().unwrap_or(&email.sender_email),
                email
                    .recipient_name
                    .as_deref()
                    .or(email.recipient_email.as_deref())
                    .unwrap_or(""),
                email.subject.as_deref().unwrap_or(""),
                email.sent_at,
                email.body.as_deref().unwrap_or(""),
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let prompt = format!(
        "Analyze this email exchange.\n{transcript}\nProvide a punchy, 2-3 sentence summary focused on the core conversations"
    );

    let body = json!({
        "model": settings.model,
        "messages": [
            {
                "role": "system",
                "content": "You are a concise business analyst. Provide short, punchy summaries that get straight to the point."
            },
            { "role": "user", "content": prompt }
        ]
    });

    let response = http
        .post(&settings.endpoint)
        .bearer_auth(api_key)
        .timeout(SUMMARY_TIMEOUT)
        .json(&body)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                AppError::Upstream("AI generation timed out. Please try again.".into())
            } else {
                AppError::Upstream(format!("AI generation failed: {e}"))
            }
        })?;

    let status = response.status();
    let payload: Value = response
        .json()
        .await
        .map_err(|e| AppError::Upstream(format!("AI generation failed: {e}")))?;

    if !status.is_success() {
        let message = payload
            .pointer("/error/message")
            .and_then(Value::as_str)
            .unwrap_or("AI generation failed. Please check your API key or network connection.");
        error!(%status, message, "completion endpoint rejected the request");
        return Err(AppError::Upstream(message.to_string()));
    }

    payload
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .ok_or_else(|| AppError::Upstream("AI response contained no summary".into()))
}
