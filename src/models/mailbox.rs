use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// A configured remote mail account. `imap_password` holds the encoded
/// form; callers go through `decode_password` to obtain the secret.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MailboxConfig {
    pub id: String,
    pub email_address: String,
    pub imap_host: String,
    pub imap_port: u16,
    #[serde(skip_serializing)]
    pub imap_password: Option<String>,
    pub use_tls: bool,
    pub is_active: bool,
    pub last_synced_at: Option<String>,
    pub created_at: String,
}

impl MailboxConfig {
    /// Reversible at-rest encoding. The seam where a real cipher plugs
    /// in; storage and sync only ever see the encoded string.
    pub fn encode_password(password: &str) -> String {
        base64::engine::general_purpose::STANDARD.encode(password.as_bytes())
    }

    pub fn decode_password(&self) -> AppResult<String> {
        let encoded = self
            .imap_password
            .as_deref()
            .ok_or_else(|| AppError::Validation("mailbox has no stored password".into()))?;
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| AppError::Validation(format!("stored password is malformed: {e}")))?;
        String::from_utf8(decoded)
            .map_err(|e| AppError::Validation(format!("stored password is malformed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_roundtrip() {
        let mailbox = MailboxConfig {
            id: "mb-1".into(),
            email_address: "a@x.com".into(),
            imap_host: "imap.x.com".into(),
            imap_port: 993,
            imap_password: Some(MailboxConfig::encode_password("hunter2")),
            use_tls: true,
            is_active: true,
            last_synced_at: None,
            created_at: "2026-01-01T00:00:00Z".into(),
        };
        assert_eq!(mailbox.decode_password().unwrap(), "hunter2");
    }

    #[test]
    fn missing_password_is_a_validation_error() {
        let mailbox = MailboxConfig {
            id: "mb-1".into(),
            email_address: "a@x.com".into(),
            imap_host: "imap.x.com".into(),
            imap_port: 993,
            imap_password: None,
            use_tls: true,
            is_active: true,
            last_synced_at: None,
            created_at: "2026-01-01T00:00:00Z".into(),
        };
        assert!(matches!(
            mailbox.decode_password(),
            Err(AppError::Validation(_))
        ));
    }
}
