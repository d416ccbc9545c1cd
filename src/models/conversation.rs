use serde::{Deserialize, Serialize};

/// One conversation per distinct external thread identifier (the
/// earliest message's Message-ID within a normalized-subject group).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Conversation {
    pub id: String,
    pub subject: Option<String>,
    pub external_thread_id: Option<String>,
    pub email_count: i64,
    pub last_email_date: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Whether the mailbox owner sent (outbound) or received (inbound).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        }
    }
}

/// A persisted email row. Immutable once inserted; the dedup key is
/// (conversation_id, sender_email, sent_at).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StoredMessage {
    pub id: String,
    pub conversation_id: String,
    pub sender_email: String,
    pub sender_name: Option<String>,
    pub recipient_email: Option<String>,
    pub recipient_name: Option<String>,
    pub direction: String,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub sent_at: String,
    pub created_at: String,
}
