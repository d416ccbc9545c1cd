use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Sales,
    Client,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sales => "sales",
            Self::Client => "client",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct GraphNode {
    pub id: String,
    pub conversation_id: Option<String>,
    pub node_type: String,
    pub label: Option<String>,
    pub metadata: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct GraphEdge {
    pub id: String,
    pub from_node: String,
    pub to_node: String,
    pub label: Option<String>,
    pub created_at: String,
}

/// Sales node identity is a pure function of the mailbox email address.
/// Renaming the backing email therefore orphans the old node (known
/// gap, tolerated; `/api/data` repairs sales metadata from the
/// mailboxes table on read).
pub fn sales_node_id(mailbox_email: &str) -> String {
    format!("sales-{mailbox_email}")
}

/// Client node identity is a pure function of (mailbox id, client
/// email), so each mailbox owns a disjoint `client-{id}-*` namespace.
pub fn client_node_id(mailbox_id: &str, client_email: &str) -> String {
    format!("client-{mailbox_id}-{client_email}")
}
