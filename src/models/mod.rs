pub mod conversation;
pub mod graph;
pub mod mailbox;

pub use conversation::{Conversation, Direction, StoredMessage};
pub use graph::{client_node_id, sales_node_id, GraphEdge, GraphNode, NodeKind};
pub use mailbox::MailboxConfig;
