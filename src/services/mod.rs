pub mod graph_service;
pub mod mailbox_service;
pub mod summary_service;
pub mod sync_service;
