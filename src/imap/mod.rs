pub mod conn;
pub mod fetch;
