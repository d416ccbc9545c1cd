pub mod decode;
pub mod thread;
