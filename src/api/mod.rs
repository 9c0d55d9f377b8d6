pub mod chat_api;
pub mod endpoint;
pub mod link_preview;
