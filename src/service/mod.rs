pub mod chat_session;
pub mod countdown;
pub mod hooks;
pub mod runner;
pub mod transform;
