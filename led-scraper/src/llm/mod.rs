pub mod client;

pub use client::{ChatBackend, ChatReply, LlmConfig, ReqwestChatBackend};
