//! Conversation storage.
//!
//! Conversations live in memory only and are identified by UUID. Each one
//! wraps a [`crate::chat::ChatController`]; dropping the conversation (idle
//! timeout or process restart) discards its transcript.
//!
//! # Architecture
//!
//! - [`Conversation`]: a single chat conversation
//! - [`ConversationStore`]: thread-safe store for all live conversations

mod conversation;

pub use conversation::{Conversation, ConversationStore};
