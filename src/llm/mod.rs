//! OpenAI-compatible chat completion client.
//!
//! The chat page talks to a hosted, OpenAI-compatible endpoint using a
//! per-user bearer token handed out by the connection service. Only the
//! non-streaming `/chat/completions` call is used.
//!
//! # Example
//!
//! ```rust,ignore
//! use brainlink_demo::llm::{CompletionClient, Message};
//!
//! let client = CompletionClient::new("https://www.brainlink.dev/api/v1", token);
//! let completion = client
//!     .create("meta-llama/llama-4-maverick:free", &[Message::user("hello")])
//!     .await?;
//! println!("{:?}", completion.first_content());
//! ```

pub mod chat_completions;

pub use chat_completions::{ChatCompletion, CompletionClient, CompletionError};

use serde::{Deserialize, Serialize};

/// Role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User message.
    User,
    /// Assistant response.
    Assistant,
}

impl MessageRole {
    /// Wire name of the role.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message author.
    pub role: MessageRole,
    /// Text content of the message.
    pub content: String,
}

impl Message {
    /// Create a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_serializes_lowercase_role() {
        let json = serde_json::to_value(Message::assistant("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "assistant", "content": "hi"}));
    }

    #[test]
    fn test_role_display() {
        assert_eq!(MessageRole::User.to_string(), "user");
    }
}
