//! Append-only conversation transcript.

use serde::Serialize;

use crate::llm::Message;

/// Ordered chat turns. Entries are never edited or removed once pushed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The transcript followed by `next`, without modifying the transcript.
    #[must_use]
    pub fn outbound_with(&self, next: Message) -> Vec<Message> {
        let mut outbound = Vec::with_capacity(self.messages.len() + 1);
        outbound.extend_from_slice(&self.messages);
        outbound.push(next);
        outbound
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MessageRole;

    #[test]
    fn test_outbound_appends_without_mutating() {
        let mut transcript = Transcript::new();
        transcript.push(Message::assistant("earlier reply"));

        let outbound = transcript.outbound_with(Message::user("next"));

        assert_eq!(outbound.len(), 2);
        assert_eq!(outbound[1].role, MessageRole::User);
        assert_eq!(transcript.len(), 1);
    }

    #[test]
    fn test_serializes_as_array() {
        let mut transcript = Transcript::new();
        transcript.push(Message::user("a"));
        let json = serde_json::to_value(&transcript).unwrap();
        assert!(json.is_array());
    }
}
