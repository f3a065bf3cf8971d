use memchat_proto::{ConversationMessage, Role};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("conversation messages cannot be empty")]
    EmptyText,
}

/// Ordered dialogue transcript of one conversation.
///
/// Append-only apart from [`ConversationStore::reset`]. Not synchronised: the
/// owning session is the only writer.
#[derive(Debug, Clone, Default)]
pub struct ConversationStore {
    messages: Vec<ConversationMessage>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: Vec<ConversationMessage>) -> Self {
        Self { messages }
    }

    pub fn append_user(&mut self, text: &str) -> Result<(), StoreError> {
        self.append(Role::User, text)
    }

    pub fn append_assistant(&mut self, text: &str) -> Result<(), StoreError> {
        self.append(Role::Assistant, text)
    }

    fn append(&mut self, role: Role, text: &str) -> Result<(), StoreError> {
        let message = ConversationMessage::new(role, text).ok_or(StoreError::EmptyText)?;
        self.messages.push(message);
        Ok(())
    }

    pub fn snapshot(&self) -> Vec<ConversationMessage> {
        self.messages.clone()
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    /// Drops every message. Callers get consent for this first.
    pub fn reset(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_appends_keep_order() {
        let mut store = ConversationStore::new();
        store.append_user("first").unwrap();
        store.append_assistant("second").unwrap();
        store.append_user("third").unwrap();

        let roles: Vec<_> = store.snapshot().iter().map(|m| m.role()).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
        assert_eq!(store.messages()[2].text(), "third");
    }

    #[test]
    fn test_empty_text_rejected() {
        let mut store = ConversationStore::new();
        assert_eq!(store.append_user(" \n"), Err(StoreError::EmptyText));
        assert!(store.is_empty());
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut store = ConversationStore::new();
        store.append_user("hello").unwrap();
        let snapshot = store.snapshot();

        store.reset();
        assert!(store.is_empty());
        assert_eq!(snapshot.len(), 1);
    }
}
