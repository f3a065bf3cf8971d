use memchat_proto::{ConversationMessage, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
    /// Local notices. Never sent to or received from the server.
    System,
}

impl From<Role> for ChatRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => ChatRole::User,
            Role::Assistant => ChatRole::Assistant,
        }
    }
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
            ChatRole::System => "system",
        }
    }
}

/// One entry of the visible chat log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: String,
    pub role: ChatRole,
    pub text: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, text: impl Into<String>) -> Self {
        Self {
            id: local_id(),
            role,
            text: text.into(),
        }
    }

    /// Entry rebuilt from an authoritative snapshot. Ids are positional so a
    /// repeated snapshot yields the same ids.
    pub fn from_state(index: usize, message: &ConversationMessage) -> Self {
        let role = ChatRole::from(message.role());
        Self {
            id: format!("state-{}-{}", index, role.as_str()),
            role,
            text: message.text().to_string(),
        }
    }
}

fn local_id() -> String {
    format!(
        "{}-{:x}",
        chrono::Utc::now().timestamp_millis(),
        rand::random::<u64>()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_ids_are_positional() {
        let stored = ConversationMessage::new(Role::Assistant, "hi").unwrap();
        let entry = ChatMessage::from_state(3, &stored);
        assert_eq!(entry.id, "state-3-assistant");
        assert_eq!(entry.role, ChatRole::Assistant);
        assert_eq!(entry.text, "hi");
    }

    #[test]
    fn test_local_ids_differ() {
        let a = ChatMessage::new(ChatRole::User, "a");
        let b = ChatMessage::new(ChatRole::User, "a");
        assert_ne!(a.id, b.id);
        assert!(a.id.contains('-'));
    }
}
