use anyhow::Result;
use dashmap::DashMap;
use memchat_proto::ConversationMessage;

/// Durable copy of each instance's conversation.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Stored conversation, empty when the instance has none yet.
    async fn load(&self, agent: &str) -> Result<Vec<ConversationMessage>>;

    /// Replace the stored conversation wholesale.
    async fn save(&self, agent: &str, conversation: &[ConversationMessage]) -> Result<()>;
}

#[derive(Default)]
pub struct InMemoryConversationRepository {
    storage: DashMap<String, Vec<ConversationMessage>>,
}

impl InMemoryConversationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ConversationRepository for InMemoryConversationRepository {
    async fn load(&self, agent: &str) -> Result<Vec<ConversationMessage>> {
        Ok(self
            .storage
            .get(agent)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    async fn save(&self, agent: &str, conversation: &[ConversationMessage]) -> Result<()> {
        self.storage.insert(agent.to_string(), conversation.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memchat_proto::Role;

    #[tokio::test]
    async fn test_save_replaces_and_load_returns() {
        let repo = InMemoryConversationRepository::new();
        assert!(repo.load("default").await.unwrap().is_empty());

        let first = vec![ConversationMessage::new(Role::User, "a").unwrap()];
        repo.save("default", &first).await.unwrap();
        repo.save("default", &[]).await.unwrap();

        assert!(repo.load("default").await.unwrap().is_empty());
        assert!(repo.load("other").await.unwrap().is_empty());
    }
}
