use dashmap::DashMap;
use tracing::info;

use super::actor::AgentHandle;
use super::session::AgentServices;
use crate::config::AgentConfig;

/// Lazily started agent instances, keyed by instance name.
///
/// Instances never share conversation state; the services they hold are
/// stateless clients or append-only external stores.
pub struct AgentRegistry {
    agents: DashMap<String, AgentHandle>,
    services: AgentServices,
    config: AgentConfig,
}

impl AgentRegistry {
    pub fn new(services: AgentServices, config: AgentConfig) -> Self {
        Self {
            agents: DashMap::new(),
            services,
            config,
        }
    }

    /// Agent class this registry serves in `/agents/{class}/{name}`.
    pub fn class_name(&self) -> &str {
        &self.config.class_name
    }

    pub fn get_or_spawn(&self, name: &str) -> AgentHandle {
        self.agents
            .entry(name.to_string())
            .or_insert_with(|| {
                info!(agent = name, "Spawning agent instance");
                AgentHandle::spawn(
                    name,
                    self.services.clone(),
                    self.config.channel_capacity,
                    self.config.broadcast_capacity,
                )
            })
            .clone()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::echo_services;
    use memchat_proto::ChatRequest;

    #[tokio::test]
    async fn test_instances_are_isolated() {
        let registry = AgentRegistry::new(echo_services("ok"), AgentConfig::default());

        let a = registry.get_or_spawn("a");
        let b = registry.get_or_spawn("b");
        a.send_message(ChatRequest::outgoing("only in a", "guest"), None)
            .await
            .unwrap();

        assert_eq!(a.snapshot().await.unwrap().len(), 2);
        assert!(b.snapshot().await.unwrap().is_empty());
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_same_name_reuses_instance() {
        let registry = AgentRegistry::new(echo_services("ok"), AgentConfig::default());

        registry
            .get_or_spawn("room")
            .send_message(ChatRequest::outgoing("hello", "guest"), None)
            .await
            .unwrap();

        let again = registry.get_or_spawn("room");
        assert_eq!(again.snapshot().await.unwrap().len(), 2);
        assert_eq!(registry.len(), 1);
    }
}
