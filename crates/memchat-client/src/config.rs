use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

const CONFIG_PATH: &str = "memchat_client.toml";

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ClientConfig {
    /// Server base URL, e.g. `ws://127.0.0.1:8787`.
    pub url: String,
    pub agent: String,
    pub name: String,
    pub user_id: String,
    pub identity_delay_ms: u64,
    pub ready_timeout_ms: u64,
    pub watchdog_ms: u64,
    pub reconnect_delay_ms: u64,
    pub max_reconnect_delay_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8787".to_string(),
            agent: "my-agent".to_string(),
            name: "default".to_string(),
            user_id: memchat_proto::GUEST_USER.to_string(),
            identity_delay_ms: 3500,
            ready_timeout_ms: 4000,
            watchdog_ms: 12000,
            reconnect_delay_ms: 1000,
            max_reconnect_delay_ms: 30000,
        }
    }
}

impl ClientConfig {
    /// Reads `memchat_client.toml` from the working directory, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(CONFIG_PATH)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => tracing::warn!("Failed to parse {}: {}", path.display(), e),
                },
                Err(e) => tracing::warn!("Failed to read {}: {}", path.display(), e),
            }
        }

        Self::default()
    }

    /// Socket endpoint bound to one agent instance.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/agents/{}/{}",
            self.url.trim_end_matches('/'),
            self.agent,
            self.name
        )
    }

    pub fn identity_delay(&self) -> Duration {
        Duration::from_millis(self.identity_delay_ms)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn watchdog(&self) -> Duration {
        Duration::from_millis(self.watchdog_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: ClientConfig = toml::from_str(
            r#"
                url = "ws://chat.internal:9000/"
                name = "alice"
            "#,
        )
        .unwrap();

        assert_eq!(config.endpoint(), "ws://chat.internal:9000/agents/my-agent/alice");
        assert_eq!(config.user_id, "guest");
        assert_eq!(config.watchdog(), Duration::from_millis(12000));
        assert_eq!(config.ready_timeout(), Duration::from_millis(4000));
        assert_eq!(config.identity_delay(), Duration::from_millis(3500));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = ClientConfig::load_from("does/not/exist.toml");
        assert_eq!(config.agent, "my-agent");
        assert_eq!(config.reconnect_delay_ms, 1000);
    }
}
