use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub reminder: ReminderConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub model: String,
    /// Expected vector length; `0` disables the check.
    #[serde(default)]
    pub dimension: usize,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub include_history: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MemoryBackend {
    #[default]
    InMemory,
    Postgres,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MemoryConfig {
    #[serde(default)]
    pub backend: MemoryBackend,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ReminderConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_reminder_delay")]
    pub delay_seconds: u64,
    #[serde(default = "default_task_name")]
    pub task_name: String,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AgentConfig {
    /// Class segment accepted in `/agents/{class}/{name}`.
    #[serde(default = "default_class_name")]
    pub class_name: String,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default = "default_channel_capacity")]
    pub broadcast_capacity: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_max_size: u32,
    pub pool_timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_max_tokens() -> usize {
    256
}

fn default_top_k() -> usize {
    3
}

fn default_true() -> bool {
    true
}

fn default_reminder_delay() -> u64 {
    60
}

fn default_task_name() -> String {
    "sendReminder".to_string()
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_channel_capacity() -> usize {
    64
}

fn default_class_name() -> String {
    "my-agent".to_string()
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: MemoryBackend::default(),
            top_k: default_top_k(),
        }
    }
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_seconds: default_reminder_delay(),
            task_name: default_task_name(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            class_name: default_class_name(),
            channel_capacity: default_channel_capacity(),
            broadcast_capacity: default_channel_capacity(),
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config::builder()
            .add_source(File::with_name("config/settings").required(true))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    #[test]
    fn test_minimal_file_fills_defaults() {
        let raw = r#"
            [server]
            host = "127.0.0.1"
            port = 9000

            [embedding]
            base_url = "http://embed"
            model = "bge"

            [llm]
            base_url = "http://llm"
            model = "llama"
        "#;

        let settings: Settings = Config::builder()
            .add_source(File::from_str(raw, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.llm.max_tokens, 256);
        assert!(!settings.llm.include_history);
        assert_eq!(settings.memory.top_k, 3);
        assert_eq!(settings.memory.backend, MemoryBackend::InMemory);
        assert_eq!(settings.reminder.delay_seconds, 60);
        assert_eq!(settings.reminder.task_name, "sendReminder");
        assert!(settings.database.is_none());
    }
}
