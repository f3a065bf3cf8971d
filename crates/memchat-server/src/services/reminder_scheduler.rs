use anyhow::Result;
use flume::{bounded, Receiver, Sender, TrySendError};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::ReminderConfig;

use super::fault::PipelineFault;

/// A task to run once after `delay`.
#[derive(Debug, Clone, PartialEq)]
pub struct DeferredTask {
    pub delay: Duration,
    pub name: String,
    pub payload: Value,
}

/// Registration seam for deferred tasks.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TaskRegistrar: Send + Sync {
    async fn register(&self, task: DeferredTask) -> Result<()>;
}

/// Invoked when a deferred task comes due.
#[async_trait::async_trait]
pub trait ReminderHook: Send + Sync {
    async fn fire(&self, task: DeferredTask);
}

/// Acknowledges due reminders in the log and does nothing else.
pub struct LoggingReminderHook;

#[async_trait::async_trait]
impl ReminderHook for LoggingReminderHook {
    async fn fire(&self, task: DeferredTask) {
        info!(task = %task.name, payload = %task.payload, "Reminder task triggered");
    }
}

/// Bounded in-process registrar. A worker drains the queue and fires every task
/// after its delay. Registration never waits: a full or closed queue is an error.
#[derive(Clone)]
pub struct QueuedTaskRegistrar {
    sender: Sender<DeferredTask>,
}

impl QueuedTaskRegistrar {
    /// Spawns the worker; must be called inside a tokio runtime.
    pub fn new(capacity: usize, hook: Arc<dyn ReminderHook>) -> Self {
        let (sender, receiver) = bounded(capacity.max(1));
        info!("Initializing deferred task queue: capacity={}", capacity);

        tokio::spawn(Self::worker_loop(receiver, hook));

        Self { sender }
    }

    async fn worker_loop(receiver: Receiver<DeferredTask>, hook: Arc<dyn ReminderHook>) {
        while let Ok(task) = receiver.recv_async().await {
            debug!(task = %task.name, delay_ms = task.delay.as_millis() as u64, "Deferred task armed");
            let hook = hook.clone();
            tokio::spawn(async move {
                tokio::time::sleep(task.delay).await;
                hook.fire(task).await;
            });
        }
        info!("Deferred task worker shutting down (channel closed)");
    }
}

#[async_trait::async_trait]
impl TaskRegistrar for QueuedTaskRegistrar {
    async fn register(&self, task: DeferredTask) -> Result<()> {
        match self.sender.try_send(task) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(task)) => {
                anyhow::bail!("deferred task queue full, dropping {}", task.name)
            }
            Err(TrySendError::Disconnected(task)) => {
                anyhow::bail!("deferred task worker gone, dropping {}", task.name)
            }
        }
    }
}

/// Fire-and-forget front of the registrar.
pub struct ReminderScheduler {
    registrar: Arc<dyn TaskRegistrar>,
    config: ReminderConfig,
}

impl ReminderScheduler {
    pub fn new(registrar: Arc<dyn TaskRegistrar>, config: ReminderConfig) -> Self {
        Self { registrar, config }
    }

    /// Register a task. Failures are logged and dropped, never retried.
    pub async fn schedule(&self, delay_seconds: u64, task_name: &str, payload: Value) {
        let task = DeferredTask {
            delay: Duration::from_secs(delay_seconds),
            name: task_name.to_string(),
            payload,
        };

        if let Err(e) = self.registrar.register(task).await {
            let fault = PipelineFault::scheduling(e);
            warn!(task = task_name, error = %fault, "Deferred task not registered");
        }
    }

    /// The follow-up reminder issued after each reply.
    pub async fn schedule_reminder(&self, user_id: &str) {
        if !self.config.enabled {
            return;
        }
        self.schedule(
            self.config.delay_seconds,
            &self.config.task_name,
            serde_json::json!({ "userId": user_id }),
        )
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    #[derive(Default)]
    struct RecordingHook {
        fired: Mutex<Vec<DeferredTask>>,
    }

    #[async_trait::async_trait]
    impl ReminderHook for RecordingHook {
        async fn fire(&self, task: DeferredTask) {
            self.fired.lock().push(task);
        }
    }

    #[tokio::test]
    async fn test_registration_failure_is_swallowed() {
        let mut registrar = MockTaskRegistrar::new();
        registrar
            .expect_register()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("workflows unavailable")));

        let scheduler = ReminderScheduler::new(Arc::new(registrar), ReminderConfig::default());
        scheduler.schedule_reminder("guest").await;
    }

    #[tokio::test]
    async fn test_reminder_payload() {
        let mut registrar = MockTaskRegistrar::new();
        registrar
            .expect_register()
            .withf(|task| {
                task.name == "sendReminder"
                    && task.delay == Duration::from_secs(60)
                    && task.payload == json!({"userId": "guest"})
            })
            .times(1)
            .returning(|_| Ok(()));

        let scheduler = ReminderScheduler::new(Arc::new(registrar), ReminderConfig::default());
        scheduler.schedule_reminder("guest").await;
    }

    #[tokio::test]
    async fn test_disabled_reminders_skip_registration() {
        let mut registrar = MockTaskRegistrar::new();
        registrar.expect_register().never();

        let config = ReminderConfig {
            enabled: false,
            ..ReminderConfig::default()
        };
        let scheduler = ReminderScheduler::new(Arc::new(registrar), config);
        scheduler.schedule_reminder("guest").await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_task_fires_after_delay() {
        let hook = Arc::new(RecordingHook::default());
        let registrar = QueuedTaskRegistrar::new(4, hook.clone());

        registrar
            .register(DeferredTask {
                delay: Duration::from_secs(60),
                name: "sendReminder".to_string(),
                payload: json!({"userId": "guest"}),
            })
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert!(hook.fired.lock().is_empty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(hook.fired.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_full_queue_rejects() {
        let (sender, _receiver) = bounded(1);
        let registrar = QueuedTaskRegistrar { sender };
        let task = DeferredTask {
            delay: Duration::from_secs(1),
            name: "sendReminder".to_string(),
            payload: Value::Null,
        };

        registrar.register(task.clone()).await.unwrap();
        assert!(registrar.register(task).await.is_err());
    }
}
