use memchat_proto::{ChatRequest, ConversationMessage, ServerFrame};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use super::conversation_store::ConversationStore;
use super::repository::ConversationRepository;
use crate::services::memory_pipeline::MemoryKey;
use crate::services::{MemoryPipeline, ReminderScheduler, ReplyGenerator, FALLBACK_REPLY};

/// Failures reported to whoever sent the command.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AgentError {
    #[error("Missing message")]
    MissingMessage,

    #[error("conversation not persisted: {0}")]
    Persistence(String),

    #[error("agent unavailable: {0}")]
    Unavailable(String),
}

/// Outbound frames for a single connection.
pub type FrameSink = mpsc::UnboundedSender<ServerFrame>;

/// Collaborators shared by every session.
#[derive(Clone)]
pub struct AgentServices {
    pub memory: Arc<MemoryPipeline>,
    pub generator: Arc<ReplyGenerator>,
    pub scheduler: Arc<ReminderScheduler>,
    pub repository: Arc<dyn ConversationRepository>,
}

/// Message pipeline for one conversation.
///
/// Owns its [`ConversationStore`]; nothing outside the session holds a reference
/// to it. Readers get copies through [`AgentSession::snapshot`] or the state-sync
/// broadcast.
pub struct AgentSession {
    name: String,
    store: ConversationStore,
    services: AgentServices,
    state_tx: broadcast::Sender<ServerFrame>,
}

impl AgentSession {
    /// Restore the persisted conversation for `name`. A failed load starts empty.
    pub async fn start(
        name: String,
        services: AgentServices,
        state_tx: broadcast::Sender<ServerFrame>,
    ) -> Self {
        let store = match services.repository.load(&name).await {
            Ok(messages) => ConversationStore::from_messages(messages),
            Err(e) => {
                warn!(agent = %name, error = %e, "Failed to load conversation, starting empty");
                ConversationStore::new()
            }
        };
        info!(agent = %name, messages = store.len(), "Agent session started");

        Self {
            name,
            store,
            services,
            state_tx,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn snapshot(&self) -> Vec<ConversationMessage> {
        self.store.snapshot()
    }

    /// Run one inbound message through the pipeline and return the reply.
    ///
    /// Only a missing message fails. Memory, model, persistence and scheduling
    /// problems are logged and absorbed so a reply always comes back.
    pub async fn on_message(
        &mut self,
        request: &ChatRequest,
        reply_to: Option<&FrameSink>,
    ) -> Result<String, AgentError> {
        let user_id = request.user_id();
        let Some(message) = request.message_text() else {
            info!(agent = %self.name, user_id, "Rejecting request without message");
            return Err(AgentError::MissingMessage);
        };
        debug!(agent = %self.name, user_id, message_len = message.len(), "Message received");

        self.store
            .append_user(message)
            .map_err(|_| AgentError::MissingMessage)?;
        let sequence = self.store.len() - 1;

        let context = self
            .services
            .memory
            .retrieve_context(
                MemoryKey {
                    agent: &self.name,
                    sequence,
                },
                message,
                user_id,
            )
            .await;

        let reply = self
            .services
            .generator
            .generate(&self.store.messages()[..sequence], &context, message)
            .await;
        let reply = if self.store.append_assistant(&reply).is_ok() {
            reply
        } else {
            self.store
                .append_assistant(FALLBACK_REPLY)
                .map_err(|_| AgentError::Unavailable("fallback reply rejected".to_string()))?;
            FALLBACK_REPLY.to_string()
        };

        let snapshot = self.store.snapshot();
        if let Err(e) = self.services.repository.save(&self.name, &snapshot).await {
            warn!(agent = %self.name, error = %e, "Failed to persist conversation");
        }

        if let Some(sink) = reply_to {
            if sink.send(ServerFrame::message(reply.clone())).is_err() {
                debug!(agent = %self.name, "Connection closed before reply was delivered");
            }
        }
        self.broadcast_state(snapshot);

        self.services.scheduler.schedule_reminder(user_id).await;

        info!(agent = %self.name, history_len = self.store.len(), "Reply sent");
        Ok(reply)
    }

    /// Clear the conversation remotely and locally, or leave both untouched.
    pub async fn reset(&mut self) -> Result<(), AgentError> {
        self.services
            .repository
            .save(&self.name, &[])
            .await
            .map_err(|e| {
                warn!(agent = %self.name, error = %e, "Reset aborted, persisted copy unchanged");
                AgentError::Persistence(e.to_string())
            })?;

        self.store.reset();
        self.broadcast_state(Vec::new());
        info!(agent = %self.name, "Conversation reset");
        Ok(())
    }

    fn broadcast_state(&self, conversation: Vec<ConversationMessage>) {
        // No subscribers is normal for HTTP-only instances.
        let receivers = self
            .state_tx
            .send(ServerFrame::state(conversation))
            .unwrap_or(0);
        debug!(agent = %self.name, receivers, "State broadcast");
    }
}
