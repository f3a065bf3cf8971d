use memchat_proto::{ChatRequest, ConversationMessage, ServerFrame};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info};

use super::session::{AgentError, AgentServices, AgentSession, FrameSink};

enum AgentCommand {
    Message {
        request: ChatRequest,
        reply_to: Option<FrameSink>,
        respond: oneshot::Sender<Result<String, AgentError>>,
    },
    Reset {
        respond: oneshot::Sender<Result<(), AgentError>>,
    },
    Snapshot {
        respond: oneshot::Sender<Vec<ConversationMessage>>,
    },
}

/// Address of a running agent instance.
///
/// Commands queue on a channel and one task drains them, so messages for the
/// same conversation are handled strictly one after another.
#[derive(Clone)]
pub struct AgentHandle {
    name: Arc<str>,
    commands: mpsc::Sender<AgentCommand>,
    state_tx: broadcast::Sender<ServerFrame>,
}

impl AgentHandle {
    pub fn spawn(
        name: &str,
        services: AgentServices,
        channel_capacity: usize,
        broadcast_capacity: usize,
    ) -> Self {
        let (commands, receiver) = mpsc::channel(channel_capacity.max(1));
        let (state_tx, _) = broadcast::channel(broadcast_capacity.max(1));

        let session_name = name.to_string();
        let session_state_tx = state_tx.clone();
        tokio::spawn(async move {
            let session = AgentSession::start(session_name, services, session_state_tx).await;
            Self::run(session, receiver).await;
        });

        Self {
            name: Arc::from(name),
            commands,
            state_tx,
        }
    }

    async fn run(mut session: AgentSession, mut receiver: mpsc::Receiver<AgentCommand>) {
        while let Some(command) = receiver.recv().await {
            match command {
                AgentCommand::Message {
                    request,
                    reply_to,
                    respond,
                } => {
                    let result = session.on_message(&request, reply_to.as_ref()).await;
                    let _ = respond.send(result);
                }
                AgentCommand::Reset { respond } => {
                    let _ = respond.send(session.reset().await);
                }
                AgentCommand::Snapshot { respond } => {
                    let _ = respond.send(session.snapshot());
                }
            }
        }
        info!(agent = session.name(), "Agent actor stopped");
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue a chat message. `reply_to` receives the direct `message` frame.
    pub async fn send_message(
        &self,
        request: ChatRequest,
        reply_to: Option<FrameSink>,
    ) -> Result<String, AgentError> {
        let (respond, response) = oneshot::channel();
        self.dispatch(AgentCommand::Message {
            request,
            reply_to,
            respond,
        })
        .await?;
        response.await.map_err(|_| self.gone())?
    }

    pub async fn reset(&self) -> Result<(), AgentError> {
        let (respond, response) = oneshot::channel();
        self.dispatch(AgentCommand::Reset { respond }).await?;
        response.await.map_err(|_| self.gone())?
    }

    pub async fn snapshot(&self) -> Result<Vec<ConversationMessage>, AgentError> {
        let (respond, response) = oneshot::channel();
        self.dispatch(AgentCommand::Snapshot { respond }).await?;
        response.await.map_err(|_| self.gone())
    }

    /// State-sync frames for every change of the conversation.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerFrame> {
        self.state_tx.subscribe()
    }

    async fn dispatch(&self, command: AgentCommand) -> Result<(), AgentError> {
        debug!(agent = %self.name, "Dispatching command");
        self.commands.send(command).await.map_err(|_| self.gone())
    }

    fn gone(&self) -> AgentError {
        AgentError::Unavailable(format!("agent {} stopped", self.name))
    }
}
