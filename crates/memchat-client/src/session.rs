//! Connection session
//!
//! Owns the visible chat log and the send/reset flow on top of a
//! [`Transport`]. Socket lifecycle events come in through the `on_*`
//! methods; the log is replaced wholesale whenever the server pushes an
//! authoritative snapshot, so optimistic local entries never drift from
//! server truth for long.

use std::sync::Arc;
use std::time::Duration;

use memchat_proto::{ChatRequest, ClientControl, ClientFrame, ServerEvent, ServerFrame};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::message::{ChatMessage, ChatRole};
use crate::transport::Transport;

pub const IDENTITY_DELAYED_NOTICE: &str = "Connection opened but identity is delayed. Retrying...";
pub const NOT_READY_NOTICE: &str = "Connection is not ready. Check the server and try again.";
pub const SEND_FAILED_NOTICE: &str = "Failed to send message. Please retry.";
pub const NO_RESPONSE_NOTICE: &str =
    "No response yet. The backend may still be processing or failed silently.";
pub const RESET_NOT_READY_NOTICE: &str = "Cannot reset yet: connection is not ready.";
pub const RESET_FAILED_NOTICE: &str = "Failed to reset the conversation. Please retry.";

/// Substring used to detect an existing identity notice.
const IDENTITY_DELAYED_MARKER: &str = "identity is delayed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    /// Socket open, identity handshake not seen yet.
    OpenUnidentified,
    Identified,
    Closing,
    Closed,
}

impl ConnectionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionStatus::Identified => "Connected",
            ConnectionStatus::Connecting => "Connecting",
            ConnectionStatus::OpenUnidentified => "Connected (identity pending)",
            ConnectionStatus::Closing => "Closing",
            ConnectionStatus::Closed => "Disconnected",
        }
    }
}

#[derive(Default)]
struct ViewState {
    log: Vec<ChatMessage>,
    sending: bool,
    watchdog: Option<JoinHandle<()>>,
    /// Bumped on every cancel so a watchdog that already woke up can tell it was superseded.
    watchdog_generation: u64,
    identity_timer: Option<JoinHandle<()>>,
}

impl ViewState {
    fn push(&mut self, role: ChatRole, text: &str) {
        self.log.push(ChatMessage::new(role, text));
    }

    fn cancel_watchdog(&mut self) {
        if let Some(handle) = self.watchdog.take() {
            handle.abort();
        }
        self.watchdog_generation = self.watchdog_generation.wrapping_add(1);
    }

    fn settle(&mut self) {
        self.cancel_watchdog();
        self.sending = false;
    }

    fn cancel_identity_timer(&mut self) {
        if let Some(handle) = self.identity_timer.take() {
            handle.abort();
        }
    }
}

struct Inner {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    status: watch::Sender<ConnectionStatus>,
    revision: watch::Sender<u64>,
    view: Mutex<ViewState>,
}

#[derive(Clone)]
pub struct ConnectionSession {
    inner: Arc<Inner>,
}

impl ConnectionSession {
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Connecting);
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                config,
                transport,
                status,
                revision,
                view: Mutex::new(ViewState::default()),
            }),
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    pub fn on_connecting(&self) {
        self.set_status(ConnectionStatus::Connecting);
    }

    /// Socket is open. Arms the one-shot identity-delay check.
    pub fn on_open(&self) {
        self.set_status(ConnectionStatus::OpenUnidentified);

        let session = self.clone();
        let delay = self.inner.config.identity_delay();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            session.check_identity_delay();
        });

        let mut view = self.inner.view.lock();
        view.cancel_identity_timer();
        view.identity_timer = Some(timer);
    }

    /// Appends the identity-delay notice if the socket is still open without
    /// an identity. Safe to call repeatedly: a matching notice is never duplicated.
    pub fn check_identity_delay(&self) {
        if self.status() != ConnectionStatus::OpenUnidentified {
            return;
        }

        let mut view = self.inner.view.lock();
        let exists = view
            .log
            .iter()
            .any(|m| m.role == ChatRole::System && m.text.contains(IDENTITY_DELAYED_MARKER));
        if exists {
            return;
        }
        warn!("Socket open but identity not confirmed");
        view.push(ChatRole::System, IDENTITY_DELAYED_NOTICE);
        drop(view);
        self.bump_revision();
    }

    pub fn on_identified(&self) {
        self.inner.view.lock().cancel_identity_timer();
        self.set_status(ConnectionStatus::Identified);
    }

    pub fn on_closing(&self) {
        self.set_status(ConnectionStatus::Closing);
    }

    /// Socket closed. Any pending reply is abandoned.
    pub fn on_close(&self) {
        {
            let mut view = self.inner.view.lock();
            view.cancel_identity_timer();
            view.settle();
        }
        self.set_status(ConnectionStatus::Closed);
    }

    /// Raw text frame from the socket.
    pub fn on_text(&self, raw: &str) {
        match ServerFrame::decode(raw) {
            Ok(frame) => self.on_frame(frame),
            Err(e) => debug!("Ignoring frame: {}", e),
        }
    }

    pub fn on_frame(&self, frame: ServerFrame) {
        match frame {
            ServerFrame::Event(ServerEvent::Message { text }) => {
                if text.trim().is_empty() {
                    return;
                }
                let mut view = self.inner.view.lock();
                view.settle();
                view.push(ChatRole::Assistant, &text);
                drop(view);
                self.bump_revision();
            }
            ServerFrame::Event(ServerEvent::Identity { agent, name }) => {
                info!("Identified as {}/{}", agent, name);
                self.on_identified();
            }
            ServerFrame::Event(ServerEvent::Error { error }) => {
                debug!("Server reported: {}", error);
            }
            ServerFrame::State(state) => {
                let log = state
                    .conversation
                    .iter()
                    .enumerate()
                    .map(|(index, message)| ChatMessage::from_state(index, message))
                    .collect();
                let mut view = self.inner.view.lock();
                view.log = log;
                view.settle();
                drop(view);
                self.bump_revision();
            }
        }
    }

    // ------------------------------------------------------------------
    // User actions
    // ------------------------------------------------------------------

    pub fn can_send(&self, input: &str) -> bool {
        !input.trim().is_empty() && !self.inner.view.lock().sending
    }

    /// Waits up to the configured timeout for the identity handshake.
    pub async fn ensure_ready(&self) -> bool {
        if self.status() == ConnectionStatus::Identified {
            return true;
        }

        let mut status = self.inner.status.subscribe();
        let timeout = self.inner.config.ready_timeout();
        let outcome = tokio::time::timeout(
            timeout,
            status.wait_for(|s| *s == ConnectionStatus::Identified),
        )
        .await;
        matches!(outcome, Ok(Ok(_)))
    }

    /// Sends one chat message.
    ///
    /// The user entry is appended before readiness is known. When the
    /// connection does not become ready the entry stays, a notice follows it
    /// and nothing is transmitted.
    pub async fn send(&self, input: &str) -> Result<()> {
        let text = input.trim().to_string();
        if text.is_empty() {
            return Err(ClientError::EmptyInput);
        }

        {
            let mut view = self.inner.view.lock();
            if view.sending {
                return Err(ClientError::SendInFlight);
            }
            view.sending = true;
            view.push(ChatRole::User, &text);
        }
        self.bump_revision();

        if !self.ensure_ready().await {
            self.notice_and_settle(NOT_READY_NOTICE);
            return Err(ClientError::NotReady);
        }

        // Armed before transmitting so a fast reply always finds it to cancel.
        self.arm_watchdog();

        let frame = ClientFrame::Chat(ChatRequest::outgoing(&text, &self.inner.config.user_id));
        if let Err(e) = self.inner.transport.send(frame).await {
            warn!(error = %e, "Failed to send message");
            self.notice_and_settle(SEND_FAILED_NOTICE);
            return Err(e);
        }

        debug!("Message sent");
        Ok(())
    }

    /// Clears the remote conversation and the local log together.
    pub async fn reset(&self) -> Result<()> {
        self.inner.view.lock().settle();

        if !self.ensure_ready().await {
            self.inner.view.lock().push(ChatRole::System, RESET_NOT_READY_NOTICE);
            self.bump_revision();
            return Err(ClientError::NotReady);
        }

        if let Err(e) = self
            .inner
            .transport
            .send(ClientFrame::Control(ClientControl::Reset))
            .await
        {
            warn!(error = %e, "Failed to send reset");
            self.inner.view.lock().push(ChatRole::System, RESET_FAILED_NOTICE);
            self.bump_revision();
            return Err(e);
        }

        self.inner.view.lock().log.clear();
        self.bump_revision();
        info!("Conversation reset");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.inner.view.lock().log.clone()
    }

    pub fn is_sending(&self) -> bool {
        self.inner.view.lock().sending
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.inner.status.borrow()
    }

    pub fn status_label(&self) -> &'static str {
        self.status().label()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status.subscribe()
    }

    /// Ticks on every change to the visible log.
    pub fn subscribe_log(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn set_status(&self, status: ConnectionStatus) {
        let previous = self.inner.status.send_replace(status);
        if previous != status {
            debug!("Connection status: {:?} -> {:?}", previous, status);
        }
    }

    fn bump_revision(&self) {
        self.inner.revision.send_modify(|rev| *rev = rev.wrapping_add(1));
    }

    fn notice_and_settle(&self, notice: &str) {
        let mut view = self.inner.view.lock();
        view.settle();
        view.push(ChatRole::System, notice);
        drop(view);
        self.bump_revision();
    }

    fn arm_watchdog(&self) {
        let delay = self.inner.config.watchdog();
        let mut view = self.inner.view.lock();
        view.cancel_watchdog();
        let generation = view.watchdog_generation;

        let session = self.clone();
        view.watchdog = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            session.fire_watchdog(generation);
        }));
    }

    fn fire_watchdog(&self, generation: u64) {
        let mut view = self.inner.view.lock();
        if view.watchdog_generation != generation {
            return;
        }
        warn!("No reply within the watchdog window");
        view.watchdog = None;
        view.sending = false;
        view.push(ChatRole::System, NO_RESPONSE_NOTICE);
        drop(view);
        self.bump_revision();
    }
}
