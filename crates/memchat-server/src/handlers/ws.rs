use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use memchat_proto::{ClientControl, ClientFrame, ServerFrame};
use std::sync::Arc;
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tracing::{debug, info, warn};

use super::resolve_agent;
use crate::agent::{AgentError, AgentHandle, AgentRegistry, FrameSink};
use crate::utils::error::ApiError;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(registry): State<Arc<AgentRegistry>>,
    Path((class, name)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let agent = resolve_agent(&registry, &class, &name)?;

    Ok(ws.on_upgrade(move |socket| async move {
        handle_socket(socket, agent, class).await;
    }))
}

/// One connection: identity, initial state, then frames in both directions until
/// either side closes.
async fn handle_socket(socket: WebSocket, agent: AgentHandle, class: String) {
    info!(agent = agent.name(), "Connection opened");

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (sink, mut outbound) = mpsc::unbounded_channel::<ServerFrame>();
    let mut state_rx = agent.subscribe();

    push(&agent, &sink, ServerFrame::identity(class, agent.name()));
    match agent.snapshot().await {
        Ok(conversation) => push(&agent, &sink, ServerFrame::state(conversation)),
        Err(e) => warn!(agent = agent.name(), error = %e, "Initial state unavailable"),
    }

    let writer_agent = agent.name().to_string();
    let writer = tokio::spawn(async move {
        loop {
            // Direct frames win so a reply always precedes the state sync it caused.
            let frame = tokio::select! {
                biased;
                Some(frame) = outbound.recv() => frame,
                result = state_rx.recv() => match result {
                    Ok(frame) => frame,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(agent = %writer_agent, skipped, "State sync lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                },
                else => break,
            };

            if ws_sender.send(Message::Text(frame.encode().into())).await.is_err() {
                debug!(agent = %writer_agent, "Socket write failed, stopping writer");
                break;
            }
        }
    });

    while let Some(Ok(message)) = ws_receiver.next().await {
        match message {
            Message::Text(text) => dispatch(&agent, &sink, text.as_str()).await,
            Message::Close(_) => break,
            _ => {}
        }
    }

    writer.abort();
    info!(agent = agent.name(), "Connection closed");
}

async fn dispatch(agent: &AgentHandle, sink: &FrameSink, raw: &str) {
    match ClientFrame::from_text(raw) {
        ClientFrame::Chat(request) => {
            match agent.send_message(request, Some(sink.clone())).await {
                Ok(_) => {}
                Err(AgentError::MissingMessage) => {
                    push(agent, sink, ServerFrame::error(AgentError::MissingMessage.to_string()));
                }
                Err(e) => {
                    warn!(agent = agent.name(), error = %e, "Message not handled");
                    push(agent, sink, ServerFrame::error(e.to_string()));
                }
            }
        }
        ClientFrame::Control(ClientControl::Reset) => {
            if let Err(e) = agent.reset().await {
                warn!(agent = agent.name(), error = %e, "Reset rejected");
                push(agent, sink, ServerFrame::error(e.to_string()));
                // The client already cleared its view; push the truth back.
                if let Ok(conversation) = agent.snapshot().await {
                    push(agent, sink, ServerFrame::state(conversation));
                }
            }
        }
    }
}

fn push(agent: &AgentHandle, sink: &FrameSink, frame: ServerFrame) {
    if sink.send(frame).is_err() {
        debug!(agent = agent.name(), "Connection closed before frame was queued");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::echo_services;
    use crate::config::AgentConfig;
    use memchat_proto::ChatRequest;

    fn agent() -> AgentHandle {
        AgentRegistry::new(echo_services("pong"), AgentConfig::default()).get_or_spawn("default")
    }

    #[tokio::test]
    async fn test_dispatch_chat_replies_on_sink() {
        let agent = agent();
        let (sink, mut outbound) = mpsc::unbounded_channel();

        let raw = ClientFrame::Chat(ChatRequest::outgoing("ping", "guest")).encode();
        dispatch(&agent, &sink, &raw).await;

        assert_eq!(outbound.recv().await.unwrap(), ServerFrame::message("pong"));
    }

    #[tokio::test]
    async fn test_dispatch_empty_message_sends_error_frame() {
        let agent = agent();
        let (sink, mut outbound) = mpsc::unbounded_channel();

        dispatch(&agent, &sink, r#"{"message":"   "}"#).await;

        assert_eq!(outbound.recv().await.unwrap(), ServerFrame::error("Missing message"));
        assert!(agent.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_reset_clears_conversation() {
        let agent = agent();
        let (sink, _outbound) = mpsc::unbounded_channel();

        agent
            .send_message(ChatRequest::outgoing("hello", "guest"), None)
            .await
            .unwrap();
        dispatch(&agent, &sink, &ClientFrame::Control(ClientControl::Reset).encode()).await;

        assert!(agent.snapshot().await.unwrap().is_empty());
    }

    type ClientSocket = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    async fn next_frame(socket: &mut ClientSocket) -> ServerFrame {
        use tokio_tungstenite::tungstenite::Message as WsMessage;

        loop {
            let message = tokio::time::timeout(std::time::Duration::from_secs(5), socket.next())
                .await
                .expect("no frame within 5s")
                .expect("socket closed")
                .unwrap();
            if let WsMessage::Text(text) = message {
                return ServerFrame::decode(text.as_str()).unwrap();
            }
        }
    }

    #[tokio::test]
    async fn test_socket_frames_arrive_in_order() {
        use crate::router::build_router;
        use crate::state::AppState;
        use memchat_proto::Role;
        use tokio_tungstenite::tungstenite::Message as WsMessage;

        let registry = Arc::new(AgentRegistry::new(
            echo_services("Rayleigh scattering..."),
            AgentConfig::default(),
        ));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, build_router(AppState { registry }))
                .await
                .unwrap();
        });

        let (mut socket, _) =
            tokio_tungstenite::connect_async(format!("ws://{}/agents/my-agent/default", addr))
                .await
                .unwrap();

        assert_eq!(
            next_frame(&mut socket).await,
            ServerFrame::identity("my-agent", "default")
        );
        assert_eq!(next_frame(&mut socket).await, ServerFrame::state(Vec::new()));

        for round in 1..=10 {
            let body = ClientFrame::Chat(ChatRequest::outgoing("Why is the sky blue", "guest"));
            socket.send(WsMessage::text(body.encode())).await.unwrap();

            assert_eq!(
                next_frame(&mut socket).await,
                ServerFrame::message("Rayleigh scattering...")
            );
            match next_frame(&mut socket).await {
                ServerFrame::State(state) => {
                    assert_eq!(state.conversation.len(), round * 2);
                    assert_eq!(state.conversation[round * 2 - 1].role(), Role::Assistant);
                }
                other => panic!("expected state sync, got {:?}", other),
            }
        }
    }
}
