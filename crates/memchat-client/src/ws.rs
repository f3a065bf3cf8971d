use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use memchat_proto::ClientFrame;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::error::{ClientError, Result};
use crate::session::ConnectionSession;
use crate::transport::Transport;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Write half of the current socket, swapped on every reconnect.
#[derive(Clone, Default)]
pub struct WsTransport {
    sink: Arc<Mutex<Option<WsSink>>>,
}

impl WsTransport {
    pub fn new() -> Self {
        Self::default()
    }

    async fn attach(&self, sink: WsSink) {
        *self.sink.lock().await = Some(sink);
    }

    async fn detach(&self) {
        if let Some(mut sink) = self.sink.lock().await.take() {
            let _ = sink.close().await;
        }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&self, frame: ClientFrame) -> Result<()> {
        let mut guard = self.sink.lock().await;
        let sink = guard
            .as_mut()
            .ok_or_else(|| ClientError::Transport("socket is not open".to_string()))?;
        sink.send(Message::text(frame.encode()))
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))
    }
}

/// Spawns the connection loop: connect, pump inbound frames into the
/// session, and reconnect with capped exponential backoff on failure.
pub fn spawn_driver(session: ConnectionSession, transport: WsTransport) -> JoinHandle<()> {
    tokio::spawn(async move {
        let config = session.config().clone();
        let endpoint = config.endpoint();
        let base_delay = Duration::from_millis(config.reconnect_delay_ms.max(1));
        let max_delay = Duration::from_millis(
            config.max_reconnect_delay_ms.max(config.reconnect_delay_ms),
        );
        let mut delay = base_delay;

        session.on_connecting();
        loop {
            debug!("Connecting to {}", endpoint);

            match tokio_tungstenite::connect_async(endpoint.as_str()).await {
                Ok((stream, _)) => {
                    info!("Socket open: {}", endpoint);
                    delay = base_delay;

                    let (sink, mut inbound) = stream.split();
                    transport.attach(sink).await;
                    session.on_open();

                    while let Some(message) = inbound.next().await {
                        match message {
                            Ok(Message::Text(text)) => session.on_text(text.as_str()),
                            Ok(Message::Close(_)) => {
                                session.on_closing();
                                break;
                            }
                            Ok(_) => {}
                            Err(e) => {
                                warn!("Socket error: {}", e);
                                break;
                            }
                        }
                    }

                    transport.detach().await;
                    session.on_close();
                    session.on_connecting();
                    info!("Socket closed, reconnecting in {:?}", delay);
                }
                Err(e) => {
                    warn!("Connect to {} failed: {}; retrying in {:?}", endpoint, e, delay);
                }
            }

            tokio::time::sleep(delay).await;
            delay = next_delay(delay, max_delay);
        }
    })
}

fn next_delay(current: Duration, max: Duration) -> Duration {
    current.saturating_mul(2).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_is_capped() {
        let max = Duration::from_millis(5000);
        let mut delay = Duration::from_millis(1000);
        let mut seen = Vec::new();
        for _ in 0..5 {
            delay = next_delay(delay, max);
            seen.push(delay.as_millis());
        }
        assert_eq!(seen, vec![2000, 4000, 5000, 5000, 5000]);
    }

    #[tokio::test]
    async fn test_send_without_socket_fails() {
        let transport = WsTransport::new();
        let result = transport
            .send(ClientFrame::Control(memchat_proto::ClientControl::Reset))
            .await;
        assert!(matches!(result, Err(ClientError::Transport(_))));
    }
}
