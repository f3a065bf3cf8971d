use async_trait::async_trait;
use memchat_proto::ClientFrame;

use crate::error::Result;

/// Outbound half of the connection. Inbound frames and lifecycle events are
/// fed to the session by whoever owns the socket.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, frame: ClientFrame) -> Result<()>;
}
