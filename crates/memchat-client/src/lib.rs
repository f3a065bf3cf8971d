//! Client side of the memory chat: a connection session that keeps the
//! visible chat log honest while the socket comes and goes.

pub mod config;
pub mod error;
pub mod message;
pub mod session;
pub mod transport;
pub mod ws;

pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use message::{ChatMessage, ChatRole};
pub use session::{ConnectionSession, ConnectionStatus};
pub use transport::Transport;
pub use ws::{spawn_driver, WsTransport};
