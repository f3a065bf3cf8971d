use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("Message is empty")]
    EmptyInput,
    #[error("A message is already in flight")]
    SendInFlight,
    #[error("Connection is not ready")]
    NotReady,
    #[error("Transport error: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
