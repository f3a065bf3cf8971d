use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("invalid json frame: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("unknown frame: {0}")]
    UnknownFrame(String),
}
