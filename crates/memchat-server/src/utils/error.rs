use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use memchat_proto::ErrorBody;
use thiserror::Error;

use crate::agent::AgentError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Missing message")]
    MissingMessage,

    #[error("Not found")]
    NotFound,

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<AgentError> for ApiError {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::MissingMessage => ApiError::MissingMessage,
            AgentError::Unavailable(msg) => ApiError::Unavailable(msg),
            AgentError::Persistence(msg) => ApiError::InternalError(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::MissingMessage => {
                tracing::warn!("Bad request: missing message");
                (StatusCode::BAD_REQUEST, "Missing message".to_string())
            }
            ApiError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
            ApiError::Unavailable(msg) => {
                tracing::error!("Agent unavailable: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, msg)
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (status, Json(ErrorBody { error })).into_response()
    }
}
