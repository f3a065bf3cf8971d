use axum::{
    extract::{Path, State},
    Json,
};
use memchat_proto::{ChatRequest, ReplyBody};
use std::sync::Arc;
use tracing::info;

use super::resolve_agent;
use crate::agent::AgentRegistry;
use crate::utils::error::ApiError;

/// HTTP fallback: run one message through the agent and answer with the reply.
///
/// The body is read as text so a malformed payload is a missing message, not a
/// JSON rejection.
pub async fn chat_handler(
    State(registry): State<Arc<AgentRegistry>>,
    Path((class, name)): Path<(String, String)>,
    body: String,
) -> Result<Json<ReplyBody>, ApiError> {
    let agent = resolve_agent(&registry, &class, &name)?;
    let request = ChatRequest::from_body(&body);

    info!(agent = %name, user_id = request.user_id(), "HTTP chat request");

    let reply = agent.send_message(request, None).await?;
    Ok(Json(ReplyBody { reply }))
}

#[cfg(test)]
mod tests {
    use crate::agent::{echo_services, AgentRegistry};
    use crate::config::AgentConfig;
    use crate::router::build_router;
    use crate::state::AppState;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use memchat_proto::{ErrorBody, ReplyBody};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> (Router, Arc<AgentRegistry>) {
        let registry = Arc::new(AgentRegistry::new(
            echo_services("Rayleigh scattering..."),
            AgentConfig::default(),
        ));
        let router = build_router(AppState {
            registry: registry.clone(),
        });
        (router, registry)
    }

    fn post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn read_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_reply_returned_with_200() {
        let (app, registry) = app();

        let response = app
            .oneshot(post(
                "/agents/my-agent/default",
                r#"{"message":"Why is the sky blue","userId":"guest"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: ReplyBody = read_json(response).await;
        assert_eq!(body.reply, "Rayleigh scattering...");

        let history = registry.get_or_spawn("default").snapshot().await.unwrap();
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_message_is_400() {
        let (app, registry) = app();

        let response = app
            .oneshot(post("/agents/my-agent/default", r#"{"userId":"guest"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: ErrorBody = read_json(response).await;
        assert_eq!(body.error, "Missing message");

        let history = registry.get_or_spawn("default").snapshot().await.unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_body_is_missing_message() {
        let (app, _) = app();

        let response = app
            .oneshot(post("/agents/my-agent/default", "{not json"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_agent_class_is_404() {
        let (app, registry) = app();

        let response = app
            .oneshot(post("/agents/other-agent/default", r#"{"message":"hi"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(registry.is_empty());
    }
}
