use axum::{routing::get, Router};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};

use crate::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/health/ready", get(handlers::health::readiness_check));

    // GET upgrades to the agent socket, POST is the direct-invocation fallback.
    let agent_routes = Router::new().route(
        "/agents/{agent}/{name}",
        get(handlers::ws::ws_handler).post(handlers::chat::chat_handler),
    );

    Router::new()
        .merge(public_routes)
        .merge(agent_routes)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default()))
}
