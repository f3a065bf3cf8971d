use axum::extract::FromRef;
use std::sync::Arc;

use crate::agent::AgentRegistry;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<AgentRegistry>,
}

impl FromRef<AppState> for Arc<AgentRegistry> {
    fn from_ref(state: &AppState) -> Self {
        state.registry.clone()
    }
}
