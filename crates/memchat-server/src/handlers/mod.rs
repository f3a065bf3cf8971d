pub mod chat;
pub mod health;
pub mod ws;

use crate::agent::{AgentHandle, AgentRegistry};
use crate::utils::error::ApiError;

/// Resolve `/agents/{class}/{name}` to a running instance.
pub(crate) fn resolve_agent(
    registry: &AgentRegistry,
    class: &str,
    name: &str,
) -> Result<AgentHandle, ApiError> {
    if class != registry.class_name() || name.trim().is_empty() {
        return Err(ApiError::NotFound);
    }
    Ok(registry.get_or_spawn(name))
}
