//! One isolated conversation per agent instance.
//!
//! - [`ConversationStore`]: ordered transcript, pure state
//! - [`AgentSession`]: per-message pipeline over the store
//! - [`AgentHandle`]: single-writer actor owning a session
//! - [`AgentRegistry`]: instance name to running actor

mod actor;
mod conversation_store;
mod registry;
mod repository;
mod session;

pub use actor::AgentHandle;
pub use conversation_store::{ConversationStore, StoreError};
pub use registry::AgentRegistry;
pub use repository::{ConversationRepository, InMemoryConversationRepository};
pub use session::{AgentError, AgentServices, AgentSession, FrameSink};

#[cfg(test)]
pub(crate) use repository::MockConversationRepository;
#[cfg(test)]
pub(crate) use session::tests::echo_services;
