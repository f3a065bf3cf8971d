pub mod embedding_service;
pub mod envelope;
pub mod fault;
pub mod memory_pipeline;
pub mod model_service;
pub mod reminder_scheduler;
pub mod reply_generator;
pub mod vector_index;

pub use embedding_service::{Embedder, EmbeddingService};
pub use fault::PipelineFault;
pub use memory_pipeline::MemoryPipeline;
pub use model_service::{ModelClient, ModelService};
pub use reminder_scheduler::{
    DeferredTask, LoggingReminderHook, QueuedTaskRegistrar, ReminderHook, ReminderScheduler,
    TaskRegistrar,
};
pub use reply_generator::{ReplyGenerator, FALLBACK_REPLY};
pub use vector_index::{InMemoryVectorIndex, MemoryMatch, MemoryMetadata, MemoryRecord, VectorIndex};
