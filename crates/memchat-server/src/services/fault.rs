use thiserror::Error;

/// Failures the message pipeline absorbs.
///
/// None of these ever reach the caller. Each one is logged once, with the
/// variant as the structured `error` field, at the place where it is swallowed.
#[derive(Debug, Error)]
pub enum PipelineFault {
    #[error("memory unavailable: {0}")]
    MemoryUnavailable(String),

    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("scheduling failed: {0}")]
    SchedulingFailure(String),
}

impl PipelineFault {
    pub fn memory(err: impl std::fmt::Display) -> Self {
        PipelineFault::MemoryUnavailable(err.to_string())
    }

    pub fn model(err: impl std::fmt::Display) -> Self {
        PipelineFault::ModelUnavailable(err.to_string())
    }

    pub fn scheduling(err: impl std::fmt::Display) -> Self {
        PipelineFault::SchedulingFailure(err.to_string())
    }
}
