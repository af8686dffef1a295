use thiserror::Error;

/// Failures of the external semantic retriever. Per-turn these degrade to an
/// apologetic conversational reply, never a fault surfaced to the caller.
#[derive(Debug, Clone, Error)]
pub enum RetrievalError {
    #[error("retrieval backend unavailable: {0}")]
    Unavailable(String),
}

/// Failures of the generation backend, split by retryability.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    /// Quota/rate-limit class: retried with exponential backoff.
    #[error("generation rate limited: {0}")]
    RateLimited(String),
    /// Everything else: fails the call immediately, no retry.
    #[error("generation failed: {0}")]
    Failed(String),
}

/// Startup-time corpus problems. These are the only errors allowed to halt
/// readiness; everything after startup degrades to chat text.
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("corpus file not found: {0}")]
    NotFound(String),
    #[error("failed reading corpus file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed parsing corpus file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("corpus file parsed but contains no documents")]
    Empty,
}
