//! Error types for repochat-index.

/// The embedding capability failed or answered with unusable vectors.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("embedding provider failed: {0}")]
    Provider(#[from] repochat_llm::LlmError),

    #[error("embedding count mismatch: requested {requested}, received {received}")]
    CountMismatch { requested: usize, received: usize },

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedding provider returned an empty vector")]
    EmptyVector,
}

/// Ingest did not produce a storable corpus. Prior state for the key is kept.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("corpus text produced no chunks")]
    EmptyCorpus,

    #[error("ingest aborted: {0}")]
    Embedding(#[from] EmbeddingError),
}

/// Errors surfaced by [`CorpusIndex`](crate::CorpusIndex) operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("unknown corpus: {0}")]
    UnknownCorpus(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

/// Result type alias using `IndexError`.
pub type Result<T> = std::result::Result<T, IndexError>;
