use repochat_index::{EmbeddingError, IndexError, IngestError};
use repochat_llm::LlmError;

/// Failures of [`ChatService`](crate::ChatService) operations.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("unknown corpus: {0}")]
    UnknownCorpus(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("retrieval failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("answer generation failed: {0}")]
    Generation(#[source] LlmError),
}

impl From<IndexError> for ChatError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::Ingest(e) => Self::Ingest(e),
            IndexError::UnknownCorpus(key) => Self::UnknownCorpus(key),
            IndexError::InvalidArgument(msg) => Self::InvalidArgument(msg),
            IndexError::Embedding(e) => Self::Embedding(e),
        }
    }
}
