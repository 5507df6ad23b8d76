//! In-memory retrieval index for repository chat.
//!
//! Raw corpus text is split into paragraph-aligned units, embedded in ordered
//! batches, and kept per corpus key. Queries are embedded and ranked against a
//! corpus by cosine similarity.

pub mod chunker;
pub mod corpus;
pub mod embedder;
pub mod error;
pub mod ranker;
pub mod types;

pub use chunker::{DEFAULT_CHUNK_SIZE, chunk};
pub use corpus::{Corpus, CorpusIndex, DEFAULT_TOP_K};
pub use embedder::{DEFAULT_EMBED_BATCH_SIZE, Embedder};
pub use error::{EmbeddingError, IndexError, IngestError, Result};
pub use ranker::{cosine_similarity, rank};
pub use types::{ScoredUnit, Unit};
