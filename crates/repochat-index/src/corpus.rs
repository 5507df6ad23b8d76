//! Per-corpus unit storage with ingest and retrieval.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use repochat_llm::LlmProvider;

use crate::chunker::{DEFAULT_CHUNK_SIZE, chunk};
use crate::embedder::Embedder;
use crate::error::{EmbeddingError, IndexError, IngestError, Result};
use crate::ranker::rank;
use crate::types::{ScoredUnit, Unit};

/// Default number of units returned by [`CorpusIndex::retrieve`].
pub const DEFAULT_TOP_K: usize = 5;

/// The indexed form of one ingested text source.
#[derive(Debug)]
pub struct Corpus {
    key: String,
    units: Arc<[Unit]>,
    dimension: usize,
}

impl Corpus {
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Units in insertion order. Every unit carries an embedding.
    #[must_use]
    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn candidates(&self) -> impl Iterator<Item = (&Unit, &[f32])> {
        self.units
            .iter()
            .filter_map(|u| u.embedding().map(|v| (u, v)))
    }
}

/// Owns every ingested corpus, keyed by an opaque corpus key.
///
/// The map lock is only held to look up or swap an `Arc<Corpus>`, never across
/// an embedding call, so work on different keys proceeds independently.
pub struct CorpusIndex<P> {
    embedder: Embedder<P>,
    chunk_size: usize,
    default_top_k: usize,
    corpora: RwLock<HashMap<String, Arc<Corpus>>>,
}

impl<P> std::fmt::Debug for CorpusIndex<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorpusIndex")
            .field("chunk_size", &self.chunk_size)
            .field("default_top_k", &self.default_top_k)
            .finish_non_exhaustive()
    }
}

impl<P: LlmProvider> CorpusIndex<P> {
    #[must_use]
    pub fn new(embedder: Embedder<P>) -> Self {
        Self {
            embedder,
            chunk_size: DEFAULT_CHUNK_SIZE,
            default_top_k: DEFAULT_TOP_K,
            corpora: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    #[must_use]
    pub fn with_default_top_k(mut self, top_k: usize) -> Self {
        self.default_top_k = top_k;
        self
    }

    #[must_use]
    pub fn default_top_k(&self) -> usize {
        self.default_top_k
    }

    /// Chunk, embed, and store `raw_text` under `key`, replacing any earlier
    /// ingest of the same key. Returns the number of stored units.
    ///
    /// # Errors
    ///
    /// Returns `IngestError::EmptyCorpus` if chunking yields nothing, or
    /// `IngestError::Embedding` if embedding fails. The previous corpus for
    /// `key` stays in place on error.
    #[tracing::instrument(skip(self, raw_text), fields(bytes = raw_text.len()))]
    pub async fn ingest(&self, key: &str, raw_text: &str) -> std::result::Result<usize, IngestError> {
        let chunks = chunk(raw_text, self.chunk_size);
        if chunks.is_empty() {
            return Err(IngestError::EmptyCorpus);
        }

        let vectors = self.embedder.embed(&chunks).await?;
        let dimension = vectors.first().map_or(0, Vec::len);

        let units: Arc<[Unit]> = chunks
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(i, (text, vector))| Unit::new(text, key, i).with_embedding(vector))
            .collect();
        let count = units.len();

        let corpus = Arc::new(Corpus {
            key: key.to_owned(),
            units,
            dimension,
        });
        let replaced = self
            .corpora
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), corpus)
            .is_some();

        tracing::info!(units = count, dimension, replaced, "corpus ingested");
        Ok(count)
    }

    /// Retrieve the [`DEFAULT_TOP_K`] (or configured) best units for `query`.
    ///
    /// # Errors
    ///
    /// See [`CorpusIndex::retrieve_top_k`].
    pub async fn retrieve(&self, key: &str, query: &str) -> Result<Vec<ScoredUnit>> {
        self.retrieve_top_k(key, query, self.default_top_k).await
    }

    /// Embed `query` and rank the corpus stored under `key` against it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for `top_k == 0`, `UnknownCorpus` if `key`
    /// was never ingested, or `Embedding` if the query cannot be embedded.
    #[tracing::instrument(skip(self, query))]
    pub async fn retrieve_top_k(
        &self,
        key: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredUnit>> {
        validate_top_k(top_k)?;
        let corpus = self.require(key)?;
        let vector = self.embedder.embed_one(query).await?;
        let ranked = rank_corpus(&corpus, &vector, top_k)?;
        tracing::debug!(hits = ranked.len(), "retrieved units");
        Ok(ranked)
    }

    /// Rank the corpus under `key` against an already computed query vector.
    ///
    /// # Errors
    ///
    /// Same as [`CorpusIndex::retrieve_top_k`], minus the embedding call.
    pub fn retrieve_by_vector(
        &self,
        key: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredUnit>> {
        validate_top_k(top_k)?;
        let corpus = self.require(key)?;
        rank_corpus(&corpus, vector, top_k)
    }

    /// Drop the corpus stored under `key`. Returns whether it existed.
    pub fn evict(&self, key: &str) -> bool {
        let removed = self
            .corpora
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some();
        if removed {
            tracing::info!(key, "corpus evicted");
        }
        removed
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    #[must_use]
    pub fn corpus(&self, key: &str) -> Option<Arc<Corpus>> {
        self.read().get(key).cloned()
    }

    #[must_use]
    pub fn unit_count(&self, key: &str) -> Option<usize> {
        self.read().get(key).map(|c| c.units.len())
    }

    /// Keys of all stored corpora, sorted.
    #[must_use]
    pub fn corpus_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<Corpus>>> {
        self.corpora.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn require(&self, key: &str) -> Result<Arc<Corpus>> {
        self.corpus(key)
            .ok_or_else(|| IndexError::UnknownCorpus(key.to_owned()))
    }
}

fn validate_top_k(top_k: usize) -> Result<()> {
    if top_k == 0 {
        return Err(IndexError::InvalidArgument(
            "top_k must be a positive integer".into(),
        ));
    }
    Ok(())
}

fn rank_corpus(corpus: &Corpus, vector: &[f32], top_k: usize) -> Result<Vec<ScoredUnit>> {
    if vector.len() != corpus.dimension {
        return Err(EmbeddingError::DimensionMismatch {
            expected: corpus.dimension,
            actual: vector.len(),
        }
        .into());
    }
    Ok(rank(vector, corpus.candidates(), top_k))
}
