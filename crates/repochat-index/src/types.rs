use std::collections::BTreeMap;

/// Metadata key holding the originating corpus key.
pub const SOURCE_KEY: &str = "source";
/// Metadata key holding the zero-based position of the unit in its corpus.
pub const CHUNK_INDEX_KEY: &str = "chunk_index";

/// One retrievable slice of corpus text.
///
/// Units are built once during ingest and never mutated after they are stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    text: String,
    metadata: BTreeMap<String, String>,
    embedding: Option<Vec<f32>>,
}

impl Unit {
    #[must_use]
    pub fn new(text: impl Into<String>, source: &str, chunk_index: usize) -> Self {
        let metadata = BTreeMap::from([
            (SOURCE_KEY.to_owned(), source.to_owned()),
            (CHUNK_INDEX_KEY.to_owned(), chunk_index.to_string()),
        ]);
        Self {
            text: text.into(),
            metadata,
            embedding: None,
        }
    }

    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).map(String::as_str)
    }

    #[must_use]
    pub fn embedding(&self) -> Option<&[f32]> {
        self.embedding.as_deref()
    }
}

/// A unit paired with its similarity to a query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredUnit {
    pub unit: Unit,
    pub score: f32,
}
