//! Test-only mock provider.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::LlmError;
use crate::provider::{LlmProvider, Message};

/// Dimensionality of the default letter-histogram embedding.
pub const MOCK_EMBEDDING_DIM: usize = 26;

/// Deterministic provider for tests.
///
/// Embeddings default to a lowercase letter histogram of the input, so texts
/// sharing vocabulary score closer. Exact vectors can be pinned per text.
#[derive(Debug, Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<String>>>,
    pub default_response: String,
    pub embeddings: HashMap<String, Vec<f32>>,
    pub fail_chat: bool,
    /// Fail the embed call with this zero-based batch number.
    pub fail_embed_batch: Option<usize>,
    /// Drop the last vector of every embed response.
    pub short_embed_responses: bool,
    /// Milliseconds to sleep before answering a chat request.
    pub delay_ms: u64,
    chat_calls: Arc<Mutex<Vec<Vec<Message>>>>,
    embed_calls: Arc<Mutex<Vec<Vec<String>>>>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            default_response: "mock response".into(),
            embeddings: HashMap::new(),
            fail_chat: false,
            fail_embed_batch: None,
            short_embed_responses: false,
            delay_ms: 0,
            chat_calls: Arc::new(Mutex::new(Vec::new())),
            embed_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl MockProvider {
    #[must_use]
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_chat: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_embedding(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.embeddings.insert(text.into(), vector);
        self
    }

    #[must_use]
    pub fn with_failing_embed_batch(mut self, batch: usize) -> Self {
        self.fail_embed_batch = Some(batch);
        self
    }

    #[must_use]
    pub fn with_short_embed_responses(mut self) -> Self {
        self.short_embed_responses = true;
        self
    }

    #[must_use]
    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    /// Messages of every chat call so far.
    #[must_use]
    pub fn chat_calls(&self) -> Vec<Vec<Message>> {
        self.chat_calls.lock().unwrap().clone()
    }

    /// Inputs of every embed call so far, one entry per batch.
    #[must_use]
    pub fn embed_calls(&self) -> Vec<Vec<String>> {
        self.embed_calls.lock().unwrap().clone()
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        if let Some(v) = self.embeddings.get(text) {
            return v.clone();
        }
        letter_histogram(text)
    }
}

/// Lowercase ASCII letter counts.
#[must_use]
pub fn letter_histogram(text: &str) -> Vec<f32> {
    let mut v = vec![0.0; MOCK_EMBEDDING_DIM];
    for b in text.bytes() {
        if b.is_ascii_alphabetic() {
            v[usize::from(b.to_ascii_lowercase() - b'a')] += 1.0;
        }
    }
    v
}

impl LlmProvider for MockProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        self.chat_calls.lock().unwrap().push(messages.to_vec());
        if self.fail_chat {
            return Err(LlmError::Other("mock LLM error".into()));
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(self.default_response.clone())
        } else {
            Ok(responses.remove(0))
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let batch_no = {
            let mut calls = self.embed_calls.lock().unwrap();
            calls.push(texts.to_vec());
            calls.len() - 1
        };
        if self.fail_embed_batch == Some(batch_no) {
            return Err(LlmError::Other(format!("mock embed error in batch {batch_no}")));
        }
        let mut vectors: Vec<Vec<f32>> = texts.iter().map(|t| self.vector_for(t)).collect();
        if self.short_embed_responses {
            vectors.pop();
        }
        Ok(vectors)
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }
}
