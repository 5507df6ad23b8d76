//! Ordered, batched embedding on top of an [`LlmProvider`].

use std::num::NonZeroUsize;
use std::sync::Arc;

use repochat_llm::LlmProvider;

use crate::error::EmbeddingError;

/// Default number of texts sent per embedding request.
pub const DEFAULT_EMBED_BATCH_SIZE: NonZeroUsize = NonZeroUsize::new(20).unwrap();

/// Embeds texts in fixed-size sequential batches.
///
/// Batches are awaited one after another so the output order always matches the
/// input order. Any batch failure aborts the whole call; nothing is retried.
#[derive(Debug)]
pub struct Embedder<P> {
    provider: Arc<P>,
    batch_size: NonZeroUsize,
}

impl<P> Clone for Embedder<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            batch_size: self.batch_size,
        }
    }
}

impl<P: LlmProvider> Embedder<P> {
    #[must_use]
    pub fn new(provider: Arc<P>, batch_size: NonZeroUsize) -> Self {
        Self {
            provider,
            batch_size,
        }
    }

    #[must_use]
    pub fn batch_size(&self) -> NonZeroUsize {
        self.batch_size
    }

    #[must_use]
    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    /// Embed `texts`, returning one vector per text in the same order.
    ///
    /// All returned vectors share one dimensionality.
    ///
    /// # Errors
    ///
    /// Returns an error if a provider call fails, a batch comes back with the
    /// wrong number of vectors, or vector dimensionality is empty or inconsistent.
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut vectors = Vec::with_capacity(texts.len());
        let mut dimension: Option<usize> = None;

        for (batch_no, batch) in texts.chunks(self.batch_size.get()).enumerate() {
            let embedded = self.provider.embed_batch(batch).await?;
            if embedded.len() != batch.len() {
                return Err(EmbeddingError::CountMismatch {
                    requested: batch.len(),
                    received: embedded.len(),
                });
            }

            for vector in &embedded {
                let expected = *dimension.get_or_insert(vector.len());
                if vector.is_empty() {
                    return Err(EmbeddingError::EmptyVector);
                }
                if vector.len() != expected {
                    return Err(EmbeddingError::DimensionMismatch {
                        expected,
                        actual: vector.len(),
                    });
                }
            }

            tracing::debug!(
                provider = self.provider.name(),
                batch = batch_no,
                size = batch.len(),
                "embedded batch"
            );
            vectors.extend(embedded);
        }

        Ok(vectors)
    }

    /// Embed a single text as a one-element batch.
    ///
    /// # Errors
    ///
    /// Same as [`Embedder::embed`].
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed(&[text.to_owned()]).await?;
        vectors.pop().ok_or(EmbeddingError::CountMismatch {
            requested: 1,
            received: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use repochat_llm::mock::{MOCK_EMBEDDING_DIM, MockProvider, letter_histogram};

    use super::*;

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("text number {i}")).collect()
    }

    fn batch(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[tokio::test]
    async fn empty_input_makes_no_calls() {
        let provider = Arc::new(MockProvider::default());
        let embedder = Embedder::new(Arc::clone(&provider), DEFAULT_EMBED_BATCH_SIZE);
        let vectors = embedder.embed(&[]).await.unwrap();
        assert!(vectors.is_empty());
        assert!(provider.embed_calls().is_empty());
    }

    #[tokio::test]
    async fn splits_into_sequential_batches() {
        let provider = Arc::new(MockProvider::default());
        let embedder = Embedder::new(Arc::clone(&provider), DEFAULT_EMBED_BATCH_SIZE);
        let input = texts(45);

        let vectors = embedder.embed(&input).await.unwrap();

        assert_eq!(vectors.len(), 45);
        let sizes: Vec<usize> = provider.embed_calls().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![20, 20, 5]);
        let flattened: Vec<String> = provider.embed_calls().concat();
        assert_eq!(flattened, input);
    }

    #[tokio::test]
    async fn output_order_matches_input() {
        let provider = Arc::new(
            MockProvider::default()
                .with_embedding("first", vec![1.0, 0.0])
                .with_embedding("second", vec![0.0, 1.0])
                .with_embedding("third", vec![1.0, 1.0]),
        );
        let embedder = Embedder::new(provider, batch(2));
        let input = vec!["first".to_owned(), "second".to_owned(), "third".to_owned()];

        let vectors = embedder.embed(&input).await.unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]]);
    }

    #[tokio::test]
    async fn failing_batch_aborts_whole_call() {
        let provider = Arc::new(MockProvider::default().with_failing_embed_batch(1));
        let embedder = Embedder::new(Arc::clone(&provider), batch(2));

        let err = embedder.embed(&texts(5)).await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Provider(_)));
        // the third batch is never sent
        assert_eq!(provider.embed_calls().len(), 2);
    }

    #[tokio::test]
    async fn short_response_is_count_mismatch() {
        let provider = Arc::new(MockProvider::default().with_short_embed_responses());
        let embedder = Embedder::new(provider, DEFAULT_EMBED_BATCH_SIZE);

        let err = embedder.embed(&texts(3)).await.unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::CountMismatch {
                requested: 3,
                received: 2
            }
        ));
    }

    #[tokio::test]
    async fn inconsistent_dimension_rejected() {
        let provider = Arc::new(
            MockProvider::default()
                .with_embedding("a", vec![1.0, 0.0])
                .with_embedding("b", vec![1.0, 0.0, 0.0]),
        );
        let embedder = Embedder::new(provider, batch(1));

        let err = embedder
            .embed(&["a".to_owned(), "b".to_owned()])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[tokio::test]
    async fn empty_vector_rejected() {
        let provider = Arc::new(MockProvider::default().with_embedding("a", vec![]));
        let embedder = Embedder::new(provider, DEFAULT_EMBED_BATCH_SIZE);
        let err = embedder.embed(&["a".to_owned()]).await.unwrap_err();
        assert!(matches!(err, EmbeddingError::EmptyVector));
    }

    #[tokio::test]
    async fn embed_one_uses_single_batch() {
        let provider = Arc::new(MockProvider::default());
        let embedder = Embedder::new(Arc::clone(&provider), DEFAULT_EMBED_BATCH_SIZE);

        let vector = embedder.embed_one("abc").await.unwrap();
        assert_eq!(vector.len(), MOCK_EMBEDDING_DIM);
        assert_eq!(vector, letter_histogram("abc"));
        assert_eq!(provider.embed_calls(), vec![vec!["abc".to_owned()]]);
    }

    mod proptest_embedder {
        use super::*;
        use proptest::prelude::*;

        fn run<F: std::future::Future>(f: F) -> F::Output {
            tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap()
                .block_on(f)
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(64))]

            #[test]
            fn batch_size_does_not_change_output(
                input in proptest::collection::vec("[a-z ]{1,30}", 0..70),
                size in 1usize..40,
            ) {
                let batched = Embedder::new(Arc::new(MockProvider::default()), batch(size));
                let single = Embedder::new(
                    Arc::new(MockProvider::default()),
                    batch(input.len().max(1)),
                );

                let a = run(batched.embed(&input)).unwrap();
                let b = run(single.embed(&input)).unwrap();
                prop_assert_eq!(a.len(), input.len());
                prop_assert_eq!(a, b);
            }
        }
    }
}
