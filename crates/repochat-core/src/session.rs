//! Per-corpus chat sessions over a [`CorpusIndex`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use repochat_index::CorpusIndex;
use repochat_llm::{LlmProvider, Role};

use crate::error::ChatError;
use crate::prompt::{build_context, grounded_messages};

/// Answer given when retrieval finds nothing to ground on.
pub const NO_RELEVANT_INFORMATION: &str = "No relevant information found in the repository.";

/// One entry of a session's conversation history.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

type History = Arc<Mutex<Vec<Turn>>>;

/// Grounded question answering, one session per corpus key.
///
/// A session becomes active once its corpus is ingested. Turns are appended
/// only after an answer is available, so a failed or dropped `ask` leaves the
/// history as it was.
pub struct ChatService<P> {
    index: Arc<CorpusIndex<P>>,
    provider: Arc<P>,
    histories: RwLock<HashMap<String, History>>,
}

impl<P> std::fmt::Debug for ChatService<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatService")
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

impl<P: LlmProvider> ChatService<P> {
    #[must_use]
    pub fn new(index: Arc<CorpusIndex<P>>, provider: Arc<P>) -> Self {
        Self {
            index,
            provider,
            histories: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn index(&self) -> &Arc<CorpusIndex<P>> {
        &self.index
    }

    /// Ingest `raw_text` under `key` and activate its session.
    ///
    /// Re-ingesting an active key replaces the corpus and keeps the history.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::Ingest` if the corpus cannot be built; an
    /// uninitialized session stays uninitialized.
    pub async fn ingest(&self, key: &str, raw_text: &str) -> Result<usize, ChatError> {
        let count = self.index.ingest(key, raw_text).await?;
        let mut histories = self
            .histories
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if self.index.contains(key) {
            histories.entry(key.to_owned()).or_default();
        }
        Ok(count)
    }

    /// Answer `query` from the corpus stored under `key`.
    ///
    /// When retrieval finds nothing, [`NO_RELEVANT_INFORMATION`] is returned
    /// without calling the model.
    ///
    /// # Errors
    ///
    /// `UnknownCorpus` for an inactive key, `Embedding` if the query cannot be
    /// embedded, `Generation` if the model call fails.
    #[tracing::instrument(skip(self, query), fields(query_len = query.len()))]
    pub async fn ask(&self, key: &str, query: &str) -> Result<String, ChatError> {
        let history = self.session(key)?;
        let hits = self.index.retrieve(key, query).await?;

        let answer = if hits.is_empty() {
            tracing::info!("no relevant units, answering with fallback");
            NO_RELEVANT_INFORMATION.to_owned()
        } else {
            let messages = grounded_messages(&build_context(&hits), query);
            self.provider
                .chat(&messages)
                .await
                .map_err(ChatError::Generation)?
        };

        history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend([Turn::user(query), Turn::assistant(answer.clone())]);
        Ok(answer)
    }

    /// Drop every turn of the session under `key`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownCorpus` for an inactive key.
    pub fn clear(&self, key: &str) -> Result<(), ChatError> {
        self.session(key)?
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        tracing::debug!(key, "history cleared");
        Ok(())
    }

    /// Snapshot of the turns recorded for `key`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownCorpus` for an inactive key.
    pub fn history(&self, key: &str) -> Result<Vec<Turn>, ChatError> {
        Ok(self
            .session(key)?
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    /// Remove the corpus and its history. Returns whether the corpus existed.
    pub fn evict(&self, key: &str) -> bool {
        let mut histories = self
            .histories
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        histories.remove(key);
        self.index.evict(key)
    }

    fn session(&self, key: &str) -> Result<History, ChatError> {
        if let Some(history) = self
            .histories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            && self.index.contains(key)
        {
            return Ok(Arc::clone(history));
        }

        // evict holds this lock, so the corpus check below is final
        let mut histories = self
            .histories
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if !self.index.contains(key) {
            histories.remove(key);
            return Err(ChatError::UnknownCorpus(key.to_owned()));
        }
        Ok(Arc::clone(histories.entry(key.to_owned()).or_default()))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use repochat_index::{Embedder, IngestError};
    use repochat_llm::mock::MockProvider;

    use super::*;

    const REPO: &str = "https://github.com/acme/widgets";
    const TEXT: &str = "Widgets are built with cargo.\n\nThe frobnicator lives in src/frob.rs.";

    fn service(provider: MockProvider) -> ChatService<MockProvider> {
        let provider = Arc::new(provider);
        let embedder = Embedder::new(Arc::clone(&provider), repochat_index::DEFAULT_EMBED_BATCH_SIZE);
        let index = CorpusIndex::new(embedder).with_chunk_size(40);
        ChatService::new(Arc::new(index), provider)
    }

    #[tokio::test]
    async fn operations_on_uninitialized_key_fail() {
        let chat = service(MockProvider::default());
        assert!(matches!(
            chat.ask(REPO, "hi").await,
            Err(ChatError::UnknownCorpus(_))
        ));
        assert!(matches!(chat.clear(REPO), Err(ChatError::UnknownCorpus(_))));
        assert!(matches!(chat.history(REPO), Err(ChatError::UnknownCorpus(_))));
    }

    #[tokio::test]
    async fn ingest_activates_with_empty_history() {
        let chat = service(MockProvider::default());
        assert_eq!(chat.ingest(REPO, TEXT).await.unwrap(), 2);
        assert!(chat.history(REPO).unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_ingest_stays_uninitialized() {
        let chat = service(MockProvider::default());
        let err = chat.ingest(REPO, "").await.unwrap_err();
        assert!(matches!(err, ChatError::Ingest(IngestError::EmptyCorpus)));
        assert!(matches!(chat.history(REPO), Err(ChatError::UnknownCorpus(_))));
    }

    #[tokio::test]
    async fn ask_appends_user_and_assistant_turns() {
        let provider = MockProvider::with_responses(vec!["In src/frob.rs.".into()]);
        let chat = service(provider.clone());
        chat.ingest(REPO, TEXT).await.unwrap();

        let answer = chat.ask(REPO, "where is the frobnicator?").await.unwrap();

        assert_eq!(answer, "In src/frob.rs.");
        assert_eq!(
            chat.history(REPO).unwrap(),
            vec![
                Turn::user("where is the frobnicator?"),
                Turn::assistant("In src/frob.rs."),
            ]
        );
        let calls = provider.chat_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].len(), 2);
        assert!(calls[0][1].content.contains("frobnicator"));
    }

    #[tokio::test]
    async fn prompt_never_carries_earlier_turns() {
        let provider = MockProvider::default();
        let chat = service(provider.clone());
        chat.ingest(REPO, TEXT).await.unwrap();

        chat.ask(REPO, "first question about cargo").await.unwrap();
        chat.ask(REPO, "second question about widgets").await.unwrap();

        let calls = provider.chat_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].len(), 2);
        assert!(!calls[1][1].content.contains("first question"));
        assert_eq!(chat.history(REPO).unwrap().len(), 4);
    }

    #[tokio::test]
    async fn clear_then_ask_leaves_two_turns() {
        let chat = service(MockProvider::default());
        chat.ingest(REPO, TEXT).await.unwrap();
        chat.ask(REPO, "what builds widgets?").await.unwrap();
        chat.ask(REPO, "anything else?").await.unwrap();

        chat.clear(REPO).unwrap();
        assert!(chat.history(REPO).unwrap().is_empty());

        chat.ask(REPO, "what builds widgets?").await.unwrap();
        assert_eq!(chat.history(REPO).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn empty_retrieval_answers_with_fallback() {
        let provider = MockProvider::default();
        let chat = service(provider.clone());
        // digits embed to the zero vector and are never ranked
        chat.ingest(REPO, "1234\n\n5678").await.unwrap();

        let answer = chat.ask(REPO, "where is main?").await.unwrap();

        assert_eq!(answer, NO_RELEVANT_INFORMATION);
        assert!(provider.chat_calls().is_empty());
        assert_eq!(
            chat.history(REPO).unwrap(),
            vec![
                Turn::user("where is main?"),
                Turn::assistant(NO_RELEVANT_INFORMATION),
            ]
        );
    }

    #[tokio::test]
    async fn generation_failure_leaves_history_unchanged() {
        let chat = service(MockProvider::failing());
        chat.ingest(REPO, TEXT).await.unwrap();

        let err = chat.ask(REPO, "what builds widgets?").await.unwrap_err();

        assert!(matches!(err, ChatError::Generation(_)));
        assert!(chat.history(REPO).unwrap().is_empty());
    }

    #[tokio::test]
    async fn dropped_ask_leaves_history_unchanged() {
        let chat = service(MockProvider::default().with_delay(500));
        chat.ingest(REPO, TEXT).await.unwrap();

        let outcome =
            tokio::time::timeout(Duration::from_millis(20), chat.ask(REPO, "cargo?")).await;

        assert!(outcome.is_err());
        assert!(chat.history(REPO).unwrap().is_empty());
    }

    #[tokio::test]
    async fn reingest_keeps_history() {
        let chat = service(MockProvider::default());
        chat.ingest(REPO, TEXT).await.unwrap();
        chat.ask(REPO, "cargo?").await.unwrap();

        chat.ingest(REPO, "Widgets moved to crates/widgets.").await.unwrap();
        assert_eq!(chat.history(REPO).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn evict_removes_corpus_and_history() {
        let chat = service(MockProvider::default());
        chat.ingest(REPO, TEXT).await.unwrap();
        chat.ask(REPO, "cargo?").await.unwrap();

        assert!(chat.evict(REPO));
        assert!(!chat.index().contains(REPO));
        assert!(matches!(chat.history(REPO), Err(ChatError::UnknownCorpus(_))));
        assert!(!chat.evict(REPO));
    }

    #[tokio::test]
    async fn corpus_ingested_through_index_gets_a_session() {
        let chat = service(MockProvider::default());
        chat.index().ingest(REPO, TEXT).await.unwrap();
        assert!(chat.history(REPO).unwrap().is_empty());
        chat.ask(REPO, "cargo?").await.unwrap();
        assert_eq!(chat.history(REPO).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn concurrent_asks_on_different_keys() {
        let chat = Arc::new(service(MockProvider::default().with_delay(10)));
        chat.ingest("left", "alpha beta gamma").await.unwrap();
        chat.ingest("right", "delta epsilon zeta").await.unwrap();

        let handles: Vec<_> = ["left", "right"]
            .into_iter()
            .map(|key| {
                let chat = Arc::clone(&chat);
                tokio::spawn(async move { chat.ask(key, "alpha delta").await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(chat.history("left").unwrap().len(), 2);
        assert_eq!(chat.history("right").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn index_side_evict_leaves_no_history_behind() {
        let chat = service(MockProvider::default());
        chat.ingest(REPO, TEXT).await.unwrap();
        chat.ask(REPO, "cargo?").await.unwrap();

        assert!(chat.index().evict(REPO));
        assert!(matches!(chat.history(REPO), Err(ChatError::UnknownCorpus(_))));
        assert!(!chat.histories.read().unwrap().contains_key(REPO));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn evict_racing_with_lookups_leaves_no_orphan() {
        let chat = Arc::new(service(MockProvider::default()));
        for round in 0..50 {
            chat.ingest(REPO, TEXT).await.unwrap();
            let readers: Vec<_> = (0..4)
                .map(|_| {
                    let chat = Arc::clone(&chat);
                    tokio::spawn(async move {
                        for _ in 0..20 {
                            let _ = chat.history(REPO);
                        }
                    })
                })
                .collect();
            let evictor = {
                let chat = Arc::clone(&chat);
                tokio::spawn(async move { chat.evict(REPO) })
            };
            assert!(evictor.await.unwrap(), "round {round}");
            for reader in readers {
                reader.await.unwrap();
            }

            assert!(!chat.index().contains(REPO));
            assert!(
                !chat.histories.read().unwrap().contains_key(REPO),
                "orphaned history in round {round}"
            );
        }
    }
}
