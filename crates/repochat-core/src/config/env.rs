use super::{Config, ProviderKind, Secret};

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_llm();
        self.apply_env_overrides_index();
        self.apply_env_overrides_source();

        if let Ok(v) = std::env::var("REPOCHAT_API_KEY")
            && !v.trim().is_empty()
        {
            self.secrets.api_key = Some(Secret::new(v));
        }
    }

    fn apply_env_overrides_llm(&mut self) {
        if let Ok(v) = std::env::var("REPOCHAT_LLM_PROVIDER") {
            match v.parse::<ProviderKind>() {
                Ok(kind) => self.llm.provider = kind,
                Err(e) => tracing::warn!("ignoring invalid REPOCHAT_LLM_PROVIDER value: {e}"),
            }
        }
        if let Ok(v) = std::env::var("REPOCHAT_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("REPOCHAT_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("REPOCHAT_LLM_EMBEDDING_MODEL") {
            self.llm.embedding_model = v;
        }
        if let Ok(v) = std::env::var("REPOCHAT_LLM_API_VERSION") {
            self.llm.api_version = Some(v);
        }
        if let Ok(v) = std::env::var("REPOCHAT_LLM_MAX_TOKENS")
            && let Ok(n) = v.parse::<u32>()
        {
            self.llm.max_tokens = n;
        }
        if let Ok(v) = std::env::var("REPOCHAT_LLM_TEMPERATURE")
            && let Ok(t) = v.parse::<f32>()
        {
            self.llm.temperature = t;
        }
        if let Ok(v) = std::env::var("REPOCHAT_LLM_MAX_RETRIES")
            && let Ok(n) = v.parse::<u32>()
        {
            self.llm.max_retries = n;
        }
        if let Ok(v) = std::env::var("REPOCHAT_LLM_TIMEOUT")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.llm.timeout_secs = secs;
        }
    }

    fn apply_env_overrides_index(&mut self) {
        if let Ok(v) = std::env::var("REPOCHAT_INDEX_CHUNK_SIZE")
            && let Ok(n) = v.parse::<usize>()
        {
            self.index.chunk_size = n;
        }
        if let Ok(v) = std::env::var("REPOCHAT_INDEX_EMBED_BATCH_SIZE")
            && let Ok(n) = v.parse::<usize>()
        {
            self.index.embed_batch_size = n;
        }
        if let Ok(v) = std::env::var("REPOCHAT_INDEX_TOP_K")
            && let Ok(n) = v.parse::<usize>()
        {
            self.index.top_k = n;
        }
    }

    fn apply_env_overrides_source(&mut self) {
        if let Ok(v) = std::env::var("REPOCHAT_SOURCE_MAX_FILE_BYTES")
            && let Ok(n) = v.parse::<u64>()
        {
            self.source.max_file_bytes = n;
        }
        if let Ok(v) = std::env::var("REPOCHAT_SOURCE_INCLUDE_HIDDEN") {
            match v.trim().parse::<bool>() {
                Ok(b) => self.source.include_hidden = b,
                Err(e) => {
                    tracing::warn!("ignoring invalid REPOCHAT_SOURCE_INCLUDE_HIDDEN value: {e}");
                }
            }
        }
    }
}
