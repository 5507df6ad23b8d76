mod env;
mod types;


pub use types::*;

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};

/// Config file used when neither `--config` nor `REPOCHAT_CONFIG` is given.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first offending setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.index.chunk_size == 0 {
            bail!("index.chunk_size must be greater than 0");
        }
        if self.index.embed_batch_size == 0 {
            bail!("index.embed_batch_size must be greater than 0");
        }
        if self.index.top_k == 0 {
            bail!("index.top_k must be greater than 0");
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            bail!(
                "llm.temperature must be within 0.0..=2.0, got {}",
                self.llm.temperature
            );
        }
        if self.llm.timeout_secs == 0 {
            bail!("llm.timeout_secs must be greater than 0");
        }
        if self.llm.base_url.trim().is_empty() {
            bail!("llm.base_url must not be empty");
        }
        if self.llm.provider == ProviderKind::Azure && self.llm.api_version.is_none() {
            bail!("llm.api_version is required for the azure provider");
        }
        Ok(())
    }

    /// Embedding batch size as a non-zero value.
    ///
    /// # Errors
    ///
    /// Returns an error if `index.embed_batch_size` is zero.
    pub fn embed_batch_size(&self) -> anyhow::Result<NonZeroUsize> {
        NonZeroUsize::new(self.index.embed_batch_size)
            .context("index.embed_batch_size must be greater than 0")
    }
}

/// Resolve the config path: `--config <path>`, then `REPOCHAT_CONFIG`, then
/// [`DEFAULT_CONFIG_PATH`].
#[must_use]
pub fn resolve_config_path(cli: Option<&Path>) -> PathBuf {
    if let Some(path) = cli {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("REPOCHAT_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from(DEFAULT_CONFIG_PATH)
}
