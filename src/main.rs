use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;

use repochat_core::config::{Config, ProviderKind, resolve_config_path};
use repochat_core::source::{CorpusSource, DirectorySource};
use repochat_core::{ChatError, ChatService};
use repochat_index::{CorpusIndex, Embedder};
use repochat_llm::LlmProvider;
use repochat_llm::openai::{ApiFlavor, OpenAiProvider};

/// Ask questions about a source repository.
#[derive(Debug, Parser)]
#[command(name = "repochat", version, about)]
struct Cli {
    /// Config file (defaults to `REPOCHAT_CONFIG`, then config/default.toml).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Path to a local checkout of the repository. Remote URLs are not
    /// supported; clone the repository first.
    locator: String,
}

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Quit,
    Clear,
    Ask(&'a str),
    Skip,
}

fn parse_command(line: &str) -> Command<'_> {
    match line.trim() {
        "" => Command::Skip,
        "exit" | "quit" => Command::Quit,
        "clear" => Command::Clear,
        query => Command::Ask(query),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_subscriber();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config.as_deref());
    let config = Config::load(&config_path)?;
    config.validate()?;

    let provider = Arc::new(create_provider(&config)?);
    let embedder = Embedder::new(Arc::clone(&provider), config.embed_batch_size()?);
    let index = CorpusIndex::new(embedder)
        .with_chunk_size(config.index.chunk_size)
        .with_default_top_k(config.index.top_k);
    let chat = ChatService::new(Arc::new(index), provider);

    let source = DirectorySource::from_config(&config.source);
    let fetched = source
        .fetch(&cli.locator)
        .await
        .with_context(|| format!("failed to read {}", cli.locator))?;
    let units = chat
        .ingest(&fetched.key, &fetched.text)
        .await
        .context("failed to index repository")?;
    println!("Indexed {} ({units} chunks). Type `clear` to reset, `exit` to quit.", fetched.key);

    let lines = spawn_stdin_reader();
    repl(&chat, &fetched.key, lines, std::io::stdout()).await
}

fn create_provider(config: &Config) -> anyhow::Result<OpenAiProvider> {
    let api_key = config
        .secrets
        .api_key
        .as_ref()
        .context("REPOCHAT_API_KEY is not set")?;
    let client = repochat_llm::http::default_client(Duration::from_secs(config.llm.timeout_secs))?;

    let llm = &config.llm;
    let flavor = match llm.provider {
        ProviderKind::OpenAi => ApiFlavor::OpenAi,
        ProviderKind::Azure => ApiFlavor::Azure {
            api_version: llm
                .api_version
                .clone()
                .context("llm.api_version is required for the azure provider")?,
        },
    };

    Ok(OpenAiProvider::new(
        client,
        api_key.expose().to_owned(),
        llm.base_url.clone(),
        llm.model.clone(),
        Some(llm.embedding_model.clone()),
    )
    .with_flavor(flavor)
    .with_sampling(llm.max_tokens, llm.temperature)
    .with_max_retries(llm.max_retries))
}

/// Read stdin on a detached thread; the channel closes on EOF.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(1);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut line = String::new();
        loop {
            line.clear();
            match stdin.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {
                    if tx.blocking_send(line.clone()).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!("failed to read stdin: {e}");
                    break;
                }
            }
        }
    });
    rx
}

async fn repl<P: LlmProvider>(
    chat: &ChatService<P>,
    key: &str,
    mut lines: mpsc::Receiver<String>,
    mut out: impl Write,
) -> anyhow::Result<()> {
    loop {
        write!(out, "You: ")?;
        out.flush()?;
        let Some(line) = lines.recv().await else {
            writeln!(out)?;
            break;
        };

        match parse_command(&line) {
            Command::Skip => {}
            Command::Quit => break,
            Command::Clear => {
                chat.clear(key)?;
                writeln!(out, "History cleared.")?;
            }
            Command::Ask(query) => match chat.ask(key, query).await {
                Ok(answer) => writeln!(out, "Assistant: {answer}")?,
                Err(e @ (ChatError::Generation(_) | ChatError::Embedding(_))) => {
                    tracing::warn!("question failed: {e}");
                    writeln!(out, "Error: {e}")?;
                }
                Err(e) => return Err(e.into()),
            },
        }
    }
    Ok(())
}

fn init_subscriber() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}
