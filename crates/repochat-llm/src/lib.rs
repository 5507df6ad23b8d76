//! Chat and embedding provider abstraction.
//!
//! The retrieval core only talks to [`LlmProvider`]; the concrete backend is an
//! OpenAI-compatible HTTP client that also speaks the Azure OpenAI dialect.

pub mod error;
pub mod http;
#[cfg(feature = "mock")]
pub mod mock;
pub mod openai;
pub mod provider;
pub(crate) mod retry;

pub use error::LlmError;
pub use provider::{LlmProvider, Message, Role};
