//! Grounded chat over ingested repositories: sessions, prompt assembly,
//! configuration, and corpus sources.

pub mod config;
pub mod error;
pub mod prompt;
pub mod session;
pub mod source;

pub use error::ChatError;
pub use session::{ChatService, NO_RELEVANT_INFORMATION, Turn};
