//! MetaRetrieval - conversation library for hosted language models
//!
//! This library provides the conversation core: sending questions to an
//! OpenAI-compatible completion endpoint, compressing over-budget answers,
//! and keeping a per-user conversation history in SQLite.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `tokens`: Whitespace token counting shared by every component
//! - `providers`: Completion client abstraction, HTTP client and model registry
//! - `conversation`: Session state, response compression and turn orchestration
//! - `storage`: Owner-scoped message repository and turn pairing
//! - `prompts`: Question and summarization prompt text
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli` / `commands`: Command-line interface and its handlers
//!
//! # Example
//!
//! ```no_run
//! use metaretrieval::config::Config;
//! use metaretrieval::conversation::{ConversationOrchestrator, SessionContext, TurnRequest};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/config.yaml", &Default::default())?;
//!     config.validate()?;
//!
//!     let orchestrator = ConversationOrchestrator::from_config(&config)?;
//!     let mut session = SessionContext::new("alice")?;
//!     let outcome = orchestrator
//!         .ask(&mut session, &TurnRequest::direct("What is rust?", config.sampling))
//!         .await?;
//!     println!("{}", outcome.content);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod conversation;
pub mod error;
pub mod prompts;
pub mod providers;
pub mod storage;
pub mod tokens;

// Re-export commonly used types
pub use config::Config;
pub use conversation::{ConversationOrchestrator, SessionContext, TurnOutcome, TurnRequest};
pub use error::{MetaRetrievalError, Result};
pub use storage::SqliteConversationStore;
pub use tokens::count_tokens;

#[cfg(test)]
pub mod test_utils;
