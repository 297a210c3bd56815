//! Conversation workflow: session state, answer compression and the
//! per-turn orchestration that ties the provider and the store together

pub mod compressor;
pub mod orchestrator;
pub mod session;

pub use compressor::{chunk_content, Compression, CompressionOutcome, ResponseCompressor};
pub use orchestrator::{ConversationOrchestrator, PromptMode, TurnOutcome, TurnRequest};
pub use session::SessionContext;
