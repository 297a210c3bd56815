//! Command-line interface definition for MetaRetrieval
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for asking questions, interactive chat, history
//! management and model listing.

use crate::providers::SamplingParams;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// MetaRetrieval - ask questions of hosted language models and keep a
/// per-user conversation history
#[derive(Parser, Debug, Clone)]
#[command(name = "metaretrieval")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Conversation database file (overrides config and environment)
    #[arg(long, global = true)]
    pub storage_path: Option<PathBuf>,

    /// Identity conversations are stored under
    #[arg(short, long, global = true, env = "METARETRIEVAL_USER")]
    pub user: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for MetaRetrieval
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Ask a single question and print the answer
    Ask {
        /// The question
        question: String,

        #[command(flatten)]
        turn: TurnArgs,
    },

    /// Start an interactive conversation
    Chat {
        #[command(flatten)]
        turn: TurnArgs,
    },

    /// Inspect and manage stored conversations
    History {
        /// History subcommand
        #[command(subcommand)]
        command: HistoryCommand,
    },

    /// Inspect the model registry
    Models {
        /// Model subcommand
        #[command(subcommand)]
        command: ModelCommand,
    },
}

/// Per-turn options shared by `ask` and `chat`
#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct TurnArgs {
    /// Model to use (must be in the registry)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Language to answer in
    #[arg(short, long)]
    pub language: Option<String>,

    /// Ask about the content of this file instead of the running history
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Sampling temperature (0.0 - 2.0)
    #[arg(long)]
    pub temperature: Option<f64>,

    /// Response budget in tokens; longer answers are compressed
    #[arg(long)]
    pub max_tokens: Option<usize>,

    /// Top-k sampling cutoff
    #[arg(long)]
    pub top_k: Option<u32>,

    /// Nucleus sampling threshold (0.0 - 1.0]
    #[arg(long)]
    pub top_p: Option<f64>,
}

impl TurnArgs {
    /// Apply the flags given on the command line over `base`
    ///
    /// # Examples
    ///
    /// ```
    /// use metaretrieval::cli::TurnArgs;
    /// use metaretrieval::providers::SamplingParams;
    ///
    /// let args = TurnArgs { max_tokens: Some(50), ..Default::default() };
    /// let sampling = args.sampling(SamplingParams::default());
    /// assert_eq!(sampling.max_tokens, 50);
    /// assert_eq!(sampling.top_k, 40);
    /// ```
    pub fn sampling(&self, base: SamplingParams) -> SamplingParams {
        SamplingParams {
            temperature: self.temperature.unwrap_or(base.temperature),
            max_tokens: self.max_tokens.unwrap_or(base.max_tokens),
            top_k: self.top_k.unwrap_or(base.top_k),
            top_p: self.top_p.unwrap_or(base.top_p),
        }
    }
}

/// History management subcommands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum HistoryCommand {
    /// List stored turns, most recent first
    List {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Delete a message and the answer paired with it
    Delete {
        /// Message id
        id: i64,
    },

    /// Replace the content of a stored message
    Edit {
        /// Message id
        id: i64,

        /// New content
        content: String,
    },

    /// Delete every stored message of the user
    Clear {
        /// Skip the confirmation check
        #[arg(long)]
        yes: bool,
    },
}

/// Model registry subcommands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum ModelCommand {
    /// List the models requests may use
    List {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            storage_path: None,
            user: None,
            command: Commands::Models {
                command: ModelCommand::List { json: false },
            },
        }
    }
}
