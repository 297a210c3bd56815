//! MetaRetrieval - conversation CLI for hosted language models
//!
#![doc = "Main entry point for the MetaRetrieval application."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use metaretrieval::cli::{Cli, Commands, ModelCommand};
use metaretrieval::commands;
use metaretrieval::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    match cli.command {
        Commands::Ask { question, turn } => {
            let user = commands::require_user(cli.user)?;
            tracing::info!("Starting single question");
            commands::ask::run_ask(config, user, question, turn).await?;
            Ok(())
        }
        Commands::Chat { turn } => {
            let user = commands::require_user(cli.user)?;
            commands::chat::run_chat(config, user, turn).await?;
            Ok(())
        }
        Commands::History { command } => {
            let user = commands::require_user(cli.user)?;
            tracing::info!("Starting history command");
            commands::history::handle_history(&config, &user, command)?;
            Ok(())
        }
        Commands::Models { command } => match command {
            ModelCommand::List { json } => {
                commands::models::list_models(&config, json)?;
                Ok(())
            }
        },
    }
}

/// Initialize tracing subscriber with environment filter
///
/// Logs go to stderr so answers on stdout stay clean.
fn init_tracing(verbose: bool) {
    let default_level = if verbose {
        "metaretrieval=debug"
    } else {
        "metaretrieval=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
