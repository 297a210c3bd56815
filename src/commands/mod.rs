/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint:

- `ask`: Ask one question and print the answer
- `chat`: Interactive conversation
- `history`: List, delete, edit and clear stored messages
- `models`: Show the model registry

The handlers are thin; the conversation workflow itself lives in
[`crate::conversation`].
*/

use crate::cli::TurnArgs;
use crate::conversation::{CompressionOutcome, SessionContext, TurnOutcome, TurnRequest};
use crate::error::{MetaRetrievalError, Result};
use crate::providers::SamplingParams;
use colored::Colorize;
use std::path::Path;

// Special commands parser for the interactive session
pub mod special_commands;

// Stored conversation management
pub mod history;

// Model registry commands
pub mod models;

/// Resolve the identity to store messages under
///
/// # Errors
///
/// Returns `InvalidInput` when neither `--user` nor `METARETRIEVAL_USER`
/// supplied one
pub fn require_user(user: Option<String>) -> Result<String> {
    match user {
        Some(user) if !user.trim().is_empty() => Ok(user),
        _ => Err(MetaRetrievalError::InvalidInput(
            "no user given; pass --user or set METARETRIEVAL_USER".to_string(),
        )
        .into()),
    }
}

/// Read a file to attach to the session
pub fn read_attachment(path: &Path) -> Result<String> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        MetaRetrievalError::InvalidInput(format!("Failed to read {}: {}", path.display(), e))
    })?;
    if content.trim().is_empty() {
        return Err(
            MetaRetrievalError::InvalidInput(format!("{} is empty", path.display())).into(),
        );
    }
    tracing::debug!("Attached {} ({} bytes)", path.display(), content.len());
    Ok(content)
}

/// Build the turn request for `question`, switching to file mode when the
/// session has an attachment
pub fn build_request(
    session: &SessionContext,
    question: impl Into<String>,
    model: Option<&str>,
    language: Option<&str>,
    sampling: SamplingParams,
) -> TurnRequest {
    let mut request = if session.attachment().is_some() {
        TurnRequest::file(question, sampling)
    } else {
        TurnRequest::direct(question, sampling)
    };
    request.model = model.map(str::to_string);
    request.language = language.map(str::to_string);
    request
}

/// One-line summary of a turn's metrics
pub fn format_metrics(outcome: &TurnOutcome) -> String {
    let mut line = format!(
        "{} | {:.2}s | {} prompt + {} response = {} tokens",
        outcome.model,
        outcome.elapsed_secs,
        outcome.prompt_tokens,
        outcome.response_tokens,
        outcome.total_tokens
    );
    match outcome.compression {
        CompressionOutcome::Compressed => line.push_str(&format!(
            " | compressed from {} tokens",
            outcome.original_response_tokens
        )),
        CompressionOutcome::Degraded => line.push_str(" | compression failed, answer kept in full"),
        CompressionOutcome::Unchanged => {}
    }
    line
}

fn print_outcome(outcome: &TurnOutcome) {
    println!("\n{}\n", outcome.content);
    println!("{}\n", format_metrics(outcome).dimmed());
}

// Single question handler
pub mod ask {
    //! One-shot question handler.

    use super::*;
    use crate::config::Config;
    use crate::conversation::ConversationOrchestrator;

    /// Ask `question` as `user` and print the answer
    ///
    /// With `--file` the question is asked about that file's content;
    /// otherwise it is asked on its own.
    pub async fn run_ask(
        config: Config,
        user: String,
        question: String,
        turn: TurnArgs,
    ) -> Result<()> {
        let orchestrator = ConversationOrchestrator::from_config(&config)?;
        let mut session = SessionContext::new(user)?;
        if let Some(path) = &turn.file {
            session.attach_file(read_attachment(path)?);
        }

        let request = build_request(
            &session,
            question,
            turn.model.as_deref(),
            turn.language.as_deref(),
            turn.sampling(config.sampling),
        );
        let outcome = orchestrator.ask(&mut session, &request).await?;
        print_outcome(&outcome);
        Ok(())
    }
}

// Interactive session handler
pub mod chat {
    //! Interactive conversation handler.
    //!
    //! Runs a readline loop; every line that is not a special command is
    //! sent through the orchestrator as one turn. The session's history
    //! lives only as long as the loop.

    use super::special_commands::{parse_special_command, print_help, SpecialCommand};
    use super::*;
    use crate::config::Config;
    use crate::conversation::ConversationOrchestrator;
    use rustyline::error::ReadlineError;
    use rustyline::DefaultEditor;

    /// Start an interactive conversation as `user`
    pub async fn run_chat(config: Config, user: String, turn: TurnArgs) -> Result<()> {
        tracing::info!("Starting interactive chat");

        let orchestrator = ConversationOrchestrator::from_config(&config)?;
        let mut session = SessionContext::new(user)?;
        let mut model = orchestrator.registry().resolve(turn.model.as_deref())?;
        let mut language = config
            .conversation
            .resolve_language(turn.language.as_deref())?;
        let sampling = turn.sampling(config.sampling);
        sampling.validate()?;

        if let Some(path) = &turn.file {
            session.attach_file(read_attachment(path)?);
        }

        let mut rl = DefaultEditor::new()?;
        print_welcome_banner(session.owner(), &model, &language);

        loop {
            let prompt = if session.attachment().is_some() {
                format!("{} ", "[file] >>".cyan())
            } else {
                format!("{} ", ">>".green())
            };
            match rl.readline(&prompt) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    rl.add_history_entry(trimmed)?;

                    match parse_special_command(trimmed) {
                        Ok(SpecialCommand::None) => {}
                        Ok(SpecialCommand::Exit) => break,
                        Ok(SpecialCommand::Help) => {
                            print_help();
                            continue;
                        }
                        Ok(SpecialCommand::ShowStatus) => {
                            print_status(
                                &session,
                                &model,
                                &language,
                                orchestrator.store().db_path(),
                            );
                            continue;
                        }
                        Ok(SpecialCommand::ShowHistory) => {
                            match orchestrator.store().turns(session.owner()) {
                                Ok(turns) if turns.is_empty() => {
                                    println!("{}", "No conversation history found.".yellow())
                                }
                                Ok(turns) => {
                                    super::history::turns_table(&turns).printstd();
                                }
                                Err(e) => eprintln!("{}", format!("Error: {}", e).red()),
                            }
                            continue;
                        }
                        Ok(SpecialCommand::Attach(path)) => {
                            match read_attachment(&path) {
                                Ok(content) => {
                                    session.attach_file(content);
                                    println!("Attached {}", path.display().to_string().cyan());
                                    if session.show_once("file-mode") {
                                        println!(
                                            "{}",
                                            "Questions now refer to the attached file only; \
                                             use /detach to return to the conversation."
                                                .yellow()
                                        );
                                    }
                                }
                                Err(e) => eprintln!("{}", format!("Error: {}", e).red()),
                            }
                            continue;
                        }
                        Ok(SpecialCommand::Detach) => {
                            session.clear_attachment();
                            println!("Attachment dropped");
                            continue;
                        }
                        Ok(SpecialCommand::SwitchModel(name)) => {
                            match orchestrator.registry().resolve(Some(&name)) {
                                Ok(resolved) => {
                                    model = resolved;
                                    println!("Using model {}", model.cyan());
                                }
                                Err(e) => eprintln!("{}", format!("Error: {}", e).red()),
                            }
                            continue;
                        }
                        Ok(SpecialCommand::SwitchLanguage(name)) => {
                            match config.conversation.resolve_language(Some(&name)) {
                                Ok(resolved) => {
                                    language = resolved;
                                    println!("Answering in {}", language.cyan());
                                }
                                Err(e) => eprintln!("{}", format!("Error: {}", e).red()),
                            }
                            continue;
                        }
                        Err(e) => {
                            eprintln!("{}", e.to_string().red());
                            continue;
                        }
                    }

                    let request =
                        build_request(&session, trimmed, Some(&model), Some(&language), sampling);
                    match orchestrator.ask(&mut session, &request).await {
                        Ok(outcome) => print_outcome(&outcome),
                        Err(e) => eprintln!("{}\n", format!("Error: {}", e).red()),
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("CTRL-C");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    println!("CTRL-D");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {:?}", err);
                    break;
                }
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    fn print_welcome_banner(owner: &str, model: &str, language: &str) {
        println!(
            "\n{} as {} using {} ({})",
            "MetaRetrieval chat".bold(),
            owner.cyan(),
            model.cyan(),
            language
        );
        println!("Type /help for commands, exit to leave.\n");
    }

    fn print_status(session: &SessionContext, model: &str, language: &str, db_path: &Path) {
        println!("User:       {}", session.owner());
        println!("Model:      {}", model);
        println!("Language:   {}", language);
        println!(
            "Mode:       {}",
            if session.attachment().is_some() {
                "file"
            } else {
                "direct"
            }
        );
        println!("Messages:   {}", session.history().len());
        println!("History:    {}", db_path.display());
    }
}
