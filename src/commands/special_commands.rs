//! Special commands parser for interactive chat
//!
//! Special commands change the session instead of being sent to the
//! model. They let the user:
//! - Attach or detach a file and switch between direct and file questions
//! - Pick another model or answer language
//! - Show the current session settings and stored turns
//! - Exit the session
//!
//! Commands are prefixed with `/` and are case-insensitive; arguments keep
//! their case.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when parsing special commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command was entered
    #[error("Unknown command: {0}\n\nType '/help' to see available commands")]
    UnknownCommand(String),

    /// Command requires an argument but none was provided
    #[error("Command {command} requires an argument\n\nUsage: {usage}")]
    MissingArgument { command: String, usage: String },
}

/// Special commands that can be executed during interactive chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialCommand {
    /// Read a file and ask following questions about it
    Attach(PathBuf),

    /// Drop the attached file and return to direct questions
    Detach,

    /// Use another model for following turns
    SwitchModel(String),

    /// Answer in another language for following turns
    SwitchLanguage(String),

    /// Display current model, language and attachment
    ShowStatus,

    /// Display the stored turns of the session's user
    ShowHistory,

    /// Display help information
    Help,

    /// Exit the session
    Exit,

    /// Not a special command; send the input to the model
    None,
}

fn argument<'a>(trimmed: &'a str, prefix_len: usize) -> &'a str {
    trimmed.get(prefix_len..).unwrap_or("").trim()
}

/// Parse user input into a special command
///
/// # Examples
///
/// ```
/// use metaretrieval::commands::special_commands::{parse_special_command, SpecialCommand};
///
/// let cmd = parse_special_command("/model llama3.1:latest").unwrap();
/// assert_eq!(cmd, SpecialCommand::SwitchModel("llama3.1:latest".to_string()));
///
/// let cmd = parse_special_command("what is rust?").unwrap();
/// assert_eq!(cmd, SpecialCommand::None);
///
/// assert!(parse_special_command("/foo").is_err());
/// ```
pub fn parse_special_command(input: &str) -> Result<SpecialCommand, CommandError> {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();

    if !trimmed.starts_with('/') && lower != "exit" && lower != "quit" {
        return Ok(SpecialCommand::None);
    }

    let command = lower.split_whitespace().next().unwrap_or("");
    match command {
        "/attach" | "/file" => {
            let path = argument(trimmed, command.len());
            if path.is_empty() {
                return Err(CommandError::MissingArgument {
                    command: command.to_string(),
                    usage: format!("{} <path>", command),
                });
            }
            Ok(SpecialCommand::Attach(PathBuf::from(path)))
        }
        "/detach" | "/direct" => Ok(SpecialCommand::Detach),
        "/model" => {
            let name = argument(trimmed, command.len());
            if name.is_empty() {
                return Err(CommandError::MissingArgument {
                    command: "/model".to_string(),
                    usage: "/model <name>".to_string(),
                });
            }
            Ok(SpecialCommand::SwitchModel(name.to_string()))
        }
        "/language" | "/lang" => {
            let language = argument(trimmed, command.len());
            if language.is_empty() {
                return Err(CommandError::MissingArgument {
                    command: command.to_string(),
                    usage: format!("{} <language>", command),
                });
            }
            Ok(SpecialCommand::SwitchLanguage(language.to_string()))
        }
        "/status" => Ok(SpecialCommand::ShowStatus),
        "/history" => Ok(SpecialCommand::ShowHistory),
        "/help" | "/?" => Ok(SpecialCommand::Help),
        "/exit" | "/quit" | "exit" | "quit" => Ok(SpecialCommand::Exit),
        _ => Err(CommandError::UnknownCommand(trimmed.to_string())),
    }
}

/// Print the special command reference
pub fn print_help() {
    println!(
        r#"
Special Commands:

  /attach <path>      Ask following questions about this file
  /detach             Drop the attached file, ask about the conversation
  /model <name>       Use another model
  /language <name>    Answer in another language
  /status             Show model, language and attachment
  /history            Show your stored turns
  /help               Show this help
  exit                Leave the session (also /exit, quit, Ctrl-D)
"#
    );
}
