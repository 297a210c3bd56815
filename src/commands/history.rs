use crate::cli::HistoryCommand;
use crate::config::Config;
use crate::error::{MetaRetrievalError, Result};
use crate::storage::{SqliteConversationStore, StoredMessage, Turn};
use colored::Colorize;
use prettytable::{format, Table};

const PREVIEW_CHARS: usize = 40;

/// Handle history commands for `user`
pub fn handle_history(config: &Config, user: &str, command: HistoryCommand) -> Result<()> {
    let store = SqliteConversationStore::open(&config.storage)?;

    match command {
        HistoryCommand::List { json } => {
            let turns = store.turns(user)?;

            if json {
                let json = serde_json::to_string_pretty(&turns).map_err(MetaRetrievalError::from)?;
                println!("{}", json);
                return Ok(());
            }

            if turns.is_empty() {
                println!("{}", "No conversation history found.".yellow());
                return Ok(());
            }

            println!("\nConversation History for {}:", user.cyan());
            turns_table(&turns).printstd();
            println!();
            println!(
                "Use {} to remove a turn.",
                "metaretrieval history delete <ID>".cyan()
            );
            println!();
        }
        HistoryCommand::Delete { id } => {
            let deleted = store.delete_pair(user, id)?;
            match deleted.paired_assistant_id {
                Some(pair) => println!(
                    "{}",
                    format!("Deleted message {} and its answer {}", id, pair).green()
                ),
                None => println!("{}", format!("Deleted message {}", id).green()),
            }
        }
        HistoryCommand::Edit { id, content } => {
            if content.trim().is_empty() {
                return Err(MetaRetrievalError::InvalidInput(
                    "new content cannot be empty".to_string(),
                )
                .into());
            }
            let updated = store.update_message(user, id, &content)?;
            println!(
                "{}",
                format!("Updated {} message {}", updated.role, updated.id).green()
            );
        }
        HistoryCommand::Clear { yes } => {
            if !yes {
                return Err(MetaRetrievalError::InvalidInput(
                    "clearing history cannot be undone; pass --yes to confirm".to_string(),
                )
                .into());
            }
            let removed = store.clear(user)?;
            println!("{}", format!("Removed {} message(s)", removed).green());
        }
    }

    Ok(())
}

/// Render turns as a table, one row per turn
pub fn turns_table(turns: &[Turn]) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);

    table.add_row(prettytable::row![
        "ID".bold(),
        "Question".bold(),
        "Answer".bold(),
        "Model".bold(),
        "Tokens".bold(),
        "Time (s)".bold(),
        "Asked".bold()
    ]);

    for turn in turns {
        let id = turn
            .anchor_id()
            .map(|id| id.to_string())
            .unwrap_or_default();
        let question = turn.user.as_ref().map(preview).unwrap_or_else(|| "-".to_string());
        let answer = turn
            .assistant
            .as_ref()
            .map(preview)
            .unwrap_or_else(|| "-".to_string());
        let model = turn
            .assistant
            .as_ref()
            .and_then(|m| m.model_name.clone())
            .unwrap_or_else(|| "-".to_string());
        let tokens = turn
            .assistant
            .as_ref()
            .and_then(|m| m.token_usage)
            .map(|t| t.to_string())
            .unwrap_or_else(|| "-".to_string());
        let elapsed = turn
            .assistant
            .as_ref()
            .and_then(|m| m.elapsed_time)
            .map(|t| format!("{:.2}", t))
            .unwrap_or_else(|| "-".to_string());
        let asked = turn
            .user
            .as_ref()
            .or(turn.assistant.as_ref())
            .map(|m| m.timestamp.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();

        table.add_row(prettytable::row![
            id.cyan(),
            question,
            answer,
            model,
            tokens,
            elapsed,
            asked
        ]);
    }

    table
}

fn preview(message: &StoredMessage) -> String {
    let first_line = message.content.lines().next().unwrap_or("");
    if first_line.chars().count() > PREVIEW_CHARS || message.content.lines().nth(1).is_some() {
        let cut: String = first_line.chars().take(PREVIEW_CHARS - 3).collect();
        format!("{}...", cut)
    } else {
        first_line.to_string()
    }
}
