//! Model registry commands for MetaRetrieval
//!
//! Models are not discovered from the endpoint; the configured registry
//! is the list requests are checked against.

use crate::config::Config;
use crate::error::{MetaRetrievalError, Result};
use crate::providers::ModelRegistry;
use prettytable::{row, Table};
use serde::Serialize;

/// One registry entry as printed by `models list --json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelEntry {
    /// Model identifier sent to the endpoint
    pub name: String,
    /// Whether requests without a model use this one
    pub default: bool,
}

/// Registry entries in configured order
pub fn model_entries(registry: &ModelRegistry) -> Vec<ModelEntry> {
    registry
        .names()
        .iter()
        .map(|name| ModelEntry {
            name: name.clone(),
            default: name == registry.default_model(),
        })
        .collect()
}

/// List the models requests may use
///
/// # Examples
///
/// ```no_run
/// use metaretrieval::config::Config;
/// use metaretrieval::commands::models::list_models;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::load("config/config.yaml", &Default::default())?;
/// list_models(&config, false)?;
/// # Ok(())
/// # }
/// ```
pub fn list_models(config: &Config, json: bool) -> Result<()> {
    let registry = ModelRegistry::from_config(&config.models)?;
    let entries = model_entries(&registry);

    if json {
        let json = serde_json::to_string_pretty(&entries).map_err(MetaRetrievalError::from)?;
        println!("{}", json);
        return Ok(());
    }

    let mut table = Table::new();
    table.add_row(row!["Model", "Default"]);
    for entry in &entries {
        let marker = if entry.default { "*" } else { "" };
        table.add_row(row![entry.name, marker]);
    }

    println!("\nAvailable models:\n");
    table.printstd();
    Ok(())
}
