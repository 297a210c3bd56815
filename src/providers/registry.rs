//! Model registry
//!
//! The list of model identifiers callers may request, plus the default used
//! when a caller does not pick one.

use crate::config::ModelsConfig;
use crate::error::{MetaRetrievalError, Result};

/// Allowed model identifiers and the default model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRegistry {
    default: String,
    allowed: Vec<String>,
}

impl ModelRegistry {
    /// Create a registry
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `allowed` is empty or does not
    /// contain `default`
    ///
    /// # Examples
    ///
    /// ```
    /// use metaretrieval::providers::ModelRegistry;
    ///
    /// let registry = ModelRegistry::new(
    ///     "mixtral:latest",
    ///     vec!["mixtral:latest".to_string(), "llama3.1:latest".to_string()],
    /// ).unwrap();
    /// assert_eq!(registry.resolve(None).unwrap(), "mixtral:latest");
    /// assert!(registry.resolve(Some("gpt-4")).is_err());
    /// ```
    pub fn new(default: impl Into<String>, allowed: Vec<String>) -> Result<Self> {
        let default = default.into();
        if allowed.is_empty() {
            return Err(
                MetaRetrievalError::Config("model registry cannot be empty".to_string()).into(),
            );
        }
        if !allowed.iter().any(|m| m == &default) {
            return Err(MetaRetrievalError::Config(format!(
                "default model {} is not in the allowed list: {}",
                default,
                allowed.join(", ")
            ))
            .into());
        }
        Ok(Self { default, allowed })
    }

    /// Build a registry from the `models` configuration section
    pub fn from_config(config: &ModelsConfig) -> Result<Self> {
        Self::new(config.default.clone(), config.allowed.clone())
    }

    /// Whether `model` may be requested
    pub fn contains(&self, model: &str) -> bool {
        self.allowed.iter().any(|m| m == model)
    }

    /// Resolve a caller's model choice, falling back to the default
    ///
    /// # Errors
    ///
    /// Returns `UnknownModel` for identifiers outside the registry
    pub fn resolve(&self, requested: Option<&str>) -> Result<String> {
        match requested {
            None => Ok(self.default.clone()),
            Some(model) if self.contains(model) => Ok(model.to_string()),
            Some(model) => Err(MetaRetrievalError::UnknownModel(model.to_string()).into()),
        }
    }

    /// The default model
    pub fn default_model(&self) -> &str {
        &self.default
    }

    /// All allowed model identifiers, in configured order
    pub fn names(&self) -> &[String] {
        &self.allowed
    }
}
