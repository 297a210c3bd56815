//! Test utilities for MetaRetrieval
//!
//! This module provides a mockable completion provider, temporary stores,
//! and text helpers shared by unit tests.

use crate::error::Result;
use crate::providers::{Completion, CompletionProvider, CompletionRequest};
use crate::storage::SqliteConversationStore;
use async_trait::async_trait;
use mockall::mock;
use tempfile::TempDir;

mock! {
    /// Scripted completion provider
    pub Endpoint {}

    #[async_trait]
    impl CompletionProvider for Endpoint {
        async fn complete(&self, request: &CompletionRequest) -> Result<Completion>;
    }
}

/// `n` space-separated words, counting as exactly `n` tokens
///
/// # Examples
///
/// ```ignore
/// assert_eq!(words(3), "word word word");
/// ```
pub fn words(n: usize) -> String {
    vec!["word"; n].join(" ")
}

/// Create a store in a fresh temporary directory
///
/// The directory is returned so the caller keeps it alive.
pub fn temp_store() -> (SqliteConversationStore, TempDir) {
    let dir = TempDir::new().expect("Failed to create temporary directory");
    let store = SqliteConversationStore::new_with_path(dir.path().join("history.db"))
        .expect("Failed to create store");
    (store, dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::count_tokens;

    #[test]
    fn test_words_token_count() {
        assert_eq!(words(0), "");
        assert_eq!(count_tokens(&words(7)), 7);
    }

    #[test]
    fn test_temp_store_starts_empty() {
        let (store, _dir) = temp_store();
        assert!(store.list("anyone").unwrap().is_empty());
    }
}
