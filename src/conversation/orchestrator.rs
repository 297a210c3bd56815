//! Conversation orchestration
//!
//! Runs one turn end to end: store the question, ask the model, compress an
//! over-budget answer, store the answer. Each step runs to completion
//! before the next starts.

use crate::config::{Config, ConversationConfig};
use crate::conversation::compressor::{CompressionOutcome, ResponseCompressor};
use crate::conversation::session::SessionContext;
use crate::error::{MetaRetrievalError, Result};
use crate::prompts;
use crate::providers::{
    create_provider, ChatMessage, CompletionProvider, CompletionRequest, ModelRegistry,
    SamplingParams,
};
use crate::storage::{NewMessage, SqliteConversationStore, StoredMessage};
use std::sync::Arc;

/// Which history a turn sends to the model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptMode {
    /// Send the session's running history plus the new question
    Direct,
    /// Send a single prompt built from the attached file and the question
    File,
}

/// What the caller asks for in one turn
#[derive(Debug, Clone)]
pub struct TurnRequest {
    /// The question as typed
    pub question: String,
    /// History selection
    pub mode: PromptMode,
    /// Model to use; the registry default when absent
    pub model: Option<String>,
    /// Answer language; the configured default when absent
    pub language: Option<String>,
    /// Sampling parameters; `max_tokens` is also the response budget
    pub sampling: SamplingParams,
}

impl TurnRequest {
    /// A direct-mode question with the given sampling parameters
    pub fn direct(question: impl Into<String>, sampling: SamplingParams) -> Self {
        Self {
            question: question.into(),
            mode: PromptMode::Direct,
            model: None,
            language: None,
            sampling,
        }
    }

    /// A question about the session's attached file
    pub fn file(question: impl Into<String>, sampling: SamplingParams) -> Self {
        Self {
            mode: PromptMode::File,
            ..Self::direct(question, sampling)
        }
    }

    /// Use `model` instead of the registry default
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Ask for the answer in `language`
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// Result of a completed turn
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// The stored question
    pub user_message: StoredMessage,
    /// The stored answer
    pub assistant_message: StoredMessage,
    /// Model that answered
    pub model: String,
    /// Final answer text, compressed if it was over budget
    pub content: String,
    /// Seconds spent in the completion call plus any compression calls
    pub elapsed_secs: f64,
    /// Tokens sent with the completion call
    pub prompt_tokens: usize,
    /// Tokens of the final answer; this is what `token_usage` records
    pub response_tokens: usize,
    /// Tokens of the answer as the model first returned it
    pub original_response_tokens: usize,
    /// `prompt_tokens + response_tokens`
    pub total_tokens: usize,
    /// Whether and how compression ran
    pub compression: CompressionOutcome,
}

/// Composes the completion provider, the compressor and the store into the
/// ask-answer-store workflow
pub struct ConversationOrchestrator {
    provider: Arc<dyn CompletionProvider>,
    store: SqliteConversationStore,
    registry: ModelRegistry,
    conversation: ConversationConfig,
}

impl ConversationOrchestrator {
    /// Assemble an orchestrator from its collaborators
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        store: SqliteConversationStore,
        registry: ModelRegistry,
        conversation: ConversationConfig,
    ) -> Self {
        Self {
            provider,
            store,
            registry,
            conversation,
        }
    }

    /// Build the HTTP provider, store and registry described by `config`
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing, the registry is invalid, or
    /// the store cannot be opened
    pub fn from_config(config: &Config) -> Result<Self> {
        let provider: Arc<dyn CompletionProvider> = Arc::from(create_provider(config)?);
        let store = SqliteConversationStore::open(&config.storage)?;
        let registry = ModelRegistry::from_config(&config.models)?;
        Ok(Self::new(provider, store, registry, config.conversation.clone()))
    }

    /// The conversation store turns are written to
    pub fn store(&self) -> &SqliteConversationStore {
        &self.store
    }

    /// The models callers may pick from
    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Run one turn for the session's owner
    ///
    /// The question is stored before the model is called. If the call
    /// fails the error is returned and no answer is stored. An answer over
    /// `sampling.max_tokens` is compressed to that budget before it is
    /// stored.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput`/`UnknownModel` before anything is stored,
    /// client errors from the completion call, and `Persistence` if either
    /// write fails
    pub async fn ask(
        &self,
        session: &mut SessionContext,
        request: &TurnRequest,
    ) -> Result<TurnOutcome> {
        let question = request.question.trim();
        if question.is_empty() {
            return Err(
                MetaRetrievalError::InvalidInput("question cannot be empty".to_string()).into(),
            );
        }
        request.sampling.validate()?;
        let model = self.registry.resolve(request.model.as_deref())?;
        let language = self.conversation.resolve_language(request.language.as_deref())?;

        let (record, wire) = match request.mode {
            PromptMode::Direct => {
                let text = prompts::direct_question(question, &language);
                (text.clone(), text)
            }
            PromptMode::File => {
                let file_content = session
                    .attachment()
                    .filter(|content| !content.trim().is_empty())
                    .ok_or_else(|| {
                        MetaRetrievalError::InvalidInput(
                            "attach a file before asking about it".to_string(),
                        )
                    })?;
                (
                    prompts::file_question_record(question, &language),
                    prompts::file_question_prompt(file_content, question, &language),
                )
            }
        };

        let user_message = self
            .store
            .append(&NewMessage::user(session.owner(), record.clone()))?;

        let mut messages = Vec::new();
        if let Some(system) = &self.conversation.system_prompt {
            messages.push(ChatMessage::system(system.clone()));
        }
        if request.mode == PromptMode::Direct {
            messages.extend(session.history().iter().cloned());
        }
        messages.push(ChatMessage::user(wire));
        session.push(ChatMessage::user(record));

        tracing::info!(
            "Turn started: model={}, mode={:?}, {} message(s) in request",
            model,
            request.mode,
            messages.len()
        );

        let completion_request = CompletionRequest::new(model.clone(), messages, request.sampling);
        let completion = match self.provider.complete(&completion_request).await {
            Ok(completion) => completion,
            Err(e) => {
                tracing::warn!("Turn failed, answer not stored: {}", e);
                return Err(e);
            }
        };

        let budget = request.sampling.max_tokens;
        let original_response_tokens = completion.response_tokens;
        let mut content = completion.content;
        let mut response_tokens = completion.response_tokens;
        let mut elapsed_secs = completion.elapsed_secs;
        let mut compression = CompressionOutcome::Unchanged;

        if response_tokens > budget {
            tracing::info!(
                "Answer over budget ({} > {}), compressing",
                response_tokens,
                budget
            );
            let compressor = ResponseCompressor::new(Arc::clone(&self.provider), request.sampling);
            let compressed = compressor.compress(&content, &model, budget).await;
            elapsed_secs += compressed.elapsed_secs;
            response_tokens = compressed.token_count;
            compression = compressed.outcome;
            content = compressed.content;
        }

        let assistant_message = self.store.append(&NewMessage::assistant(
            session.owner(),
            content.clone(),
            model.clone(),
            response_tokens,
            elapsed_secs,
        ))?;
        session.push(ChatMessage::assistant(content.clone()));

        tracing::info!(
            "Turn completed: {} response tokens in {:.2}s",
            response_tokens,
            elapsed_secs
        );

        Ok(TurnOutcome {
            user_message,
            assistant_message,
            model,
            content,
            elapsed_secs,
            prompt_tokens: completion.prompt_tokens,
            response_tokens,
            original_response_tokens,
            total_tokens: completion.prompt_tokens + response_tokens,
            compression,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{Completion, Role};
    use crate::storage::MessageRole;
    use crate::test_utils::{temp_store, words, MockEndpoint};
    use crate::tokens::count_tokens;
    use mockall::Sequence;
    use rusqlite::Connection;
    use tempfile::TempDir;

    fn registry() -> ModelRegistry {
        ModelRegistry::new(
            "mixtral:latest",
            vec!["mixtral:latest".to_string(), "llama3.1:latest".to_string()],
        )
        .unwrap()
    }

    fn orchestrator(mock: MockEndpoint) -> (ConversationOrchestrator, TempDir) {
        let (store, dir) = temp_store();
        let orchestrator = ConversationOrchestrator::new(
            Arc::new(mock),
            store,
            registry(),
            ConversationConfig::default(),
        );
        (orchestrator, dir)
    }

    fn sampling(max_tokens: usize) -> SamplingParams {
        SamplingParams {
            max_tokens,
            ..Default::default()
        }
    }

    fn answer(text: &'static str) -> impl Fn(&CompletionRequest) -> Result<Completion> {
        move |req| Ok(Completion::from_content(&req.messages, text, 0.5))
    }

    fn classify(err: &anyhow::Error) -> &MetaRetrievalError {
        err.downcast_ref::<MetaRetrievalError>()
            .expect("expected a MetaRetrievalError")
    }

    #[tokio::test]
    async fn test_ask_stores_question_and_answer() {
        let mut mock = MockEndpoint::new();
        mock.expect_complete()
            .withf(|req| req.model == "mixtral:latest")
            .times(1)
            .returning(answer("Rust is a systems programming language."));
        let (orchestrator, _dir) = orchestrator(mock);
        let mut session = SessionContext::new("alice").unwrap();

        let outcome = orchestrator
            .ask(&mut session, &TurnRequest::direct("What is rust?", sampling(50)))
            .await
            .unwrap();

        assert_eq!(outcome.content, "Rust is a systems programming language.");
        assert_eq!(outcome.response_tokens, 6);
        assert_eq!(outcome.compression, CompressionOutcome::Unchanged);

        let stored = orchestrator.store().list("alice").unwrap();
        assert_eq!(stored.len(), 2);
        let assistant = &stored[0];
        assert_eq!(assistant.role, MessageRole::Assistant);
        assert_eq!(assistant.model_name.as_deref(), Some("mixtral:latest"));
        assert_eq!(assistant.token_usage, Some(6));
        assert_eq!(assistant.elapsed_time, Some(0.5));
        assert_eq!(stored[1].content, "What is rust?\n\nPlease answer in English.");
        assert!(stored[1].model_name.is_none());
    }

    #[tokio::test]
    async fn test_direct_mode_sends_running_history() {
        let mut seq = Sequence::new();
        let mut mock = MockEndpoint::new();
        mock.expect_complete()
            .times(1)
            .in_sequence(&mut seq)
            .returning(answer("first answer"));
        mock.expect_complete()
            .withf(|req| {
                let roles: Vec<Role> = req.messages.iter().map(|m| m.role).collect();
                roles == vec![Role::System, Role::User, Role::Assistant, Role::User]
                    && req.messages[2].content == "first answer"
                    && req.messages[3].content.starts_with("And then?")
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(answer("second answer"));
        let (orchestrator, _dir) = orchestrator(mock);
        let mut session = SessionContext::new("alice").unwrap();

        orchestrator
            .ask(&mut session, &TurnRequest::direct("First?", sampling(50)))
            .await
            .unwrap();
        orchestrator
            .ask(&mut session, &TurnRequest::direct("And then?", sampling(50)))
            .await
            .unwrap();

        assert_eq!(session.history().len(), 4);
        assert_eq!(orchestrator.store().list("alice").unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_file_mode_sends_single_prompt_and_stores_question_only() {
        let mut mock = MockEndpoint::new();
        mock.expect_complete()
            .withf(|req| {
                req.messages.len() == 2
                    && req.messages[1].content.starts_with("File content: alloy: Ti-6Al-4V")
                    && req.messages[1].content.contains("Question: Which alloy?")
                    && req.messages[1].content.ends_with("Please answer in German.")
            })
            .times(1)
            .returning(answer("Ti-6Al-4V"));
        let (orchestrator, _dir) = orchestrator(mock);
        let mut session = SessionContext::new("alice").unwrap();
        session.push(ChatMessage::user("earlier question"));
        session.attach_file("alloy: Ti-6Al-4V");

        let request = TurnRequest::file("Which alloy?", sampling(50)).with_language("German");
        let outcome = orchestrator.ask(&mut session, &request).await.unwrap();

        assert_eq!(
            outcome.user_message.content,
            "Question about the uploaded file: Which alloy?\n\nPlease answer in German."
        );
        assert!(!outcome.user_message.content.contains("Ti-6Al-4V"));
    }

    #[tokio::test]
    async fn test_file_mode_without_attachment_stores_nothing() {
        let mut mock = MockEndpoint::new();
        mock.expect_complete().times(0);
        let (orchestrator, _dir) = orchestrator(mock);
        let mut session = SessionContext::new("alice").unwrap();

        let err = orchestrator
            .ask(&mut session, &TurnRequest::file("Which alloy?", sampling(50)))
            .await
            .unwrap_err();
        assert!(matches!(classify(&err), MetaRetrievalError::InvalidInput(_)));
        assert!(orchestrator.store().list("alice").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_endpoint_error_stores_only_the_question() {
        let mut mock = MockEndpoint::new();
        mock.expect_complete().times(1).returning(|_| {
            Err(MetaRetrievalError::Endpoint {
                status: 500,
                body: String::new(),
                elapsed_secs: 0.1,
            }
            .into())
        });
        let (orchestrator, _dir) = orchestrator(mock);
        let mut session = SessionContext::new("alice").unwrap();

        let err = orchestrator
            .ask(&mut session, &TurnRequest::direct("What is rust?", sampling(50)))
            .await
            .unwrap_err();

        assert!(matches!(
            classify(&err),
            MetaRetrievalError::Endpoint { status: 500, .. }
        ));
        let stored = orchestrator.store().list("alice").unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].role, MessageRole::User);
    }

    #[tokio::test]
    async fn test_over_budget_answer_is_compressed_before_storing() {
        let mut seq = Sequence::new();
        let mut mock = MockEndpoint::new();
        mock.expect_complete()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|req| Ok(Completion::from_content(&req.messages, words(300), 2.0)));
        mock.expect_complete()
            .withf(|req| req.messages[0].content.contains("approximately 50 tokens"))
            .times(2)
            .in_sequence(&mut seq)
            .returning(|req| Ok(Completion::from_content(&req.messages, words(30), 0.5)));
        let (orchestrator, _dir) = orchestrator(mock);
        let mut session = SessionContext::new("alice").unwrap();

        let outcome = orchestrator
            .ask(&mut session, &TurnRequest::direct("What is rust?", sampling(50)))
            .await
            .unwrap();

        assert_eq!(outcome.compression, CompressionOutcome::Compressed);
        assert_eq!(outcome.original_response_tokens, 300);
        assert_eq!(outcome.response_tokens, 60);
        assert!((outcome.elapsed_secs - 3.0).abs() < 1e-9);
        assert_eq!(outcome.assistant_message.token_usage, Some(60));
        assert_eq!(count_tokens(&outcome.assistant_message.content), 60);
        assert_eq!(session.history().last().unwrap().content, outcome.content);
    }

    #[tokio::test]
    async fn test_failed_compression_stores_original_answer() {
        let mut seq = Sequence::new();
        let mut mock = MockEndpoint::new();
        mock.expect_complete()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|req| Ok(Completion::from_content(&req.messages, words(120), 1.0)));
        mock.expect_complete()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Err(MetaRetrievalError::Transport {
                    message: "timed out".to_string(),
                    elapsed_secs: 0.2,
                }
                .into())
            });
        let (orchestrator, _dir) = orchestrator(mock);
        let mut session = SessionContext::new("alice").unwrap();

        let outcome = orchestrator
            .ask(&mut session, &TurnRequest::direct("Explain", sampling(20)))
            .await
            .unwrap();

        assert_eq!(outcome.compression, CompressionOutcome::Degraded);
        assert_eq!(outcome.assistant_message.token_usage, Some(120));
        assert_eq!(outcome.content, words(120));
    }

    #[tokio::test]
    async fn test_unknown_model_and_blank_question_store_nothing() {
        let mut mock = MockEndpoint::new();
        mock.expect_complete().times(0);
        let (orchestrator, _dir) = orchestrator(mock);
        let mut session = SessionContext::new("alice").unwrap();

        let err = orchestrator
            .ask(
                &mut session,
                &TurnRequest::direct("hi", sampling(50)).with_model("gpt-4"),
            )
            .await
            .unwrap_err();
        assert!(matches!(classify(&err), MetaRetrievalError::UnknownModel(_)));

        let err = orchestrator
            .ask(&mut session, &TurnRequest::direct("   ", sampling(50)))
            .await
            .unwrap_err();
        assert!(matches!(classify(&err), MetaRetrievalError::InvalidInput(_)));

        let err = orchestrator
            .ask(&mut session, &TurnRequest::direct("hi", sampling(0)))
            .await
            .unwrap_err();
        assert!(matches!(classify(&err), MetaRetrievalError::InvalidInput(_)));

        assert!(orchestrator.store().list("alice").unwrap().is_empty());
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn test_answer_write_failure_is_persistence_error() {
        let mut mock = MockEndpoint::new();
        mock.expect_complete().times(1).returning(answer("fine"));
        let (orchestrator, _dir) = orchestrator(mock);
        let conn = Connection::open(orchestrator.store().db_path()).unwrap();
        conn.execute_batch(
            "CREATE TRIGGER block_answers BEFORE INSERT ON messages
            WHEN NEW.role = 'assistant'
            BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
        )
        .unwrap();
        let mut session = SessionContext::new("alice").unwrap();

        let err = orchestrator
            .ask(&mut session, &TurnRequest::direct("hi", sampling(50)))
            .await
            .unwrap_err();

        assert!(matches!(classify(&err), MetaRetrievalError::Persistence(_)));
        assert_eq!(orchestrator.store().list("alice").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_turns_are_scoped_to_session_owner() {
        let mut mock = MockEndpoint::new();
        mock.expect_complete().times(2).returning(answer("ok"));
        let (orchestrator, _dir) = orchestrator(mock);
        let mut alice = SessionContext::new("alice").unwrap();
        let mut bob = SessionContext::new("bob").unwrap();

        let alice_turn = orchestrator
            .ask(&mut alice, &TurnRequest::direct("mine", sampling(50)))
            .await
            .unwrap();
        orchestrator
            .ask(&mut bob, &TurnRequest::direct("his", sampling(50)))
            .await
            .unwrap();

        let bob_ids: Vec<i64> = orchestrator
            .store()
            .list("bob")
            .unwrap()
            .iter()
            .map(|m| m.id)
            .collect();
        assert!(!bob_ids.contains(&alice_turn.user_message.id));
        assert!(!bob_ids.contains(&alice_turn.assistant_message.id));
    }
}
