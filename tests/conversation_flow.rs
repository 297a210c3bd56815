//! End-to-end conversation tests
//!
//! Drive the orchestrator through the real HTTP client against a mock
//! completion endpoint and a temporary SQLite store.

mod common;

use common::{completion_body, test_config, words};
use metaretrieval::conversation::{
    CompressionOutcome, ConversationOrchestrator, SessionContext, TurnRequest,
};
use metaretrieval::error::MetaRetrievalError;
use metaretrieval::providers::SamplingParams;
use metaretrieval::storage::MessageRole;
use metaretrieval::tokens::count_tokens;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sampling(max_tokens: usize) -> SamplingParams {
    SamplingParams {
        max_tokens,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_over_budget_answer_is_stored_compressed() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), &dir);

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("What is rust?"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(&words(300))))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("approximately 50 tokens"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(&words(30))))
        .expect(2)
        .mount(&server)
        .await;

    let orchestrator = ConversationOrchestrator::from_config(&config).unwrap();
    let mut session = SessionContext::new("alice").unwrap();

    let outcome = orchestrator
        .ask(&mut session, &TurnRequest::direct("What is rust?", sampling(50)))
        .await
        .unwrap();

    assert_eq!(outcome.compression, CompressionOutcome::Compressed);
    assert_eq!(outcome.original_response_tokens, 300);

    let stored = orchestrator.store().list("alice").unwrap();
    assert_eq!(stored.len(), 2);
    let answer = &stored[0];
    assert_eq!(answer.role, MessageRole::Assistant);
    assert_eq!(answer.token_usage, Some(60));
    assert!(answer.token_usage.unwrap() < 300);
    assert_eq!(count_tokens(&answer.content), 60);
    assert_eq!(answer.model_name.as_deref(), Some("mixtral:latest"));
}

#[tokio::test]
async fn test_endpoint_500_stores_only_the_question() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), &dir);

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model overloaded"))
        .expect(1)
        .mount(&server)
        .await;

    let orchestrator = ConversationOrchestrator::from_config(&config).unwrap();
    let mut session = SessionContext::new("alice").unwrap();

    let err = orchestrator
        .ask(&mut session, &TurnRequest::direct("What is rust?", sampling(50)))
        .await
        .unwrap_err();

    match err.downcast_ref::<MetaRetrievalError>() {
        Some(MetaRetrievalError::Endpoint { status, body, .. }) => {
            assert_eq!(*status, 500);
            assert_eq!(body, "model overloaded");
        }
        other => panic!("expected Endpoint error, got {:?}", other),
    }

    let stored = orchestrator.store().list("alice").unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].role, MessageRole::User);
}

#[tokio::test]
async fn test_request_carries_credentials_sampling_and_history() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), &dir);

    Mock::given(method("POST"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(serde_json::json!({
            "model": "llama3.1:latest",
            "max_tokens": 64,
            "top_k": 40,
            "messages": [
                { "role": "system", "content": "You are a helpful assistant." },
                { "role": "user", "content": "Hello\n\nPlease answer in German." }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("Hallo!")))
        .expect(1)
        .mount(&server)
        .await;

    let orchestrator = ConversationOrchestrator::from_config(&config).unwrap();
    let mut session = SessionContext::new("alice").unwrap();
    let request = TurnRequest::direct("Hello", sampling(64))
        .with_model("llama3.1:latest")
        .with_language("German");

    let outcome = orchestrator.ask(&mut session, &request).await.unwrap();

    assert_eq!(outcome.content, "Hallo!");
    assert_eq!(outcome.response_tokens, 1);
    assert_eq!(outcome.compression, CompressionOutcome::Unchanged);
    assert_eq!(session.history().len(), 2);
}

#[tokio::test]
async fn test_failed_compression_keeps_full_answer() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), &dir);

    Mock::given(method("POST"))
        .and(body_string_contains("Explain ownership"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(&words(120))))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(body_string_contains("Summarize"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let orchestrator = ConversationOrchestrator::from_config(&config).unwrap();
    let mut session = SessionContext::new("alice").unwrap();

    let outcome = orchestrator
        .ask(&mut session, &TurnRequest::direct("Explain ownership", sampling(20)))
        .await
        .unwrap();

    assert_eq!(outcome.compression, CompressionOutcome::Degraded);
    assert_eq!(outcome.content, words(120));
    assert_eq!(outcome.assistant_message.token_usage, Some(120));
}

#[tokio::test]
async fn test_file_question_is_stored_without_file_content() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), &dir);

    Mock::given(method("POST"))
        .and(body_string_contains("File content: melting point 1668"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("1668 degrees")))
        .expect(1)
        .mount(&server)
        .await;

    let orchestrator = ConversationOrchestrator::from_config(&config).unwrap();
    let mut session = SessionContext::new("alice").unwrap();
    session.attach_file("melting point 1668");

    orchestrator
        .ask(
            &mut session,
            &TurnRequest::file("What is the melting point?", sampling(50)),
        )
        .await
        .unwrap();

    let stored = orchestrator.store().list("alice").unwrap();
    assert_eq!(
        stored[1].content,
        "Question about the uploaded file: What is the melting point?\n\nPlease answer in English."
    );
}

#[tokio::test]
async fn test_malformed_body_stores_no_answer() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), &dir);

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"result": "ok"})))
        .mount(&server)
        .await;

    let orchestrator = ConversationOrchestrator::from_config(&config).unwrap();
    let mut session = SessionContext::new("bob").unwrap();

    let err = orchestrator
        .ask(&mut session, &TurnRequest::direct("Hi", sampling(50)))
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<MetaRetrievalError>(),
        Some(MetaRetrievalError::MalformedResponse { .. })
    ));
    assert_eq!(orchestrator.store().list("bob").unwrap().len(), 1);
}
