//! HTTP-level tests for the Gemini and OpenAI-compatible providers.

use std::time::Duration;

use scholar::error::LlmError;
use scholar::llm::{ChatMessage, GeminiProvider, GenerateRequest, LlmProvider, OpenAiCompatProvider};
use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request() -> GenerateRequest {
    GenerateRequest::new(vec![ChatMessage::user("What is 2+2?")]).with_system_instruction("You are a tutor")
}

fn gemini(server: &MockServer) -> GeminiProvider {
    GeminiProvider::new(SecretString::from("test-key"), &server.uri(), "gemini-test")
}

fn custom(server: &MockServer) -> OpenAiCompatProvider {
    OpenAiCompatProvider::new(SecretString::from("test-key"), &format!("{}/v1", server.uri()), "local-model")
}

#[tokio::test]
async fn gemini_returns_text_and_usage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-test:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "systemInstruction": {"parts": [{"text": "You are a tutor"}]},
            "contents": [{"role": "user", "parts": [{"text": "What is 2+2?"}]}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "It is "}, {"text": "4."}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 3, "totalTokenCount": 15}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = gemini(&server).generate(request()).await.unwrap();
    assert_eq!(response.text, "It is 4.");
    assert_eq!(response.usage.total(), 15);
}

#[tokio::test]
async fn gemini_blocked_prompt_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [],
            "promptFeedback": {"blockReason": "SAFETY"}
        })))
        .mount(&server)
        .await;

    let err = gemini(&server).generate(request()).await.unwrap_err();
    match err {
        LlmError::InvalidResponse { reason, .. } => assert!(reason.contains("SAFETY")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn gemini_maps_auth_and_rate_limit_statuses() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
        .mount(&server)
        .await;

    let provider = gemini(&server);
    assert!(matches!(
        provider.generate(request()).await,
        Err(LlmError::AuthFailed { .. })
    ));
    match provider.generate(request()).await {
        Err(LlmError::RateLimited { retry_after, .. }) => {
            assert_eq!(retry_after, Some(Duration::from_secs(7)));
        }
        other => panic!("expected rate limit, got {other:?}"),
    }
}

#[tokio::test]
async fn server_error_keeps_body_excerpt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model overloaded"))
        .mount(&server)
        .await;

    match gemini(&server).generate(request()).await {
        Err(LlmError::RequestFailed { reason, .. }) => {
            assert_eq!(reason, "HTTP 500: model overloaded");
        }
        other => panic!("expected request failure, got {other:?}"),
    }
}

#[tokio::test]
async fn custom_endpoint_uses_bearer_and_system_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "local-model",
            "messages": [
                {"role": "system", "content": "You are a tutor"},
                {"role": "user", "content": "What is 2+2?"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "4"}}],
            "usage": {"prompt_tokens": 20, "completion_tokens": 1, "total_tokens": 21}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = custom(&server).generate(request()).await.unwrap();
    assert_eq!(response.text, "4");
    assert_eq!(response.usage.total(), 21);
}

#[tokio::test]
async fn custom_empty_choice_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    assert!(matches!(
        custom(&server).generate(request()).await,
        Err(LlmError::InvalidResponse { .. })
    ));
}

#[tokio::test]
async fn custom_unauthorized_is_auth_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    assert!(matches!(
        custom(&server).generate(request()).await,
        Err(LlmError::AuthFailed { .. })
    ));
}
