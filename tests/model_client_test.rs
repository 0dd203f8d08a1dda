//! HTTP behavior of the chat completions client against a mock server.

use std::sync::{Arc, Mutex};

use cover_agent::domain::models::Prompt;
use cover_agent::domain::ports::ModelClient;
use cover_agent::infrastructure::llm::{
    ModelClientConfig, OpenRouterClient, RetryPolicy, STREAM_RETRY_MARKER,
};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer) -> ModelClientConfig {
    ModelClientConfig {
        api_key: "test-api-key".to_string(),
        base_url: server.uri(),
        model: "openai/gpt-4o".to_string(),
        temperature: 0.35,
        site_url: "https://example.com/cover-agent".to_string(),
        site_name: "cover-agent".to_string(),
        timeout_secs: 30,
    }
}

fn fast_retries(max_retries: u32) -> RetryPolicy {
    RetryPolicy::new(max_retries, 10, 50)
}

fn prompt() -> Prompt {
    Prompt::new(Some("You are a test engineer.".to_string()), "Write tests for Calc.")
}

fn completion_body(content: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "gen-123",
        "choices": [{"message": {"role": "assistant", "content": content}}],
        "usage": {"prompt_tokens": 12, "completion_tokens": 3}
    })
}

#[tokio::test]
async fn test_buffered_call_sends_headers_and_messages() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-api-key"))
        .and(header("HTTP-Referer", "https://example.com/cover-agent"))
        .and(header("X-Title", "cover-agent"))
        .and(body_partial_json(serde_json::json!({
            "model": "openai/gpt-4o",
            "stream": false,
            "messages": [
                {"role": "system", "content": "You are a test engineer."},
                {"role": "user", "content": "Write tests for Calc."}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("new_tests: []")))
        .expect(1)
        .mount(&server)
        .await;

    let client = OpenRouterClient::new(config(&server), fast_retries(3)).unwrap();
    let response = client.call(&prompt(), false).await.unwrap();

    assert_eq!(response.text, "new_tests: []");
    assert_eq!(response.prompt_tokens, 12);
    assert_eq!(response.completion_tokens, 3);
    assert_eq!(client.model(), "openai/gpt-4o");
}

#[tokio::test]
async fn test_streamed_call_accumulates_fragments() {
    let server = MockServer::start().await;

    let sse = concat!(
        ": OPENROUTER PROCESSING\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"new_tests:\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\" []\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{}}],\"usage\":{\"prompt_tokens\":40,\"completion_tokens\":7}}\n\n",
        "data: [DONE]\n\n",
    );

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(serde_json::json!({"stream": true})))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(sse),
        )
        .mount(&server)
        .await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let client = OpenRouterClient::new(config(&server), fast_retries(3))
        .unwrap()
        .with_chunk_observer(Arc::new(move |chunk: &str| {
            sink.lock().unwrap().push(chunk.to_string());
        }));

    let response = client.call(&prompt(), true).await.unwrap();

    assert_eq!(response.text, "new_tests: []");
    assert_eq!(response.prompt_tokens, 40);
    assert_eq!(response.completion_tokens, 7);
    assert_eq!(*seen.lock().unwrap(), vec!["new_tests:", " []"]);
}

#[tokio::test]
async fn test_interrupted_stream_marks_the_replay() {
    let server = MockServer::start().await;

    let broken = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"new_\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":\n\n",
    );
    let complete = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"new_\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"tests: []\"}}]}\n\n",
        "data: [DONE]\n\n",
    );

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(broken),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(complete),
        )
        .mount(&server)
        .await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let client = OpenRouterClient::new(config(&server), fast_retries(3))
        .unwrap()
        .with_chunk_observer(Arc::new(move |chunk: &str| {
            sink.lock().unwrap().push(chunk.to_string());
        }));

    let response = client.call(&prompt(), true).await.unwrap();

    assert_eq!(response.text, "new_tests: []");
    assert_eq!(
        *seen.lock().unwrap(),
        vec!["new_", STREAM_RETRY_MARKER, "new_", "tests: []"]
    );
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_retry_before_any_fragment_has_no_marker() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream overloaded"))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string("data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n\ndata: [DONE]\n\n"),
        )
        .mount(&server)
        .await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let client = OpenRouterClient::new(config(&server), fast_retries(3))
        .unwrap()
        .with_chunk_observer(Arc::new(move |chunk: &str| {
            sink.lock().unwrap().push(chunk.to_string());
        }));

    let response = client.call(&prompt(), true).await.unwrap();

    assert_eq!(response.text, "ok");
    assert_eq!(*seen.lock().unwrap(), vec!["ok"]);
}

#[tokio::test]
async fn test_retry_on_503_then_success() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream overloaded"))
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("ok")))
        .mount(&server)
        .await;

    let client = OpenRouterClient::new(config(&server), fast_retries(3)).unwrap();
    let response = client.call(&prompt(), false).await.unwrap();

    assert_eq!(response.text, "ok");
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_retry_budget_exhausted() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .expect(3)
        .mount(&server)
        .await;

    let client = OpenRouterClient::new(config(&server), fast_retries(2)).unwrap();
    let err = client.call(&prompt(), false).await.unwrap_err();

    assert_eq!(err.attempts, 3);
    assert!(err.source.to_string().contains("429"));
}

#[tokio::test]
async fn test_unauthorized_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
        .expect(1)
        .mount(&server)
        .await;

    let client = OpenRouterClient::new(config(&server), fast_retries(3)).unwrap();
    let err = client.call(&prompt(), false).await.unwrap_err();

    assert_eq!(err.attempts, 1);
    assert!(err.source.to_string().contains("invalid key"));
}

#[tokio::test]
async fn test_response_without_content_is_retried_when_unclassified() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})))
        .expect(2)
        .mount(&server)
        .await;

    let client = OpenRouterClient::new(config(&server), fast_retries(1)).unwrap();
    let err = client.call(&prompt(), false).await.unwrap_err();

    assert_eq!(err.attempts, 2);
    assert!(err.source.to_string().contains("Malformed response"));
}

#[tokio::test]
async fn test_unclassified_failures_can_fail_fast() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .expect(1)
        .mount(&server)
        .await;

    let policy = fast_retries(3).with_retry_unclassified(false);
    let client = OpenRouterClient::new(config(&server), policy).unwrap();
    let err = client.call(&prompt(), false).await.unwrap_err();

    assert_eq!(err.attempts, 1);
}
