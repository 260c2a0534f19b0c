use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lyrics_sentiment::gateway::openai::OpenAiClient;
use lyrics_sentiment::gateway::{
    Attribution, CallOutcome, CallRecord, ChatGateway, ChatRequest, Message, ProviderError,
    ProviderGateway, UsageSink,
};
use lyrics_sentiment::{with_retry, RetryPolicy};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn client(server: &MockServer) -> OpenAiClient {
    OpenAiClient::with_config("sk-test", server.uri(), Duration::from_secs(5)).unwrap()
}

fn request() -> ChatRequest {
    ChatRequest::new(
        "gpt-4o-mini",
        vec![Message::system("Reply ONLY with JSON."), Message::user("hi")],
        Attribution::new("test"),
    )
}

fn completion(content: &str) -> Value {
    json!({
        "choices": [{
            "message": { "content": content },
            "finish_reason": "stop"
        }],
        "usage": { "prompt_tokens": 10, "completion_tokens": 20 }
    })
}

async fn mount_ok(server: &MockServer, content: &str) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(content)))
        .mount(server)
        .await;
}

#[tokio::test]
async fn openai_parses_success_content_and_usage() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(r#"{"per_line":[]}"#)))
        .mount(&server)
        .await;

    let resp = client(&server).complete(&request()).await.unwrap();
    assert_eq!(resp.content, r#"{"per_line":[]}"#);
    assert_eq!(resp.input_tokens, 10);
    assert_eq!(resp.output_tokens, 20);
}

#[tokio::test]
async fn openai_sends_json_response_format_when_requested() {
    let server = MockServer::start().await;
    mount_ok(&server, "{}").await;

    client(&server).complete(&request().json()).await.unwrap();

    let received = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(body["model"], "gpt-4o-mini");
    assert_eq!(body["response_format"]["type"], "json_object");
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][1]["content"], "hi");
}

#[tokio::test]
async fn openai_omits_response_format_by_default() {
    let server = MockServer::start().await;
    mount_ok(&server, "hello").await;

    client(&server).complete(&request()).await.unwrap();

    let received = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&received[0].body).unwrap();
    assert!(body.get("response_format").is_none());
}

#[tokio::test]
async fn reply_quoting_a_refusal_phrase_is_returned_untouched() {
    let server = MockServer::start().await;
    let reply = json!({ "per_line": [{
        "lineNo": 1,
        "text": "my request was refused again",
        "sentiment": "negative",
        "emotions": { "sadness": 0.8 },
        "intensity": 0.7
    }] })
    .to_string();
    mount_ok(&server, &reply).await;

    let resp = client(&server).complete(&request().json()).await.unwrap();
    assert_eq!(resp.content, reply);

    let plain = MockServer::start().await;
    mount_ok(&plain, "I cannot comply with that request.").await;
    let resp = client(&plain).complete(&request()).await.unwrap();
    assert_eq!(resp.content, "I cannot comply with that request.");
}

#[tokio::test]
async fn prompt_cap_counts_characters_not_bytes() {
    let server = MockServer::start().await;
    mount_ok(&server, "{}").await;
    let client = client(&server);

    // 3 bytes per char: over the cap in bytes, under it in chars
    let korean = ChatRequest::new(
        "gpt-4o-mini",
        vec![Message::user("가".repeat(200_000))],
        Attribution::new("test"),
    );
    client.complete(&korean).await.unwrap();

    let oversized = ChatRequest::new(
        "gpt-4o-mini",
        vec![Message::user("가".repeat(500_001))],
        Attribution::new("test"),
    );
    let err = client.complete(&oversized).await.unwrap_err();
    assert!(matches!(
        err,
        ProviderError::TooLarge {
            what: "prompt",
            len: 500_001,
            ..
        }
    ));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn openai_http_429_keeps_code_and_request_id() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("x-request-id", "abc123")
                .set_body_json(json!({
                    "error": { "message": "rate limited", "code": "rate_limit_exceeded" }
                })),
        )
        .mount(&server)
        .await;

    let err = client(&server).complete(&request()).await.unwrap_err();
    match &err {
        ProviderError::Status {
            status,
            message,
            provider_code,
            ..
        } => {
            assert_eq!(*status, 429);
            assert_eq!(message, "rate limited");
            assert_eq!(provider_code.as_deref(), Some("rate_limit_exceeded"));
        }
        other => panic!("expected Status, got {other:?}"),
    }
    assert_eq!(err.request_id(), Some("abc123"));
    assert_eq!(err.code(), "rate_limited");
}

#[tokio::test]
async fn openai_labels_5xx_and_4xx_differently() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "message": "bad model" }
        })))
        .mount(&server)
        .await;

    let first = client(&server).complete(&request()).await.unwrap_err();
    assert_eq!(first.code(), "server_error");
    assert_eq!(first.to_string(), "model endpoint returned HTTP 502: bad gateway");

    let second = client(&server).complete(&request()).await.unwrap_err();
    assert_eq!(second.code(), "rejected");
    assert_eq!(second.to_string(), "model endpoint returned HTTP 400: bad model");
}

#[derive(Clone)]
struct FlipResponder {
    calls: Arc<AtomicUsize>,
    first: ResponseTemplate,
    second: ResponseTemplate,
}

impl Respond for FlipResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n == 0 {
            self.first.clone()
        } else {
            self.second.clone()
        }
    }
}

#[derive(Default)]
struct RecordingSink {
    records: Mutex<Vec<CallRecord>>,
}

#[async_trait::async_trait]
impl UsageSink for RecordingSink {
    async fn record(&self, record: CallRecord) {
        self.records.lock().unwrap().push(record);
    }
}

#[tokio::test]
async fn provider_gateway_makes_single_attempt_and_records_each_one() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(FlipResponder {
            calls: Arc::new(AtomicUsize::new(0)),
            first: ResponseTemplate::new(500)
                .insert_header("x-request-id", "req-9")
                .set_body_json(json!({
                    "error": { "message": "transient error", "code": "internal" }
                })),
            second: ResponseTemplate::new(200).set_body_json(completion("ok")),
        })
        .mount(&server)
        .await;

    let sink = Arc::new(RecordingSink::default());
    let gateway = ProviderGateway::new(client(&server), sink.clone());

    let err = gateway.chat(request()).await.unwrap_err();
    assert_eq!(err.code(), "server_error");
    assert_eq!(server.received_requests().await.unwrap().len(), 1);

    let gateway: &dyn ChatGateway = &gateway;
    let resp = with_retry(&RetryPolicy::immediate(2), || gateway.chat(request()))
        .await
        .unwrap();
    assert_eq!(resp.content, "ok");
    assert_eq!(server.received_requests().await.unwrap().len(), 2);

    let records = sink.records.lock().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].caller, "test");
    assert_eq!(
        records[0].outcome,
        CallOutcome::Failed {
            code: "server_error",
            request_id: Some("req-9".into())
        }
    );
    assert_eq!(
        records[1].outcome,
        CallOutcome::Completed {
            input_tokens: 10,
            output_tokens: 20
        }
    );
}
