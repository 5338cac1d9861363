use std::sync::Arc;

use component_forge::{GenerationProvider, WireEvent, WireFrameDecoder};
use forge_server::{serve, AppState};
use futures_util::StreamExt;
use generation_provider_completion_api::{CompletionApiProvider, CompletionApiProviderConfig};
use generation_provider_mock::{MockProvider, MockStep};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Duration};

struct TestServer {
    base_url: String,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl TestServer {
    async fn start(provider: Arc<dyn GenerationProvider>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("local TCP listener should bind");
        let addr = listener
            .local_addr()
            .expect("resolved local listener address");
        let (shutdown, signal) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let _ = serve(listener, AppState::new(provider), async move {
                let _ = signal.await;
            })
            .await;
        });

        Self {
            base_url: format!("http://{addr}"),
            shutdown: Some(shutdown),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn post_generate(&self, body: Value) -> reqwest::Response {
        reqwest::Client::new()
            .post(self.url("/api/generate"))
            .json(&body)
            .send()
            .await
            .expect("request should reach the server")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        self.handle.abort();
    }
}

fn decode(body: &[u8]) -> Vec<WireEvent> {
    let mut decoder = WireFrameDecoder::new();
    let mut events = decoder.feed(body);
    events.extend(decoder.finish());
    assert_eq!(decoder.skipped_frames(), 0);
    events
}

async fn error_body(response: reqwest::Response) -> String {
    let body: Value = response.json().await.expect("json error body");
    body["error"].as_str().expect("error message").to_string()
}

#[tokio::test]
async fn streams_fragments_then_normalized_completion() {
    let provider = Arc::new(MockProvider::new(vec![
        "Here you go:\n```tsx\nimport React".to_string(),
        " from 'react';\n\nfunction Counter() {\n  return <button>0</button>;\n}\n```".to_string(),
    ]));
    let server = TestServer::start(provider.clone()).await;

    let response = server.post_generate(json!({ "prompt": "Create a counter" })).await;

    assert_eq!(response.status(), 200);
    let content_type = response.headers()["content-type"].to_str().expect("ascii");
    assert!(content_type.starts_with("text/event-stream"));
    assert_eq!(response.headers()["cache-control"], "no-cache");

    let events = decode(&response.bytes().await.expect("body"));
    assert_eq!(
        events,
        vec![
            WireEvent::fragment("Here you go:\n```tsx\nimport React"),
            WireEvent::fragment(
                " from 'react';\n\nfunction Counter() {\n  return <button>0</button>;\n}\n```"
            ),
            WireEvent::complete(
                "import React from 'react';\n\nfunction Counter() {\n  return <button>0</button>;\n}\n\nexport default Counter;"
            ),
        ]
    );
    assert_eq!(
        provider.observed_requests()[0].user_instruction,
        "Create a React component: Create a counter"
    );
}

#[tokio::test]
async fn oversized_prompt_is_rejected_before_streaming() {
    let provider = Arc::new(MockProvider::new(vec!["const A = 1;".to_string()]));
    let server = TestServer::start(provider.clone()).await;

    let response = server
        .post_generate(json!({ "prompt": "a".repeat(2001) }))
        .await;

    assert_eq!(response.status(), 400);
    assert!(response.headers()["content-type"]
        .to_str()
        .expect("ascii")
        .starts_with("application/json"));
    assert_eq!(error_body(response).await, "Prompt too long (max 2000)");
    assert!(provider.observed_requests().is_empty());
}

#[tokio::test]
async fn invalid_prompts_are_bad_requests() {
    let provider = Arc::new(MockProvider::new(Vec::new()));
    let server = TestServer::start(provider.clone()).await;

    for (body, message) in [
        (json!({}), "Prompt is required"),
        (json!({ "prompt": null }), "Prompt is required"),
        (json!({ "prompt": 7 }), "Prompt must be a string"),
        (json!({ "prompt": "   " }), "Please enter a description"),
    ] {
        let response = server.post_generate(body).await;
        assert_eq!(response.status(), 400);
        assert_eq!(error_body(response).await, message);
    }
    assert!(provider.observed_requests().is_empty());
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let server = TestServer::start(Arc::new(MockProvider::new(Vec::new()))).await;

    let response = reqwest::Client::new()
        .post(server.url("/api/generate"))
        .header("content-type", "application/json")
        .body("{\"prompt\": ")
        .send()
        .await
        .expect("request should reach the server");

    assert_eq!(response.status(), 400);
    assert!(error_body(response).await.starts_with("Invalid request body"));
}

#[tokio::test]
async fn missing_credential_is_a_server_error() {
    let provider = CompletionApiProvider::new(
        CompletionApiProviderConfig::new("", "llama-3.1-8b").with_base_url("http://127.0.0.1:9"),
    )
    .expect("provider builds without a key");
    let server = TestServer::start(Arc::new(provider)).await;

    let response = server.post_generate(json!({ "prompt": "a card" })).await;

    assert_eq!(response.status(), 500);
    assert_eq!(
        error_body(response).await,
        "The generation service API key is not configured"
    );
}

#[tokio::test]
async fn upstream_fault_after_three_fragments_ends_with_error_event() {
    let provider = Arc::new(MockProvider::scripted(vec![
        MockStep::Fragment("a".to_string()),
        MockStep::Fragment("b".to_string()),
        MockStep::Fragment("c".to_string()),
        MockStep::Fault("Generation failed: upstream reset".to_string()),
    ]));
    let server = TestServer::start(provider).await;

    let response = server.post_generate(json!({ "prompt": "a card" })).await;
    assert_eq!(response.status(), 200);

    let events = decode(&response.bytes().await.expect("body"));
    assert_eq!(
        events,
        vec![
            WireEvent::fragment("a"),
            WireEvent::fragment("b"),
            WireEvent::fragment("c"),
            WireEvent::error("Generation failed: upstream reset"),
        ]
    );
}

#[tokio::test]
async fn client_disconnect_releases_the_provider_stream() {
    let provider = Arc::new(MockProvider::scripted(vec![
        MockStep::Fragment("const Panel = () => (".to_string()),
        MockStep::WaitForCancel,
    ]));
    let server = TestServer::start(provider.clone()).await;

    let response = server.post_generate(json!({ "prompt": "a panel" })).await;
    assert_eq!(response.status(), 200);

    let mut body = response.bytes_stream();
    let mut decoder = WireFrameDecoder::new();
    let first = timeout(Duration::from_secs(5), async {
        loop {
            let chunk = body
                .next()
                .await
                .expect("stream stays open")
                .expect("chunk");
            if let Some(event) = decoder.feed(&chunk).into_iter().next() {
                return event;
            }
        }
    })
    .await
    .expect("first fragment arrives");
    assert_eq!(first, WireEvent::fragment("const Panel = () => ("));

    drop(body);

    timeout(Duration::from_secs(5), async {
        while provider.released_streams() == 0 {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("provider stream is released after disconnect");
}

#[tokio::test]
async fn healthz_reports_provider_profile() {
    let server = TestServer::start(Arc::new(MockProvider::default())).await;

    let body: Value = reqwest::get(server.url("/healthz"))
        .await
        .expect("request should reach the server")
        .json()
        .await
        .expect("json body");

    assert_eq!(body, json!({ "status": "ok", "provider": "mock", "model": "mock" }));
}
