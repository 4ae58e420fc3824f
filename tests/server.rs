//! HTTP server tests: a real listener on a free port, driven with reqwest,
//! with stub services behind the pipeline.

mod common;

use common::*;
use docent::config::Config;
use docent::pipeline::Pipeline;
use docent::server::build_router;
use docent_core::embedding::Embedder;
use docent_core::generation::Generator;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;

async fn spawn_server(embedder: Arc<dyn Embedder>, generator: Arc<dyn Generator>) -> String {
    let mut config = Config::default();
    config.selection.std_threshold = 0.03;
    spawn_server_with(config, embedder, generator).await
}

async fn spawn_server_with(
    config: Config,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
) -> String {
    let pipeline = Arc::new(Pipeline::new(config, embedder, generator).unwrap());
    let app = build_router(pipeline);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn spawn_stub_server() -> String {
    spawn_server(
        Arc::new(StubEmbedder::france()),
        Arc::new(StubGenerator::default()),
    )
    .await
}

async fn create_session(client: &reqwest::Client, base: &str) -> String {
    let resp = client
        .post(format!("{}/sessions", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await.unwrap();
    body["session_id"].as_str().unwrap().to_string()
}

async fn upload(
    client: &reqwest::Client,
    base: &str,
    session: &str,
    name: &str,
    bytes: Vec<u8>,
) -> reqwest::Response {
    client
        .put(format!("{}/sessions/{}/documents/{}", base, session, name))
        .body(bytes)
        .send()
        .await
        .unwrap()
}

async fn ask(client: &reqwest::Client, base: &str, session: &str, question: &str) -> reqwest::Response {
    client
        .post(format!("{}/sessions/{}/ask", base, session))
        .json(&json!({ "question": question }))
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn health_reports_version() {
    let base = spawn_stub_server().await;
    let body: Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn upload_ask_and_download_annotated_copy() {
    let base = spawn_stub_server().await;
    let client = reqwest::Client::new();
    let session = create_session(&client, &base).await;

    let resp = upload(&client, &base, &session, "france.pdf", france_pdf()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["paragraphs"], 3);
    assert_eq!(body["replaced"], false);

    let resp = ask(&client, &base, &session, QUESTION).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["answer"], "Paris.");
    assert_eq!(body["cached"], false);
    assert_eq!(body["focus_document"], "france.pdf");
    let context = body["context"].as_array().unwrap();
    assert_eq!(context.len(), 2);
    assert_eq!(context[0]["text"], EIFFEL);
    assert_eq!(context[1]["text"], FRANCE);
    assert_eq!(context[1]["index"], 0);

    let body: Value = client
        .get(format!("{}/sessions/{}/documents", base, session))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["documents"][0]["name"], "france.pdf");
    assert_eq!(body["documents"][0]["annotated"], true);

    let resp = client
        .get(format!("{}/sessions/{}/documents/france.pdf", base, session))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["content-type"], "application/pdf");
    let bytes = resp.bytes().await.unwrap();
    assert!(bytes.starts_with(b"%PDF"));
    assert_ne!(bytes.as_ref(), france_pdf().as_slice());

    let resp = ask(&client, &base, &session, QUESTION).await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["cached"], true);
    assert_eq!(body["answer"], "Paris.");
}

#[tokio::test]
async fn sessions_are_isolated() {
    let base = spawn_stub_server().await;
    let client = reqwest::Client::new();
    let first = create_session(&client, &base).await;
    let second = create_session(&client, &base).await;
    assert_ne!(first, second);

    upload(&client, &base, &first, "france.pdf", france_pdf()).await;

    let body: Value = client
        .get(format!("{}/sessions/{}/documents", base, second))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(body["documents"].as_array().unwrap().is_empty());

    let resp = ask(&client, &base, &second, QUESTION).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
    assert_eq!(body["error"]["retryable"], false);

    let resp = client
        .get(format!("{}/sessions/{}/documents/france.pdf", base, second))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unsupported_upload_is_rejected() {
    let base = spawn_stub_server().await;
    let client = reqwest::Client::new();
    let session = create_session(&client, &base).await;

    let resp = upload(&client, &base, &session, "notes.txt", b"plain text".to_vec()).await;
    assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "unsupported_format");

    let resp = upload(&client, &base, &session, "broken.pdf", b"not a pdf".to_vec()).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn failing_embedder_is_retryable() {
    let base = spawn_server(Arc::new(FailingEmbedder), Arc::new(StubGenerator::default())).await;
    let client = reqwest::Client::new();
    let session = create_session(&client, &base).await;
    upload(&client, &base, &session, "france.pdf", france_pdf()).await;

    let resp = ask(&client, &base, &session, QUESTION).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "service_unavailable");
    assert_eq!(body["error"]["retryable"], true);
}

#[tokio::test]
async fn empty_summary_text_is_a_bad_request() {
    let base = spawn_stub_server().await;
    let client = reqwest::Client::new();
    let session = create_session(&client, &base).await;

    let resp = client
        .post(format!("{}/sessions/{}/summarize", base, session))
        .json(&json!({ "text": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = client
        .post(format!("{}/sessions/{}/summarize", base, session))
        .json(&json!({ "text": FRANCE }))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["summary"], "Paris.");
    assert_eq!(body["cached"], false);
}

#[tokio::test]
async fn deleted_session_is_gone() {
    let base = spawn_stub_server().await;
    let client = reqwest::Client::new();
    let session = create_session(&client, &base).await;

    let url = format!("{}/sessions/{}", base, session);
    let resp = client.delete(&url).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let resp = client.delete(&url).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = ask(&client, &base, &session, QUESTION).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn idle_sessions_expire_when_new_ones_are_created() {
    let mut config = Config::default();
    config.server.session_idle_secs = 1;
    let base = spawn_server_with(
        config,
        Arc::new(StubEmbedder::france()),
        Arc::new(StubGenerator::default()),
    )
    .await;
    let client = reqwest::Client::new();

    let stale = create_session(&client, &base).await;
    let resp = upload(&client, &base, &stale, "france.pdf", france_pdf()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
    let fresh = create_session(&client, &base).await;

    let resp = ask(&client, &base, &stale, QUESTION).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let resp = client
        .get(format!("{}/sessions/{}/documents", base, fresh))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}
