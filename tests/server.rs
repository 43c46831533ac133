mod common;

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::net::TcpListener;

use common::{ExtractiveEngine, FakeLoader, CAPITALS};
use pdfchat_backend::server::router::router;
use pdfchat_backend::state::AppState;

async fn spawn_server(state: Arc<AppState>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    addr
}

async fn capitals_server() -> (tempfile::TempDir, Arc<AppState>, SocketAddr) {
    let tmp = tempfile::tempdir().unwrap();
    let path = common::write_document(tmp.path(), "book.txt", CAPITALS);
    let loader = Arc::new(FakeLoader::new(ExtractiveEngine::new(2048, 256)));
    let state = common::app_state(tmp.path(), common::session_config(path, 40, 0), loader);
    state.session.get_or_initialize().await.unwrap();
    let addr = spawn_server(state.clone()).await;
    (tmp, state, addr)
}

#[tokio::test]
async fn health_reports_ok() {
    let (_tmp, _state, addr) = capitals_server().await;

    let body: Value = reqwest::get(format!("http://{addr}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn ask_returns_answer_json() {
    let (_tmp, _state, addr) = capitals_server().await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api/ask"))
        .json(&json!({ "question": "What is the capital of France?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert!(body["answer"].as_str().unwrap().contains("Paris"));
    assert_eq!(body["chunks_used"], 3);
    assert_eq!(body["chunks_dropped"], 0);
}

#[tokio::test]
async fn blank_question_is_a_bad_request() {
    let (_tmp, _state, addr) = capitals_server().await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api/ask"))
        .json(&json!({ "question": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("empty"));
}

#[tokio::test]
async fn malformed_body_gets_json_error() {
    let (_tmp, _state, addr) = capitals_server().await;
    let client = reqwest::Client::new();

    let not_json = client
        .post(format!("http://{addr}/api/ask"))
        .header("content-type", "application/json")
        .body("{\"question\": ")
        .send()
        .await
        .unwrap();
    assert_eq!(not_json.status(), 400);
    let body: Value = not_json.json().await.unwrap();
    assert!(body["error"].is_string());

    let wrong_shape = client
        .post(format!("http://{addr}/api/ask"))
        .json(&json!({ "query": "What is the capital of France?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(wrong_shape.status(), 400);
    let body: Value = wrong_shape.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("question"));
}

#[tokio::test]
async fn page_renders_form_and_answer() {
    let (_tmp, _state, addr) = capitals_server().await;
    let client = reqwest::Client::new();

    let empty = client
        .get(format!("http://{addr}/"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(empty.contains("Local PDF Chatbot"));
    assert!(empty.contains("Ask a question from your PDF:"));
    assert!(!empty.contains("<h3>Answer</h3>"));

    let answered = client
        .get(format!("http://{addr}/"))
        .query(&[("question", "What is the capital of France?")])
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(answered.contains("<h3>Answer</h3>"));
    assert!(answered.contains("Paris is the capital of France."));
}

#[tokio::test]
async fn page_shows_error_and_stays_usable() {
    let (_tmp, _state, addr) = capitals_server().await;
    let client = reqwest::Client::new();

    let too_long = "x".repeat(2001);
    let failed = client
        .get(format!("http://{addr}/"))
        .query(&[("question", too_long.as_str())])
        .send()
        .await
        .unwrap();
    assert_eq!(failed.status(), 200);
    let html = failed.text().await.unwrap();
    assert!(html.contains("Could not answer"));
    assert!(html.contains("<form"));

    let ok = client
        .get(format!("http://{addr}/"))
        .query(&[("question", "Which city is the capital of Germany?")])
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(ok.contains("Berlin"));
}

#[tokio::test]
async fn status_reports_ready_session() {
    let (_tmp, _state, addr) = capitals_server().await;

    let body: Value = reqwest::get(format!("http://{addr}/api/status"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["state"], "ready");
    assert_eq!(body["chunks"], 3);
    assert_eq!(body["embedding_dimension"], common::HASH_DIMENSION);
    assert_eq!(body["stats"]["ingestions"], 1);
    assert_eq!(body["engine"], "extractive");
    assert!(body["started_at"].is_string());
}

#[tokio::test]
async fn failed_session_makes_ask_unavailable() {
    let tmp = tempfile::tempdir().unwrap();
    let path = common::write_document(tmp.path(), "book.txt", CAPITALS);
    let mut loader = FakeLoader::new(ExtractiveEngine::new(2048, 256));
    loader.fail_engine = true;
    let loader = Arc::new(loader);
    let state = common::app_state(
        tmp.path(),
        common::session_config(path, 40, 0),
        loader.clone(),
    );
    let addr = spawn_server(state.clone()).await;
    let client = reqwest::Client::new();

    for _ in 0..3 {
        let response = client
            .post(format!("http://{addr}/api/ask"))
            .json(&json!({ "question": "What is the capital of France?" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 503);
    }
    assert_eq!(state.session.stats().ingestions, 1);
    assert_eq!(loader.engine_loads.load(Ordering::SeqCst), 1);
}
