#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_test::TestServer;
use quiz_master::{
    ExplanationService, HistoryLog, TriviaClient,
    api::{AppState, create_router},
    config::QuizConfig,
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Stand-in for the trivia and chat-completion APIs, served on a local port
#[derive(Clone, Default)]
pub struct MockUpstream {
    pub trivia_calls: Arc<AtomicUsize>,
    pub trivia_response_code: Arc<AtomicU8>,
    pub trivia_short_batch: Arc<AtomicBool>,
    pub last_trivia_query: Arc<Mutex<HashMap<String, String>>>,
    pub llm_calls: Arc<AtomicUsize>,
    pub llm_fail: Arc<AtomicBool>,
    pub last_llm_request: Arc<Mutex<Option<Value>>>,
    pub last_llm_auth: Arc<Mutex<Option<String>>>,
}

impl MockUpstream {
    pub fn trivia_calls(&self) -> usize {
        self.trivia_calls.load(Ordering::SeqCst)
    }

    pub fn llm_calls(&self) -> usize {
        self.llm_calls.load(Ordering::SeqCst)
    }

    pub fn set_llm_failing(&self, failing: bool) {
        self.llm_fail.store(failing, Ordering::SeqCst);
    }

    pub fn set_trivia_response_code(&self, code: u8) {
        self.trivia_response_code.store(code, Ordering::SeqCst);
    }

    pub fn set_short_batch(&self, short: bool) {
        self.trivia_short_batch.store(short, Ordering::SeqCst);
    }
}

/// Correct answer the mock gives to question `index` of batch `batch`
pub fn correct_answer(batch: usize, index: usize) -> String {
    format!("Right {}-{}", batch, index)
}

async fn trivia(
    State(mock): State<MockUpstream>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let batch = mock.trivia_calls.fetch_add(1, Ordering::SeqCst) + 1;
    *mock.last_trivia_query.lock().unwrap() = params.clone();

    let mut amount: usize = params
        .get("amount")
        .and_then(|a| a.parse().ok())
        .unwrap_or(10);
    if mock.trivia_short_batch.load(Ordering::SeqCst) {
        amount = amount.saturating_sub(1);
    }

    let results: Vec<Value> = (0..amount)
        .map(|i| {
            json!({
                "type": "multiple",
                "difficulty": "easy",
                "category": "Entertainment: Film &amp; TV",
                "question": format!("Batch {} question {}: who&#039;s &quot;right&quot;?", batch, i),
                "correct_answer": correct_answer(batch, i),
                "incorrect_answers": [
                    format!("Wrong {}-{}a", batch, i),
                    format!("Wrong {}-{}b", batch, i),
                    format!("Wrong {}-{}c", batch, i)
                ]
            })
        })
        .collect();

    Json(json!({
        "response_code": mock.trivia_response_code.load(Ordering::SeqCst),
        "results": results
    }))
}

async fn chat_completions(
    State(mock): State<MockUpstream>,
    headers: axum::http::HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    mock.llm_calls.fetch_add(1, Ordering::SeqCst);
    *mock.last_llm_auth.lock().unwrap() = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());
    *mock.last_llm_request.lock().unwrap() = Some(body.clone());

    if mock.llm_fail.load(Ordering::SeqCst) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": { "message": "model overloaded" } })),
        )
            .into_response();
    }

    let prompt = body["messages"][0]["content"].as_str().unwrap_or_default();
    Json(json!({
        "id": "chatcmpl-test",
        "choices": [
            { "index": 0, "message": { "role": "assistant", "content": format!("Explained: {}", prompt) } },
            { "index": 1, "message": { "role": "assistant", "content": "second choice" } }
        ]
    }))
    .into_response()
}

async fn gemini_generate(State(mock): State<MockUpstream>, Json(body): Json<Value>) -> Json<Value> {
    mock.llm_calls.fetch_add(1, Ordering::SeqCst);
    *mock.last_llm_request.lock().unwrap() = Some(body);

    Json(json!({
        "candidates": [
            { "content": { "parts": [ { "text": "Gemini says so." } ], "role": "model" } }
        ]
    }))
}

/// Start the mock upstream and return its base URL
pub async fn spawn_upstream() -> (String, MockUpstream) {
    let mock = MockUpstream::default();
    let app = Router::new()
        .route("/api.php", get(trivia))
        .route("/v1/chat/completions", post(chat_completions))
        .route("/gemini/models/:model_action", post(gemini_generate))
        .with_state(mock.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), mock)
}

pub fn quiz_config(pause_seconds: i64) -> QuizConfig {
    QuizConfig {
        question_count: 5,
        pause_seconds,
        shuffle_options: false,
        ..QuizConfig::default()
    }
}

pub async fn create_test_server(upstream: &str, history_path: &Path, pause_seconds: i64) -> TestServer {
    create_test_server_with_config(upstream, history_path, quiz_config(pause_seconds)).await
}

pub async fn create_test_server_with_config(
    upstream: &str,
    history_path: &Path,
    quiz_config: QuizConfig,
) -> TestServer {
    create_test_app(upstream, history_path, quiz_config).await.0
}

/// Test server plus a handle on the state it serves
pub async fn create_test_app(
    upstream: &str,
    history_path: &Path,
    quiz_config: QuizConfig,
) -> (TestServer, AppState) {
    let history = HistoryLog::load(history_path).unwrap();
    let state = AppState::new(
        TriviaClient::new(upstream),
        ExplanationService::new("sk-test-key".to_string(), Some(format!("{}/v1", upstream))),
        history,
        quiz_config,
    );

    let server = TestServer::new(create_router(state.clone())).unwrap();
    (server, state)
}
