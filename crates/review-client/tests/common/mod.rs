//! In-process evaluation backend used to exercise the HTTP gateway.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use review_types::{ImprovedPrompt, Prompt, TestCase, TestCaseList};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

/// Prompt whose listing always fails with a 500
pub const BROKEN_PROMPT: i64 = 99;
/// Prompt whose listing returns a body of the wrong shape
pub const MALFORMED_PROMPT: i64 = 98;
/// Prompt whose listing returns a record without an id
pub const ID_LESS_PROMPT: i64 = 97;

#[derive(Default)]
pub struct Backend {
    pub prompts: Vec<Prompt>,
    pub cases: BTreeMap<i64, TestCase>,
    pub next_id: i64,
}

pub type SharedBackend = Arc<Mutex<Backend>>;

/// Seed data: prompt 1 holds the two arithmetic cases, prompt 2 is empty
pub fn seeded_backend() -> SharedBackend {
    let mut backend = Backend {
        prompts: vec![
            Prompt::new(1, "arithmetic", "Add the numbers", "gemini-1.5-flash"),
            Prompt::new(2, "empty", "Nothing yet", "gemini-1.5-pro"),
        ],
        next_id: 3,
        ..Default::default()
    };
    backend.cases.insert(
        1,
        TestCase::new("2+2", "4", true, "ok").with_id(1).with_prompt(1),
    );
    backend.cases.insert(
        2,
        TestCase::new("2+3", "6", false, "wrong")
            .with_id(2)
            .with_prompt(1),
    );
    Arc::new(Mutex::new(backend))
}

/// Start the backend on an ephemeral port and return its base URL
pub async fn spawn_backend(backend: SharedBackend) -> String {
    let app = Router::new()
        .route("/prompts", get(list_prompts))
        .route("/prompts/{id}/testcases", get(list_test_cases))
        .route("/prompts/{id}/improve", get(improve))
        .route("/testcase", post(upsert))
        .route("/testcase/{id}", delete(remove))
        .with_state(backend);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// A base URL nothing listens on
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

async fn list_prompts(State(backend): State<SharedBackend>) -> Json<Vec<Prompt>> {
    Json(backend.lock().unwrap().prompts.clone())
}

async fn list_test_cases(Path(id): Path<i64>, State(backend): State<SharedBackend>) -> Response {
    match id {
        BROKEN_PROMPT => (StatusCode::INTERNAL_SERVER_ERROR, "database locked").into_response(),
        MALFORMED_PROMPT => Json(serde_json::json!({
            "test_cases": [{"id": 1, "input": "x"}],
            "percent_correct": 0
        }))
        .into_response(),
        ID_LESS_PROMPT => Json(serde_json::json!({
            "test_cases": [{"input": "x", "output": "y", "is_correct": true, "reason": "r"}],
            "percent_correct": 100
        }))
        .into_response(),
        _ => {
            let backend = backend.lock().unwrap();
            let test_cases: Vec<TestCase> = backend
                .cases
                .values()
                .filter(|case| case.prompt_id == Some(id))
                .cloned()
                .collect();
            let correct = test_cases.iter().filter(|case| case.is_correct).count();
            let percent_correct = if test_cases.is_empty() {
                0.0
            } else {
                100.0 * correct as f64 / test_cases.len() as f64
            };
            Json(TestCaseList {
                test_cases,
                percent_correct: Some(percent_correct),
            })
            .into_response()
        }
    }
}

async fn upsert(State(backend): State<SharedBackend>, Json(mut record): Json<TestCase>) -> Response {
    let mut backend = backend.lock().unwrap();
    let id = match record.id {
        Some(id) => {
            let Some(existing) = backend.cases.get(&id) else {
                return StatusCode::NOT_FOUND.into_response();
            };
            if record.prompt_id.is_none() {
                record.prompt_id = existing.prompt_id;
            }
            id
        }
        None => {
            let id = backend.next_id;
            backend.next_id += 1;
            id
        }
    };
    record.id = Some(id);
    record.reason = record.reason.trim().to_string();
    backend.cases.insert(id, record.clone());
    Json(record).into_response()
}

async fn remove(Path(id): Path<i64>, State(backend): State<SharedBackend>) -> StatusCode {
    match backend.lock().unwrap().cases.remove(&id) {
        Some(_) => StatusCode::NO_CONTENT,
        None => StatusCode::NOT_FOUND,
    }
}

async fn improve(Path(id): Path<i64>, State(backend): State<SharedBackend>) -> Response {
    let backend = backend.lock().unwrap();
    match backend.prompts.iter().find(|prompt| prompt.id == id) {
        Some(prompt) => Json(ImprovedPrompt {
            improved_prompt: format!("{} Answer with the number only.", prompt.prompt_text),
        })
        .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
