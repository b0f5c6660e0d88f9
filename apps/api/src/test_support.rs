//! In-process fakes shared by unit tests.
//!
//! `MockServer` is a real HTTP server on a random local port that answers
//! from a path-to-response table and records every request it sees.
//! `StubModel` is a scripted [`LanguageModel`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use crate::llm_client::{LanguageModel, LlmError};

// ── Mock HTTP server ───────────────────────────────────────────────

/// A request seen by the mock.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub headers: HashMap<String, String>,
}

impl RecordedRequest {
    /// Header lookup by lowercase name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

#[derive(Debug, Default)]
struct MockState {
    responses: HashMap<String, (StatusCode, String)>,
    requests: Vec<RecordedRequest>,
}

type SharedState = Arc<Mutex<MockState>>;

#[derive(Default)]
pub struct MockServerBuilder {
    responses: HashMap<String, (StatusCode, String)>,
}

impl MockServerBuilder {
    pub fn with_json(mut self, path: &str, status: StatusCode, body: Value) -> Self {
        self.responses
            .insert(path.to_string(), (status, body.to_string()));
        self
    }

    /// Body is served as-is under a JSON content type.
    pub fn with_text(mut self, path: &str, status: StatusCode, body: &str) -> Self {
        self.responses
            .insert(path.to_string(), (status, body.to_string()));
        self
    }

    pub async fn start(self) -> MockServer {
        let state: SharedState = Arc::new(Mutex::new(MockState {
            responses: self.responses,
            requests: Vec::new(),
        }));

        let app = Router::new().fallback(respond).with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("mock server address");

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock server crashed");
        });

        MockServer {
            url: format!("http://{addr}"),
            state,
        }
    }
}

pub struct MockServer {
    url: String,
    state: SharedState,
}

impl MockServer {
    pub fn builder() -> MockServerBuilder {
        MockServerBuilder::default()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }
}

async fn respond(State(state): State<SharedState>, uri: Uri, headers: HeaderMap) -> Response {
    let path = uri.path().to_string();
    let headers = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    let mut state = state.lock().unwrap();
    state.requests.push(RecordedRequest {
        path: path.clone(),
        headers,
    });

    match state.responses.get(&path) {
        Some((status, body)) => (
            *status,
            [(header::CONTENT_TYPE, "application/json")],
            body.clone(),
        )
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "detail": "Conversation not found" })),
        )
            .into_response(),
    }
}

// ── Scripted language model ────────────────────────────────────────

pub struct StubModel {
    reply: Result<String, String>,
    prompts: Mutex<Vec<String>>,
}

impl StubModel {
    /// Always answers with `text`.
    pub fn replying(text: impl Into<String>) -> Self {
        Self {
            reply: Ok(text.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Always fails as if the API returned a 500.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            reply: Err(message.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for StubModel {
    async fn complete(&self, prompt: &str, _system: &str) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(message) => Err(LlmError::Api {
                status: 500,
                message: message.clone(),
            }),
        }
    }
}
