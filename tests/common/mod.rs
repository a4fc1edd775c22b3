// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{Request, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use chat_relay::config::Config;
use chat_relay::db::{Database, FirestoreDb};
use chat_relay::routes::create_router;
use chat_relay::AppState;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Unique user ID for test isolation against a shared emulator.
#[allow(dead_code)]
pub fn unique_user_id() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    (nanos % 1_000_000_000_000) as i64
}

/// Create a test app over the in-memory store.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (Router, Arc<AppState>) {
    create_test_app_with(Config::test_default())
}

#[allow(dead_code)]
pub fn create_test_app_with(config: Config) -> (Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(config, Database::in_memory()).unwrap());
    (create_router(state.clone()), state)
}

// ─── Fake upstream services ──────────────────────────────────

/// A Bot API call captured by the fake Telegram server.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct TelegramCall {
    pub method: String,
    pub body: Value,
}

/// Stand-in for the Telegram Bot API that records every call.
#[allow(dead_code)]
#[derive(Clone, Default)]
pub struct FakeTelegram {
    calls: Arc<Mutex<Vec<TelegramCall>>>,
}

#[allow(dead_code)]
impl FakeTelegram {
    pub fn calls(&self) -> Vec<TelegramCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, method: &str) -> Vec<Value> {
        self.calls()
            .into_iter()
            .filter(|c| c.method == method)
            .map(|c| c.body)
            .collect()
    }

    /// Texts of every `sendMessage`, in order.
    pub fn sent_texts(&self) -> Vec<String> {
        self.calls_to("sendMessage")
            .iter()
            .filter_map(|b| b["text"].as_str().map(str::to_string))
            .collect()
    }
}

#[allow(dead_code)]
async fn telegram_method(
    State(fake): State<FakeTelegram>,
    Path((_bot, method)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Json<Value> {
    fake.calls.lock().unwrap().push(TelegramCall { method, body });
    Json(json!({ "ok": true, "result": true }))
}

/// Canned behaviour for the fake generation backend.
#[allow(dead_code)]
#[derive(Clone)]
pub struct FakeGeneration {
    status: Arc<Mutex<StatusCode>>,
    reply: Arc<Mutex<String>>,
    requests: Arc<Mutex<Vec<Value>>>,
}

#[allow(dead_code)]
impl Default for FakeGeneration {
    fn default() -> Self {
        Self {
            status: Arc::new(Mutex::new(StatusCode::OK)),
            reply: Arc::new(Mutex::new("Hello from the model".to_string())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[allow(dead_code)]
impl FakeGeneration {
    pub fn respond_with(&self, status: StatusCode, reply: &str) {
        *self.status.lock().unwrap() = status;
        *self.reply.lock().unwrap() = reply.to_string();
    }

    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }
}

#[allow(dead_code)]
async fn generate(
    State(fake): State<FakeGeneration>,
    Json(body): Json<Value>,
) -> (StatusCode, String) {
    fake.requests.lock().unwrap().push(body);
    let status = *fake.status.lock().unwrap();
    let reply = fake.reply.lock().unwrap().clone();
    (status, reply)
}

#[allow(dead_code)]
async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// App wired to fake Telegram and generation servers.
#[allow(dead_code)]
pub struct TestHarness {
    pub app: Router,
    pub state: Arc<AppState>,
    pub telegram: FakeTelegram,
    pub generation: FakeGeneration,
}

#[allow(dead_code)]
pub async fn create_test_harness() -> TestHarness {
    let telegram = FakeTelegram::default();
    let telegram_url = serve(
        Router::new()
            .route("/{bot}/{method}", post(telegram_method))
            .with_state(telegram.clone()),
    )
    .await;

    let generation = FakeGeneration::default();
    let generation_url = serve(
        Router::new()
            .route("/", post(generate))
            .with_state(generation.clone()),
    )
    .await;

    let mut config = Config::test_default();
    config.telegram_api_base = telegram_url;
    config.generation_api_url = format!("{}/", generation_url);

    let (app, state) = create_test_app_with(config);
    TestHarness {
        app,
        state,
        telegram,
        generation,
    }
}

// ─── Request builders ────────────────────────────────────────

/// Authenticated webhook POST carrying `update`.
#[allow(dead_code)]
pub fn webhook_request(update: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/telegram/webhook/test-webhook-uuid")
        .header("content-type", "application/json")
        .header("x-telegram-bot-api-secret-token", "test_secret_token")
        .body(Body::from(serde_json::to_string(update).unwrap()))
        .unwrap()
}

/// Update with a text message from `user_id` in their private chat.
#[allow(dead_code)]
pub fn text_update(user_id: i64, text: &str) -> Value {
    json!({
        "update_id": 1,
        "message": {
            "message_id": 1,
            "date": 1700000000,
            "from": { "id": user_id, "is_bot": false, "first_name": "Test", "username": "tester" },
            "chat": { "id": user_id, "type": "private" },
            "text": text
        }
    })
}

/// Operator API request with the test bearer token.
#[allow(dead_code)]
pub fn admin_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", "Bearer test_admin_token");
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
