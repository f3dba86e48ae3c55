//! In-memory application and request helpers shared by the route tests.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Request, StatusCode,
    },
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use citequotes_agent::testing::ScriptedLlmClient;
use citequotes_agent::{CqAssistant, GuardrailPolicy};
use citequotes_core::config::AppConfig;
use citequotes_core::domain::role::Privilege;
use citequotes_db::{connect_with_settings, migrations, SeedDataset};

use crate::routes;
use crate::state::AppState;

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

impl TestApp {
    /// Seeded database, no language model.
    pub async fn seeded() -> Self {
        Self::build(None).await
    }

    /// Seeded database with an assistant that replays `replies` in order.
    pub async fn with_replies(replies: impl IntoIterator<Item = Result<String, String>>) -> Self {
        let client = Arc::new(ScriptedLlmClient::new(replies));
        Self::build(Some(CqAssistant::new(client, GuardrailPolicy::default()))).await
    }

    async fn build(assistant: Option<CqAssistant>) -> Self {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SeedDataset::load(&pool).await.expect("seed");

        let mut state = AppState::new(pool, &AppConfig::default());
        if let Some(assistant) = assistant {
            state = state.with_assistant(assistant);
        }
        Self { router: routes::router(state.clone()), state }
    }

    /// Creates (or reuses) the user, assigns `privilege` and returns a fresh bearer token.
    pub async fn token_for(&self, email: &str, privilege: Privilege) -> String {
        let user = self.state.users.ensure(email, None).await.expect("user");
        self.state.roles.set_role(&user.id, privilege, "test-harness").await.expect("role");
        self.state
            .users
            .issue_token(&user.id, chrono::Duration::hours(1), Some("test"))
            .await
            .expect("token")
            .token
    }
}

async fn dispatch(router: &Router, request: Request<Body>) -> (StatusCode, String, Vec<u8>) {
    let response = router.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    (status, content_type, bytes.to_vec())
}

fn request(method: &str, uri: &str, token: Option<&str>) -> axum::http::request::Builder {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    builder
}

/// Sends an optional JSON body and decodes the JSON response (`Null` when empty).
pub async fn send(
    router: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = request(method, uri, token);
    let request = match body {
        Some(body) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request");

    let (status, _, bytes) = dispatch(router, request).await;
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

/// Sends a raw text body, as the import endpoints expect.
pub async fn send_raw(
    router: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: &str,
) -> (StatusCode, Value) {
    let request = request(method, uri, token)
        .header(CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from(body.to_string()))
        .expect("request");
    let (status, _, bytes) = dispatch(router, request).await;
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

/// GETs a non-JSON page and returns status, content type and body text.
pub async fn fetch_text(router: &Router, uri: &str) -> (StatusCode, String, String) {
    let request = request("GET", uri, None).body(Body::empty()).expect("request");
    let (status, content_type, bytes) = dispatch(router, request).await;
    (status, content_type, String::from_utf8_lossy(&bytes).into_owned())
}
