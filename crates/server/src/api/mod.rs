//! # HTTP API
//!
//! ```text
//! POST   /api/agent              run a project, streamed as text/event-stream
//! GET    /api/projects           list records (or ?threadId= to load one)
//! GET    /api/projects/:id       load one record
//! POST   /api/projects           upsert a record (threadId required)
//! DELETE /api/projects/:id       delete a record
//! GET    /api/health             storage reachability
//! GET    /api/config             persisted and effective settings
//! PATCH  /api/config             merge a partial settings document
//! ```

pub mod agent;
pub mod config;
pub mod projects;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, Router,
};
use std::sync::Arc;
use tokio::sync::RwLock;

use orchestrai_core::agents::LlmBackend;
use orchestrai_core::config::Settings;
use orchestrai_core::state::ProjectStore;
use orchestrai_core::swarm::Coordinator;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<RwLock<Settings>>,
    pub store: Arc<dyn ProjectStore>,
    /// Replaces the radkit backend when set
    pub backend: Option<Arc<dyn LlmBackend>>,
}

impl AppState {
    pub fn new(settings: Settings, store: Arc<dyn ProjectStore>) -> Self {
        Self {
            settings: Arc::new(RwLock::new(settings)),
            store,
            backend: None,
        }
    }

    pub fn with_backend(mut self, backend: Arc<dyn LlmBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Coordinator wired for the given settings snapshot
    pub fn coordinator(&self, settings: &Settings) -> Coordinator {
        match &self.backend {
            Some(backend) => Coordinator::with_backend(settings, backend.clone()),
            None => Coordinator::from_settings(settings),
        }
    }
}

/// JSON error body `{ "error": "..." }` with a status code
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!(error = %err, "Request failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(agent::routes())
        .merge(projects::routes())
        .merge(config::routes())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request};
    use orchestrai_core::agents::{ScriptedBackend, ScriptedCall};
    use orchestrai_core::state::MemoryStore;
    use tower::ServiceExt;

    fn test_state(backend: ScriptedBackend) -> AppState {
        let settings = Settings::for_tests(std::env::temp_dir());
        AppState::new(settings, Arc::new(MemoryStore::new())).with_backend(Arc::new(backend))
    }

    fn json_request(method: Method, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_agent_stream_ends_with_done() {
        let app = router(test_state(ScriptedBackend::new()));
        let response = app
            .oneshot(json_request(
                Method::POST,
                "/api/agent",
                serde_json::json!({ "message": "Build a todo app" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CACHE_CONTROL].to_str().unwrap(),
            "no-cache"
        );
        assert!(response.headers().contains_key("x-thread-id"));

        let body = body_text(response).await;
        assert!(body.starts_with("data: {\"manager\":{\"next_agent\":\"requirement\""));
        assert!(body.ends_with("data: [DONE]\n\n"));
    }

    #[tokio::test]
    async fn test_agent_stream_fatal_error() {
        let app = router(test_state(
            ScriptedBackend::new().failing(ScriptedCall::Requirements, "invalid api key"),
        ));
        let response = app
            .oneshot(json_request(
                Method::POST,
                "/api/agent",
                serde_json::json!({ "message": "x" }),
            ))
            .await
            .unwrap();
        let body = body_text(response).await;
        assert!(body.contains("data: {\"error\":"));
        assert!(!body.contains("[DONE]"));
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected() {
        let app = router(test_state(ScriptedBackend::new()));
        let response = app
            .oneshot(json_request(
                Method::POST,
                "/api/agent",
                serde_json::json!({ "message": "  " }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_project_crud() {
        let app = router(test_state(ScriptedBackend::new()));

        let missing = app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/projects",
                serde_json::json!({ "prompt": "x" }),
            ))
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

        let created = app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/projects",
                serde_json::json!({
                    "threadId": "t-1",
                    "metadata": { "title": "Todo App" },
                    "globalProgress": 40
                }),
            ))
            .await
            .unwrap();
        assert_eq!(created.status(), StatusCode::OK);
        let record: serde_json::Value = serde_json::from_str(&body_text(created).await).unwrap();
        assert_eq!(record["prompt"], "Todo App");
        assert_eq!(record["globalProgress"], 40);

        let by_query = app
            .clone()
            .oneshot(
                Request::get("/api/projects?threadId=t-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(by_query.status(), StatusCode::OK);

        let list = app
            .clone()
            .oneshot(Request::get("/api/projects").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let list: serde_json::Value = serde_json::from_str(&body_text(list).await).unwrap();
        assert_eq!(list.as_array().unwrap().len(), 1);

        let deleted = app
            .clone()
            .oneshot(
                Request::delete("/api/projects/t-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(deleted.status(), StatusCode::OK);

        let gone = app
            .oneshot(Request::get("/api/projects/t-1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(gone.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health_reports_backend() {
        let app = router(test_state(ScriptedBackend::new()));
        let response = app
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["storage"], "memory");
    }

    #[tokio::test]
    async fn test_config_patch_merges() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::for_tests(dir.path());
        let state = AppState::new(settings, Arc::new(MemoryStore::new()));
        let app = router(state.clone());

        let response = app
            .clone()
            .oneshot(json_request(
                Method::PATCH,
                "/api/config",
                serde_json::json!({ "qa_failure_route": "executor", "stall_limit": 5 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.settings.read().await.stall_limit, 5);

        let response = app
            .oneshot(Request::get("/api/config").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["config"]["qa_failure_route"], "executor");
        assert_eq!(body["effective"]["stall_limit"], 5);
    }
}
