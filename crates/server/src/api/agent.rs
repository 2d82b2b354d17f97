//! # Agent API
//!
//! The streaming endpoint. Each request runs one project thread and streams
//! its wire events; closing the connection stops the run after the current
//! worker returns.

use axum::{
    extract::State,
    http::{header, HeaderValue},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::post,
    Json, Router,
};
use futures::StreamExt;
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;

use orchestrai_core::state::new_thread_id;
use orchestrai_core::swarm::{spawn_run, WireEvent};

use super::{ApiError, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRequest {
    pub message: String,
    #[serde(default)]
    pub thread_id: Option<String>,
}

pub fn routes() -> axum::Router<AppState> {
    Router::new().route("/api/agent", post(run_agent))
}

fn to_sse(event: WireEvent) -> Event {
    match event.data() {
        Ok(data) => Event::default().data(data),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode event");
            Event::default().comment("encode error")
        }
    }
}

async fn run_agent(
    State(state): State<AppState>,
    Json(req): Json<AgentRequest>,
) -> Result<Response, ApiError> {
    if req.message.trim().is_empty() {
        return Err(ApiError::bad_request("message is required"));
    }

    let settings = state.settings.read().await.clone();
    let thread_id = req.thread_id.unwrap_or_else(new_thread_id);
    tracing::info!(%thread_id, simulate = settings.force_simulation, "Starting run");

    let coordinator = Arc::new(state.coordinator(&settings));
    let run = spawn_run(coordinator, req.message, (&settings).into());
    let events = ReceiverStream::new(run.events).map(|event| Ok::<_, Infallible>(to_sse(event)));

    let mut response = Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response();
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    if let Ok(value) = HeaderValue::from_str(&thread_id) {
        headers.insert("x-thread-id", value);
    }
    Ok(response)
}
