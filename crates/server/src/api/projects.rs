//! # Project API
//!
//! Read and write access to stored project records.

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use orchestrai_core::state::RecordPatch;

use super::{ApiError, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectQuery {
    pub thread_id: Option<String>,
}

/// Upsert body: a record patch plus the thread it belongs to
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertRequest {
    pub thread_id: Option<String>,
    #[serde(flatten)]
    pub patch: RecordPatch,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/projects", get(list_or_load).post(upsert_project))
        .route(
            "/api/projects/:id",
            get(load_project).delete(delete_project),
        )
}

async fn load(state: &AppState, thread_id: &str) -> Result<Response, ApiError> {
    match state.store.load_by_thread_id(thread_id).await? {
        Some(record) => Ok(Json(record).into_response()),
        None => Err(ApiError::not_found(format!("Project '{}' not found", thread_id))),
    }
}

/// `GET /api/projects` lists; `?threadId=` loads one record
async fn list_or_load(
    State(state): State<AppState>,
    Query(query): Query<ProjectQuery>,
) -> Result<Response, ApiError> {
    if let Some(thread_id) = query.thread_id {
        return load(&state, &thread_id).await;
    }
    let records = state.store.list().await?;
    Ok(Json(records).into_response())
}

async fn load_project(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> Result<Response, ApiError> {
    load(&state, &thread_id).await
}

async fn upsert_project(
    State(state): State<AppState>,
    Json(req): Json<UpsertRequest>,
) -> Result<Response, ApiError> {
    let Some(thread_id) = req.thread_id.filter(|id| !id.is_empty()) else {
        return Err(ApiError::bad_request("threadId is required"));
    };
    let record = state.store.upsert(&thread_id, req.patch).await?;
    tracing::debug!(%thread_id, status = record.status.as_str(), "Project upserted");
    Ok(Json(record).into_response())
}

async fn delete_project(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> Result<Response, ApiError> {
    if state.store.delete(&thread_id).await? {
        Ok(Json(serde_json::json!({ "deleted": thread_id })).into_response())
    } else {
        Err(ApiError::not_found(format!("Project '{}' not found", thread_id)))
    }
}
