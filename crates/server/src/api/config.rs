//! # Config API
//!
//! Health check plus read/patch access to the runtime settings. A patch is
//! merged into `config.json` and into the live settings, so the next run
//! picks it up.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

use orchestrai_core::config::{PersistedSettings, Settings};

use super::{ApiError, AppState};

#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    /// What is stored in `config.json`
    pub config: PersistedSettings,
    /// Settings in effect after defaults and environment overrides
    pub effective: Settings,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub storage: &'static str,
    pub projects: usize,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/config", get(get_config).patch(update_config))
}

async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    match state.store.list().await {
        Ok(records) => Ok(Json(HealthResponse {
            status: "ok",
            storage: state.store.backend(),
            projects: records.len(),
        })),
        Err(e) => Err(ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            format!("{} storage unreachable: {:#}", state.store.backend(), e),
        )),
    }
}

async fn get_config(State(state): State<AppState>) -> Result<Json<ConfigResponse>, ApiError> {
    let effective = state.settings.read().await.clone();
    let config = PersistedSettings::load(&effective.runtime_dir).await?;
    Ok(Json(ConfigResponse { config, effective }))
}

async fn update_config(
    State(state): State<AppState>,
    Json(updates): Json<PersistedSettings>,
) -> Result<Json<ConfigResponse>, ApiError> {
    let mut settings = state.settings.write().await;

    let mut config = PersistedSettings::load(&settings.runtime_dir).await?;
    config.merge(updates.clone());
    config.save(&settings.runtime_dir).await?;

    settings.merge(updates);
    tracing::info!("Configuration updated");

    Ok(Json(ConfigResponse {
        config,
        effective: settings.clone(),
    }))
}
