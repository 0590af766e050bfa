//! HTTP surface: the sync trigger plus the read API the website consumes.
//!
//! The trigger is a `POST` with no body, protected by a bearer token when
//! one is configured. A permissive CORS layer answers `OPTIONS` preflights
//! so the admin page can call the trigger cross-origin.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::DateTime;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::storage::{Database, Episode, SyncRun};
use crate::sync::{outcome, run_sync, SyncSummary};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub client: reqwest::Client,
    pub config: Arc<Config>,
}

/// Build the application router with all routes and middleware.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/sync-rss-feed", post(trigger_sync))
        .route("/episodes", get(list_episodes))
        .route("/episodes/latest", get(latest_episode))
        .route("/sync-runs", get(list_sync_runs))
        .route("/health", get(health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SyncDetails {
    episodes_added: usize,
    episodes_updated: usize,
    episodes_total: usize,
    errors: Vec<String>,
}

impl From<&SyncSummary> for SyncDetails {
    fn from(summary: &SyncSummary) -> Self {
        Self {
            episodes_added: summary.added,
            episodes_updated: summary.updated,
            episodes_total: summary.total,
            errors: summary.errors.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct SyncResponse {
    success: bool,
    message: String,
    details: SyncDetails,
}

/// Error envelope for fatal failures and rejected requests.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    details: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            details: details.into(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EpisodeJson {
    id: i64,
    title: String,
    description: String,
    audio_url: String,
    published_date: String,
    duration: String,
    duration_minutes: i64,
    cover_image: String,
    season: i64,
    episode: i64,
}

impl From<Episode> for EpisodeJson {
    fn from(e: Episode) -> Self {
        Self {
            id: e.id,
            title: e.title,
            description: e.description,
            audio_url: e.audio_url,
            published_date: rfc3339(e.published_date),
            duration: e.duration,
            duration_minutes: e.duration_minutes,
            cover_image: e.cover_image,
            season: e.season,
            episode: e.episode,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SyncRunJson {
    id: i64,
    started_at: String,
    completed_at: Option<String>,
    status: String,
    episodes_added: i64,
    episodes_updated: i64,
    episodes_total: i64,
    error_message: Option<String>,
}

impl From<SyncRun> for SyncRunJson {
    fn from(run: SyncRun) -> Self {
        Self {
            id: run.id,
            started_at: rfc3339(run.started_at),
            completed_at: run.completed_at.map(rfc3339),
            status: run.status.to_string(),
            episodes_added: run.episodes_added,
            episodes_updated: run.episodes_updated,
            episodes_total: run.episodes_total,
            error_message: run.error_message,
        }
    }
}

fn rfc3339(unix_seconds: i64) -> String {
    DateTime::from_timestamp(unix_seconds, 0)
        .map(|d| d.to_rfc3339())
        .unwrap_or_default()
}

// ============================================================================
// Handlers
// ============================================================================

async fn trigger_sync(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(rejection) = authorize(&state.config, &headers) {
        return rejection;
    }

    match run_sync(&state.db, &state.client, &state.config).await {
        Ok(summary) => {
            let status = outcome(&summary);
            let response = SyncResponse {
                success: !matches!(status, crate::storage::SyncStatus::Failed),
                message: format!(
                    "Sync completed: {} added, {} updated",
                    summary.added, summary.updated
                ),
                details: SyncDetails::from(&summary),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Sync run failed before processing any items");
            (
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse::new("Sync failed", e.to_string())),
            )
                .into_response()
        }
    }
}

/// Check the bearer credential on the trigger endpoint. No configured token
/// means the endpoint is open (development mode).
fn authorize(config: &Config, headers: &HeaderMap) -> Result<(), Response> {
    let Some(expected) = config.sync_token.as_ref() else {
        return Ok(());
    };

    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match presented {
        Some(token) if token == expected.expose_secret() => Ok(()),
        _ => Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new(
                "Unauthorized",
                "missing or invalid bearer token",
            )),
        )
            .into_response()),
    }
}

#[derive(Debug, Deserialize)]
struct EpisodesQuery {
    search: Option<String>,
}

async fn list_episodes(
    State(state): State<AppState>,
    Query(query): Query<EpisodesQuery>,
) -> Response {
    let result = match query.search.as_deref().map(str::trim) {
        Some(term) if !term.is_empty() => state.db.search_episodes(term).await,
        _ => state.db.list_episodes().await,
    };

    match result {
        Ok(episodes) => {
            let episodes: Vec<EpisodeJson> = episodes.into_iter().map(EpisodeJson::from).collect();
            Json(episodes).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to list episodes");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to fetch episodes", e.to_string())),
            )
                .into_response()
        }
    }
}

async fn latest_episode(State(state): State<AppState>) -> Response {
    match state.db.latest_episode().await {
        Ok(episode) => Json(episode.map(EpisodeJson::from)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to fetch latest episode");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to fetch latest episode", e.to_string())),
            )
                .into_response()
        }
    }
}

async fn list_sync_runs(State(state): State<AppState>) -> Response {
    match state.db.latest_sync_runs(20).await {
        Ok(runs) => {
            let runs: Vec<SyncRunJson> = runs.into_iter().map(SyncRunJson::from).collect();
            Json(runs).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to list sync runs");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to fetch sync runs", e.to_string())),
            )
                .into_response()
        }
    }
}

async fn health(State(state): State<AppState>) -> Response {
    match state.db.ping().await {
        Ok(()) => Json(serde_json::json!({
            "status": "healthy",
            "database": "connected"
        }))
        .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Database health check failed");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}
