//! HTTP server for the capture extension and dashboard.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/health` | Health check (returns version) |
//! | `GET`    | `/projects` | List projects |
//! | `POST`   | `/projects` | Create a project |
//! | `GET`    | `/projects/{id}` | Fetch one project |
//! | `DELETE` | `/projects/{id}` | Delete a project and its clips |
//! | `GET`    | `/projects/{id}/bridge` | Compile the context bridge |
//! | `GET`    | `/projects/{id}/export` | Flat export of every clip |
//! | `POST`   | `/clips` | Save a clip |
//! | `POST`   | `/save` | Alias of `POST /clips` used by the capture extension |
//! | `GET`    | `/clips` | Page through clips, newest first |
//! | `PUT`    | `/clips/{id}` | Update title, text, or project |
//! | `DELETE` | `/clips/{id}` | Delete a clip |
//!
//! The bridge endpoint accepts `format`, `compact`, and `max_tokens` query
//! parameters. An `X-Gemini-Key` header overrides the configured API key for
//! that request only. The key is only required when the project has clips.
//!
//! The export endpoint returns `{project, clip_count, context}`.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "not found: project 42" } }
//! ```
//!
//! Error codes: `bad_request` (400), `missing_api_key` (400),
//! `not_found` (404), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the browser extension
//! can call the server from any page.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use clip_bridge_core::budget::WordCountBudget;
use clip_bridge_core::models::{Clip, Project};
use clip_bridge_core::render::OutputFormat;
use clip_bridge_core::store::{ClipStore, ClipUpdate};

use crate::bridge::{BridgeCompiler, BridgeOptions, BridgeOutput};
use crate::cache::SynthesisCache;
use crate::clips::{save_clip, save_project, NewClip, NewProject};
use crate::config::Config;
use crate::db;
use crate::error::BridgeError;
use crate::export::{build_export, ExportData};
use crate::llm::resolve_synthesizer;
use crate::migrate::apply_schema;
use crate::sqlite_store::SqliteStore;

/// Header carrying a per-request Gemini API key.
pub const API_KEY_HEADER: &str = "x-gemini-key";

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 500;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    store: Arc<dyn ClipStore>,
    compiler: Arc<BridgeCompiler>,
}

impl AppState {
    /// Build state over an existing store with a fresh synthesis cache.
    pub fn new(config: Config, store: Arc<dyn ClipStore>) -> Self {
        let cache = Arc::new(SynthesisCache::new(config.cache.policy()));
        let compiler = Arc::new(BridgeCompiler::new(
            store.clone(),
            cache,
            Arc::new(WordCountBudget),
        ));
        Self {
            config: Arc::new(config),
            store,
            compiler,
        }
    }
}

/// Assemble the router with every route and the CORS layer.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/projects", get(handle_list_projects).post(handle_create_project))
        .route(
            "/projects/{id}",
            get(handle_get_project).delete(handle_delete_project),
        )
        .route("/projects/{id}/bridge", get(handle_bridge))
        .route("/projects/{id}/export", get(handle_export))
        .route("/clips", get(handle_list_clips).post(handle_create_clip))
        .route("/save", post(handle_create_clip))
        .route(
            "/clips/{id}",
            put(handle_update_clip).delete(handle_delete_clip),
        )
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server on `[server].bind`.
///
/// Opens the database (creating the schema if needed) and serves until the
/// process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;

    let bind_addr = config.server.bind.clone();
    let state = AppState::new(config.clone(), Arc::new(SqliteStore::new(pool)));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(
        addr = %bind_addr,
        provider = %config.synthesis.provider,
        model = %config.synthesis.model,
        "clip bridge server listening"
    );
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"not_found"`).
    code: &'static str,
    message: String,
}

/// Error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

impl From<BridgeError> for AppError {
    fn from(err: BridgeError) -> Self {
        let message = err.to_string();
        match err {
            BridgeError::MissingApiKey { .. } => AppError {
                status: StatusCode::BAD_REQUEST,
                code: "missing_api_key",
                message,
            },
            BridgeError::InvalidRequest(_) => bad_request(message),
            BridgeError::NotFound(_) => not_found(message),
            BridgeError::Store(_) | BridgeError::Internal(_) => {
                tracing::error!(error = %message, "request failed");
                AppError {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    code: "internal",
                    message,
                }
            }
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        BridgeError::Store(err).into()
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============ Projects ============

#[derive(Serialize)]
struct ProjectListResponse {
    projects: Vec<Project>,
}

async fn handle_list_projects(
    State(state): State<AppState>,
) -> Result<Json<ProjectListResponse>, AppError> {
    let projects = state.store.list_projects().await?;
    Ok(Json(ProjectListResponse { projects }))
}

async fn handle_create_project(
    State(state): State<AppState>,
    Json(request): Json<NewProject>,
) -> Result<(StatusCode, Json<Project>), AppError> {
    let project = save_project(state.store.as_ref(), request).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

async fn handle_get_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Project>, AppError> {
    state
        .store
        .get_project(&id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(format!("project not found: {}", id)))
}

#[derive(Serialize)]
struct DeletedResponse {
    deleted: bool,
}

async fn handle_delete_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse>, AppError> {
    if !state.store.delete_project(&id).await? {
        return Err(not_found(format!("project not found: {}", id)));
    }
    tracing::info!(project_id = %id, "project deleted");
    Ok(Json(DeletedResponse { deleted: true }))
}

// ============ GET /projects/{id}/bridge ============

#[derive(Debug, Deserialize)]
struct BridgeQuery {
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    compact: Option<bool>,
    #[serde(default)]
    max_tokens: Option<usize>,
}

async fn handle_bridge(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<BridgeQuery>,
    headers: HeaderMap,
) -> Result<Json<BridgeOutput>, AppError> {
    let format = match query.format.as_deref() {
        Some(f) => f
            .parse::<OutputFormat>()
            .map_err(|e| bad_request(e.to_string()))?,
        None => state.config.bridge.format()?,
    };
    if query.max_tokens == Some(0) {
        return Err(bad_request("max_tokens must be > 0"));
    }

    let options = BridgeOptions {
        format,
        compact: query.compact.unwrap_or(false),
        max_tokens: query.max_tokens.or(state.config.bridge.max_tokens),
    };

    let api_key = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    let output = state
        .compiler
        .compile(&id, &options, || {
            resolve_synthesizer(&state.config.synthesis, api_key).map(Arc::from)
        })
        .await?;
    Ok(Json(output))
}

// ============ GET /projects/{id}/export ============

async fn handle_export(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ExportData>, AppError> {
    Ok(Json(build_export(state.store.as_ref(), &id).await?))
}

// ============ Clips ============

async fn handle_create_clip(
    State(state): State<AppState>,
    Json(request): Json<NewClip>,
) -> Result<(StatusCode, Json<Clip>), AppError> {
    let clip = save_clip(state.store.as_ref(), request).await?;
    Ok((StatusCode::CREATED, Json(clip)))
}

#[derive(Debug, Deserialize)]
struct ClipListQuery {
    #[serde(default)]
    project_id: Option<String>,
    #[serde(default)]
    limit: Option<i64>,
    #[serde(default)]
    offset: Option<i64>,
}

#[derive(Serialize)]
struct ClipListResponse {
    clips: Vec<Clip>,
    total: i64,
    limit: i64,
    offset: i64,
}

async fn handle_list_clips(
    State(state): State<AppState>,
    Query(query): Query<ClipListQuery>,
) -> Result<Json<ClipListResponse>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0);
    if !(1..=MAX_PAGE_SIZE).contains(&limit) {
        return Err(bad_request(format!(
            "limit must be between 1 and {}",
            MAX_PAGE_SIZE
        )));
    }
    if offset < 0 {
        return Err(bad_request("offset must be >= 0"));
    }

    let project_id = query.project_id.as_deref().filter(|p| !p.is_empty());
    let page = state
        .store
        .list_recent_clips(project_id, limit, offset)
        .await?;

    Ok(Json(ClipListResponse {
        clips: page.clips,
        total: page.total,
        limit,
        offset,
    }))
}

async fn handle_update_clip(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<ClipUpdate>,
) -> Result<Json<Clip>, AppError> {
    if let Some(project_id) = &update.project_id {
        if state.store.get_project(project_id).await?.is_none() {
            return Err(not_found(format!("project not found: {}", project_id)));
        }
    }
    state
        .store
        .update_clip(&id, &update)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(format!("clip not found: {}", id)))
}

async fn handle_delete_clip(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse>, AppError> {
    if !state.store.delete_clip(&id).await? {
        return Err(not_found(format!("clip not found: {}", id)));
    }
    Ok(Json(DeletedResponse { deleted: true }))
}
