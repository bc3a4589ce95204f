mod error;

use std::any::Any;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use komal_core::{AnalysisRequest, ModerationPolicy, ModerationResult};
use komal_engine::ModerationEngine;
use komal_ml::SemanticStack;
use komal_observability::{AppMetrics, MetricsSnapshot};
use komal_taxonomy::{TaxonomyStats, TaxonomyStore};
use serde::Serialize;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, Any as AnyOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

pub use error::ApiError;

pub const SERVICE_NAME: &str = "komal-moderation";
pub const DEFAULT_TAXONOMY_PATH: &str = "taxonomy/moderation_taxonomy.csv";
pub const DEFAULT_BIND: &str = "0.0.0.0:8000";
const DEFAULT_BODY_LIMIT_BYTES: usize = 64 * 1024;

/// Process settings, read once at startup.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub taxonomy_path: PathBuf,
    pub bind: String,
    pub policy_path: Option<PathBuf>,
    pub allowed_origins: Vec<String>,
    pub body_limit_bytes: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            taxonomy_path: PathBuf::from(DEFAULT_TAXONOMY_PATH),
            bind: DEFAULT_BIND.to_string(),
            policy_path: None,
            allowed_origins: Vec::new(),
            body_limit_bytes: DEFAULT_BODY_LIMIT_BYTES,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            taxonomy_path: non_empty_var("KOMAL_TAXONOMY_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.taxonomy_path),
            bind: non_empty_var("KOMAL_BIND").unwrap_or(defaults.bind),
            policy_path: non_empty_var("KOMAL_POLICY_PATH").map(PathBuf::from),
            allowed_origins: parse_allowed_origins(non_empty_var("KOMAL_ALLOWED_ORIGINS").as_deref()),
            body_limit_bytes: non_empty_var("KOMAL_BODY_LIMIT_BYTES")
                .and_then(|value| value.parse::<usize>().ok())
                .filter(|limit| *limit > 0)
                .unwrap_or(defaults.body_limit_bytes),
        }
    }

    pub fn with_taxonomy(path: impl AsRef<Path>) -> Self {
        Self {
            taxonomy_path: path.as_ref().to_path_buf(),
            ..Self::default()
        }
    }
}

#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<ModerationEngine>,
    pub allowed_origins: Arc<Vec<String>>,
    pub body_limit_bytes: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    timestamp_utc: String,
    taxonomy: TaxonomyStats,
    semantic_model: &'static str,
    metrics: MetricsSnapshot,
}

pub fn build_app(taxonomy_path: impl AsRef<Path>) -> Result<Router> {
    build_app_with(&ServiceConfig::with_taxonomy(taxonomy_path))
}

/// Loads the taxonomy and policy, wires the engine and returns the router.
/// A missing or empty taxonomy is fatal.
pub fn build_app_with(config: &ServiceConfig) -> Result<Router> {
    let taxonomy = TaxonomyStore::from_path(&config.taxonomy_path).with_context(|| {
        format!("failed to load taxonomy from {}", config.taxonomy_path.display())
    })?;

    let policy = match &config.policy_path {
        Some(path) => ModerationPolicy::from_json_file(path)?,
        None => ModerationPolicy::default(),
    };

    let semantic = SemanticStack::from_env(&taxonomy);
    info!(
        taxonomy = %taxonomy.source(),
        rules = taxonomy.len(),
        semantic_model = semantic.model_name(),
        "moderation engine ready"
    );

    let engine = ModerationEngine::new(Arc::new(taxonomy), policy, semantic, AppMetrics::shared());

    Ok(build_router(ApiState {
        engine: Arc::new(engine),
        allowed_origins: Arc::new(config.allowed_origins.clone()),
        body_limit_bytes: config.body_limit_bytes,
    }))
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/analyze", post(analyze))
        .route("/v1/analyze", post(analyze))
        .layer(build_cors_layer(&state.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(RequestBodyLimitLayer::new(state.body_limit_bytes))
        .layer(CatchPanicLayer::custom(panic_response))
        .with_state(state)
}

async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let payload = HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
        timestamp_utc: chrono::Utc::now().to_rfc3339(),
        taxonomy: state.engine.taxonomy().stats(),
        semantic_model: state.engine.semantic_model(),
        metrics: state.engine.metrics().snapshot(),
    };
    (StatusCode::OK, Json(payload))
}

async fn analyze(
    State(state): State<ApiState>,
    payload: Result<Json<AnalysisRequest>, JsonRejection>,
) -> Result<Json<ModerationResult>, ApiError> {
    let Json(request) = payload?;
    let result = state.engine.analyze(request).await?;
    Ok(Json(result))
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(panic = %detail, "request handler panicked");
    ApiError::Internal.into_response()
}

fn build_cors_layer(allowed_origins: &Arc<Vec<String>>) -> CorsLayer {
    let origins = allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect::<Vec<_>>();

    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::HeaderName::from_static("x-api-key"),
        ]);

    if origins.is_empty() {
        layer.allow_origin(AnyOrigin)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

fn parse_allowed_origins(value: Option<&str>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(|origin| origin.trim().trim_end_matches('/').to_string())
        .filter(|origin| !origin.is_empty() && origin != "*")
        .collect()
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
