//! JSON HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/api/providers` | Registered providers |
//! | `POST` | `/api/search` | Run a search (rate limited) |
//! | `POST` | `/api/click` | Track a click on a listing |
//! | `GET`  | `/api/analytics/popular?limit=` | Most searched queries |
//! | `GET`  | `/api/analytics/history?limit=` | The caller's recent searches |
//! | `GET`  | `/api/analytics/trends?days=` | Daily query counts |
//! | `GET`  | `/api/analytics/platforms?days=` | Per-platform yield |
//!
//! # Caller identity
//!
//! Authentication happens upstream. An authenticated caller is identified by
//! the `x-user-id` header; anonymous callers are identified by the first
//! `x-forwarded-for` entry, or the socket peer address when absent.
//!
//! Both headers are trusted as-is and key the rate limiter, so a client that
//! sets them itself can pick a fresh limit window per request. Deploy behind a
//! reverse proxy that strips or overwrites `x-user-id` and `x-forwarded-for`.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "invalid query: query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `rate_limited` (429, with a
//! `Retry-After` header and a `retry_after` field), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::aggregator::{ClickReceipt, SearchAggregator};
use crate::analytics::{PlatformStat, PopularQuery, TrendPoint};
use crate::config::Config;
use crate::error::SearchError;
use crate::models::{ClientMeta, SearchFilters, SearchRecord, SearchRequest, SearchResponse};
use crate::rate_limit::{CallerKey, RateLimiter};

/// Header carrying the upstream-authenticated caller identity.
pub const USER_HEADER: &str = "x-user-id";

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    aggregator: Arc<SearchAggregator>,
    limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(config: Arc<Config>, aggregator: Arc<SearchAggregator>) -> Self {
        let limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
        Self {
            config,
            aggregator,
            limiter,
        }
    }
}

/// Build the router. The service must be run with
/// `into_make_service_with_connect_info::<SocketAddr>()` so anonymous
/// callers can be keyed by address.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/providers", get(handle_providers))
        .route("/api/search", post(handle_search))
        .route("/api/click", post(handle_click))
        .route("/api/analytics/popular", get(handle_popular))
        .route("/api/analytics/history", get(handle_history))
        .route("/api/analytics/trends", get(handle_trends))
        .route("/api/analytics/platforms", get(handle_platforms))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on `[server].bind` and run until SIGINT/SIGTERM.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let aggregator = crate::search::build_aggregator(config).await?;
    let state = AppState::new(Arc::new(config.clone()), Arc::new(aggregator));

    let limiter = state.limiter.clone();
    let prune_every = Duration::from_secs(config.rate_limit.burst_window_secs.max(1));
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(prune_every);
        loop {
            tick.tick().await;
            limiter.prune(Instant::now());
        }
    });

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(addr = %config.server.bind, "HTTP server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("HTTP server stopped");
    Ok(())
}

/// Resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
    retry_after: Option<u64>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
                retry_after: self.retry_after,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        if let Some(secs) = self.retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

impl From<SearchError> for AppError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::InvalidQuery(_) => bad_request(err.to_string()),
            SearchError::RateLimitExceeded { retry_after_secs } => AppError {
                status: StatusCode::TOO_MANY_REQUESTS,
                code: "rate_limited".to_string(),
                message: err.to_string(),
                retry_after: Some(retry_after_secs),
            },
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
        retry_after: None,
    }
}

fn internal(err: anyhow::Error) -> AppError {
    warn!(error = %err, "request failed");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: err.to_string(),
        retry_after: None,
    }
}

// ============ Caller identity ============

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn caller_id(headers: &HeaderMap) -> Option<String> {
    header_str(headers, USER_HEADER).map(str::to_string)
}

/// First `x-forwarded-for` hop, else the socket peer.
fn client_ip(headers: &HeaderMap, peer: SocketAddr) -> String {
    header_str(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| peer.ip().to_string())
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /api/providers ============

#[derive(Serialize)]
struct ProviderInfo {
    name: String,
    #[serde(rename = "type")]
    provider_type: String,
    description: String,
}

#[derive(Serialize)]
struct ProvidersResponse {
    providers: Vec<ProviderInfo>,
}

async fn handle_providers(State(state): State<AppState>) -> Json<ProvidersResponse> {
    let providers = state
        .aggregator
        .providers()
        .providers()
        .iter()
        .map(|p| ProviderInfo {
            name: p.name().to_string(),
            provider_type: p.provider_type().to_string(),
            description: p.description().to_string(),
        })
        .collect();
    Json(ProvidersResponse { providers })
}

// ============ POST /api/search ============

#[derive(Deserialize)]
struct SearchBody {
    query: String,
    #[serde(default)]
    filters: Option<SearchFilters>,
    #[serde(default)]
    limit: Option<usize>,
}

async fn handle_search(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Result<Json<SearchBody>, JsonRejection>,
) -> Result<Json<SearchResponse>, AppError> {
    let caller = caller_id(&headers);
    let ip = client_ip(&headers, peer);

    state
        .limiter
        .admit(&CallerKey::resolve(caller.as_deref(), Some(&ip)))?;

    let Json(body) = body?;
    let request = SearchRequest {
        query: body.query,
        filters: body.filters.unwrap_or_default(),
        limit: body.limit.unwrap_or(state.config.search.default_limit),
        caller_id: caller,
    };
    let client = ClientMeta {
        user_agent: header_str(&headers, header::USER_AGENT.as_str()).map(str::to_string),
        ip: Some(ip),
    };

    let response = state.aggregator.search(&request, &client).await?;
    Ok(Json(response))
}

// ============ POST /api/click ============

#[derive(Deserialize)]
struct ClickBody {
    listing_id: String,
    #[serde(default)]
    record_id: Option<String>,
}

async fn handle_click(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<ClickBody>, JsonRejection>,
) -> Result<Json<ClickReceipt>, AppError> {
    let Json(body) = body?;
    let caller = caller_id(&headers);
    let receipt = state
        .aggregator
        .track_click(&body.listing_id, body.record_id.as_deref(), caller.as_deref())
        .await?;
    Ok(Json(receipt))
}

// ============ GET /api/analytics/* ============

#[derive(Deserialize)]
struct LimitParams {
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct DaysParams {
    days: Option<u32>,
}

#[derive(Serialize)]
struct PopularResponse {
    queries: Vec<PopularQuery>,
}

#[derive(Serialize)]
struct HistoryResponse {
    searches: Vec<SearchRecord>,
}

#[derive(Serialize)]
struct TrendsResponse {
    days: u32,
    points: Vec<TrendPoint>,
}

#[derive(Serialize)]
struct PlatformsResponse {
    days: u32,
    platforms: Vec<PlatformStat>,
}

async fn handle_popular(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Result<Json<PopularResponse>, AppError> {
    let limit = params.limit.unwrap_or(10).clamp(1, 100);
    let queries = state
        .aggregator
        .analytics()
        .popular(limit)
        .await
        .map_err(internal)?;
    Ok(Json(PopularResponse { queries }))
}

async fn handle_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<LimitParams>,
) -> Result<Json<HistoryResponse>, AppError> {
    let caller = caller_id(&headers)
        .ok_or_else(|| bad_request(format!("{} header is required", USER_HEADER)))?;
    let limit = params.limit.unwrap_or(20).clamp(1, 100);
    let searches = state
        .aggregator
        .analytics()
        .history(&caller, limit)
        .await
        .map_err(internal)?;
    Ok(Json(HistoryResponse { searches }))
}

async fn handle_trends(
    State(state): State<AppState>,
    Query(params): Query<DaysParams>,
) -> Result<Json<TrendsResponse>, AppError> {
    let days = params.days.unwrap_or(7).clamp(1, 365);
    let points = state
        .aggregator
        .analytics()
        .trends(days)
        .await
        .map_err(internal)?;
    Ok(Json(TrendsResponse { days, points }))
}

async fn handle_platforms(
    State(state): State<AppState>,
    Query(params): Query<DaysParams>,
) -> Result<Json<PlatformsResponse>, AppError> {
    let days = params.days.unwrap_or(30).clamp(1, 365);
    let platforms = state
        .aggregator
        .analytics()
        .platform_stats(days)
        .await
        .map_err(internal)?;
    Ok(Json(PlatformsResponse { days, platforms }))
}
