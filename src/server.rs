//! HTTP API: an axum router over a shared [`Orchestrator`].
//!
//! | Route | Body | Reply |
//! |-------|------|-------|
//! | `POST /v1/addresses` | `{"image": "<base64>"}` | `{"addresses": [...]}` |
//! | `PUT /v1/geocode-address` | `{"address": "..."}` | one `AddressRecord` |
//! | `GET /`, `GET /health` | none | status object |
//!
//! Every error body is `{"error": "..."}`. Bodies are parsed by hand rather
//! than through the `Json` extractor so that a missing `Content-Type` header
//! and a syntax error both produce the same "Invalid JSON payload" reply.

use crate::config::ServerConfig;
use crate::error::AddrLensError;
use crate::output::{AddressRecord, ExtractionRequest, GeocodeRequest, ResponseEnvelope};
use crate::pipeline::orchestrator::Orchestrator;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

/// Shared state for the handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
        }
    }
}

/// Errors a handler can answer with.
#[derive(Debug)]
pub enum ApiError {
    /// The body was not JSON of the expected shape.
    InvalidPayload,
    /// The body parsed but a required field was empty.
    BadRequest(String),
    /// Extraction failed upstream.
    Upstream(String),
    NotFound,
}

impl From<AddrLensError> for ApiError {
    fn from(e: AddrLensError) -> Self {
        if e.is_client_error() {
            ApiError::BadRequest(e.to_string())
        } else {
            ApiError::Upstream(format!("Failed to extract addresses: {e}"))
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::InvalidPayload => {
                (StatusCode::BAD_REQUEST, "Invalid JSON payload".to_string())
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Upstream(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
        };

        if status.is_server_error() {
            error!(status = status.as_u16(), "{}", message);
        } else {
            debug!(status = status.as_u16(), "{}", message);
        }

        (status, Json(ResponseEnvelope::failure(message))).into_response()
    }
}

/// Build the router with every route, body limit, tracing and CORS.
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/v1/addresses", post(parse_addresses))
        .route("/v1/geocode-address", put(geocode_address))
        .method_not_allowed_fallback(not_found)
        .fallback(not_found)
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.cors_origins))
}

/// Bind and serve until Ctrl-C.
pub async fn serve(orchestrator: Orchestrator, config: &ServerConfig) -> std::io::Result<()> {
    let app = build_router(AppState::new(orchestrator), config);
    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr).await?;

    info!(addr = %addr, "HTTP API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    if origins.is_empty() {
        warn!("CORS allows any origin; set CORS_ORIGINS outside development");
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", o);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| {
        debug!("Rejected payload: {}", e);
        ApiError::InvalidPayload
    })
}

// ── Handlers ─────────────────────────────────────────────────────────────

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "message": "addrlens API is running",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `POST /v1/addresses`
async fn parse_addresses(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ResponseEnvelope>, ApiError> {
    let req: ExtractionRequest = parse_body(&body)?;
    let output = state.orchestrator.run(&req.image).await?;
    Ok(Json(ResponseEnvelope::success(output.addresses)))
}

/// `PUT /v1/geocode-address`
async fn geocode_address(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<AddressRecord>, ApiError> {
    let req: GeocodeRequest = parse_body(&body)?;
    let record = state.orchestrator.geocode(&req.address).await?;
    Ok(Json(record))
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}
