use crate::client::UpstreamClient;
use crate::config::ProxyConfig;
use crate::error::{ProxyError, Result};
use crate::handlers::{audio, chat, images, models, native};
use crate::logging::{LogLevel, SharedLogger};

use axum::extract::{DefaultBodyLimit, Request, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

pub struct AppState {
    pub config: ProxyConfig,
    pub http: reqwest::Client,
    pub logger: SharedLogger,
    /// Used when a request carries no bearer token of its own.
    pub fallback_api_key: Option<String>,
    /// Root of every stream relay's cancellation token.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Build state from config, resolving the fallback key from the environment once.
    pub fn new(config: ProxyConfig, logger: SharedLogger, shutdown: CancellationToken) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.upstream.connect_timeout())
            .build()?;
        let fallback_api_key = config.resolve_api_key();
        Ok(Self {
            config,
            http,
            logger,
            fallback_api_key,
            shutdown,
        })
    }

    /// Upstream client acting with the caller's key.
    pub fn upstream(&self, key: &ApiKey) -> UpstreamClient {
        UpstreamClient::new(
            self.http.clone(),
            self.config.upstream.base_url.as_str(),
            key.0.as_str(),
            self.config.upstream.request_timeout(),
        )
    }

    pub fn asset_base_url(&self) -> &str {
        &self.config.upstream.asset_base_url
    }
}

/// Upstream API key resolved for the current request.
#[derive(Debug, Clone)]
pub struct ApiKey(pub String);

pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        // OpenAI-compatible
        .route("/v1/chat/completions", post(chat::completions))
        .route("/v1/images/generations", post(images::generations))
        .route("/v1/images/variations", post(images::variations))
        .route("/v1/images/edits", post(images::edits))
        .route("/v1/audio/speech", post(audio::speech))
        .route("/v1/audio/transcriptions", post(audio::transcriptions))
        .route("/v1/audio/translations", post(audio::translations))
        .route("/v1/embeddings", post(models::embeddings))
        .route("/v1/models", get(models::list))
        .route("/v1/models/:model", get(models::retrieve))
        // Native
        .route("/api/assets", post(native::upload_asset))
        .route("/api/assets/:id", get(native::get_asset))
        .route(
            "/api/conversations",
            post(native::create_conversation).get(native::list_conversations),
        )
        .route(
            "/api/conversations/:id",
            get(native::get_conversation).delete(native::delete_conversation),
        )
        .route("/api/features", post(native::feature))
        .route("/api/features/stream", post(native::feature_stream))
        .route("/api/chat", post(native::chat))
        .route("/api/image/generate", post(native::image_generate))
        .route("/api/image/variation", post(native::image_variation))
        .route("/api/image/upscale", post(native::image_upscale))
        .route("/api/image/remove-background", post(native::remove_background))
        .route("/api/image/replace-background", post(native::replace_background))
        .route("/api/image/remove-text", post(native::remove_text))
        .route("/api/image/object-replace", post(native::object_replace))
        .route("/api/image/to-prompt", post(native::image_to_prompt))
        .route("/api/audio/tts", post(native::text_to_speech))
        .route("/api/audio/stt", post(native::speech_to_text))
        .route("/api/video/generate", post(native::video_generate))
        .route("/api/video/from-image", post(native::image_to_video))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .merge(api)
        .fallback(handle_not_found)
        .layer(DefaultBodyLimit::max(state.config.body_limit_bytes))
        .layer(middleware::from_fn_with_state(state.clone(), log_requests))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &ProxyConfig) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if config.allows_any_origin() {
        return cors.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    cors.allow_origin(AllowOrigin::list(origins))
}

/// `Authorization: Bearer <key>`, if present and non-empty.
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();
    let token = match value.split_once(' ') {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
        _ if value.eq_ignore_ascii_case("bearer") => "",
        _ => value,
    };
    (!token.is_empty()).then(|| token.to_string())
}

async fn require_api_key(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> std::result::Result<Response, ProxyError> {
    let key = bearer_token(req.headers())
        .or_else(|| state.fallback_api_key.clone())
        .ok_or_else(ProxyError::authentication)?;
    req.extensions_mut().insert(ApiKey(key));
    Ok(next.run(req).await)
}

async fn log_requests(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(req).await;

    let status = response.status();
    let level = if status.is_server_error() {
        LogLevel::Error
    } else if status.is_client_error() {
        LogLevel::Warn
    } else {
        LogLevel::Info
    };
    state.logger.log_with_context(
        level,
        "http",
        format!("{method} {path} {}", status.as_u16()),
        json!({
            "method": method.as_str(),
            "path": path,
            "status": status.as_u16(),
            "duration_ms": start.elapsed().as_millis() as u64,
        }),
    );
    response
}

const OPENAI_ENDPOINTS: &[&str] = &[
    "/v1/chat/completions",
    "/v1/images/generations",
    "/v1/images/variations",
    "/v1/audio/speech",
    "/v1/audio/transcriptions",
    "/v1/audio/translations",
    "/v1/embeddings",
    "/v1/models",
];

const NATIVE_ENDPOINTS: &[&str] = &[
    "/api/features",
    "/api/features/stream",
    "/api/conversations",
    "/api/assets",
    "/api/chat",
    "/api/image/*",
    "/api/audio/*",
    "/api/video/*",
];

async fn handle_root() -> Json<Value> {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
        "version": env!("CARGO_PKG_VERSION"),
        "health": "/health",
        "openai": "/v1/chat/completions",
    }))
}

async fn handle_health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "proxy": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "openai": OPENAI_ENDPOINTS,
            "native": NATIVE_ENDPOINTS,
        },
    }))
}

async fn handle_not_found(method: Method, uri: Uri) -> Response {
    let body = json!({
        "error": {
            "message": format!("Endpoint {} {} not found", method, uri.path()),
            "type": "invalid_request_error",
        }
    });
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}
