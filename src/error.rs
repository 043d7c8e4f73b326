//! Error types for the proxy.
//!
//! Every failure the proxy can report is one [`ProxyError`] variant. The
//! variant decides the HTTP status and the OpenAI-style `type` code written in
//! the error body, so handlers only ever return `Result<_, ProxyError>`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ProxyError {
    #[error("{message}")]
    Validation {
        message: String,
        details: Option<Value>,
    },

    #[error("{message}")]
    Authentication { message: String },

    #[error("{resource} not found")]
    NotFound { resource: String },

    #[error("{message}")]
    RateLimited { message: String },

    #[error("{feature} is not implemented")]
    NotImplemented { feature: String },

    /// Non-2xx answer from the upstream API. The body is kept verbatim.
    #[error("API Error {status}: {body}")]
    Upstream { status: u16, body: String },

    /// The upstream sent no response head in time.
    #[error("Upstream did not respond within {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("{0}")]
    Other(String),
}

impl ProxyError {
    pub fn validation(msg: impl Into<String>, details: Option<Value>) -> Self {
        Self::Validation {
            message: msg.into(),
            details,
        }
    }

    pub fn authentication() -> Self {
        Self::Authentication {
            message: "Missing or invalid API key".to_string(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Only produced by rate limiting in front of the proxy; kept so the
    /// 429 mapping is part of the taxonomy.
    pub fn rate_limited() -> Self {
        Self::RateLimited {
            message: "Rate limit exceeded".to_string(),
        }
    }

    pub fn not_implemented(feature: impl Into<String>) -> Self {
        Self::NotImplemented {
            feature: feature.into(),
        }
    }

    pub fn upstream(status: u16, body: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            body: body.into(),
        }
    }

    pub fn timeout(after: std::time::Duration) -> Self {
        Self::Timeout {
            seconds: after.as_secs(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Authentication { .. } => StatusCode::UNAUTHORIZED,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::NotImplemented { .. } => StatusCode::NOT_IMPLEMENTED,
            Self::Upstream { status, .. } => match StatusCode::from_u16(*status) {
                Ok(code) if code.is_client_error() || code.is_server_error() => code,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::Http(e) if e.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
            Self::Http(_) => StatusCode::BAD_GATEWAY,
            Self::Config { .. } | Self::Io(_) | Self::Json(_) | Self::Toml(_) | Self::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Machine-readable code written as `error.type`.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "invalid_request_error",
            Self::Authentication { .. } => "authentication_error",
            Self::NotFound { .. } => "not_found_error",
            Self::RateLimited { .. } => "rate_limit_exceeded",
            Self::NotImplemented { .. } => "not_implemented",
            Self::Upstream { .. } | Self::Timeout { .. } | Self::Http(_) => "api_error",
            Self::Config { .. } | Self::Io(_) | Self::Json(_) | Self::Toml(_) | Self::Other(_) => {
                "server_error"
            }
        }
    }

    pub fn details(&self) -> Option<&Value> {
        match self {
            Self::Validation { details, .. } => details.as_ref(),
            _ => None,
        }
    }

    pub fn to_body(&self) -> Value {
        let mut error = json!({
            "message": self.to_string(),
            "type": self.code(),
        });
        if let Some(details) = self.details() {
            error["details"] = details.clone();
        }
        json!({ "error": error })
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.to_body())).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;
