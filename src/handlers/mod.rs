//! Route handlers, one module per capability.

pub mod audio;
pub mod chat;
pub mod images;
pub mod models;
pub mod native;

use crate::error::{ProxyError, Result};
use crate::logging::LogLevel;
use crate::server::AppState;

use axum::response::Response;
use serde_json::json;
use std::future::Future;

/// Await a handler body, recording a failure in the event log before the
/// error becomes the response.
pub(crate) async fn logged<F>(state: &AppState, component: &'static str, body: F) -> Result<Response>
where
    F: Future<Output = Result<Response>>,
{
    let result = body.await;
    if let Err(ref err) = result {
        log_failure(state, component, err);
    }
    result
}

fn log_failure(state: &AppState, component: &str, err: &ProxyError) {
    let status = err.status();
    let level = if status.is_server_error() {
        LogLevel::Error
    } else {
        LogLevel::Warn
    };
    state.logger.log_with_context(
        level,
        component,
        err.to_string(),
        json!({ "status": status.as_u16(), "type": err.code() }),
    );
}

/// A file part received in a multipart body.
pub(crate) struct Upload {
    pub data: bytes::Bytes,
    pub filename: String,
    pub content_type: Option<String>,
}

/// Split a multipart body into its first file part (named one of
/// `file_fields`) and the remaining text fields.
pub(crate) async fn read_multipart(
    mut multipart: axum::extract::Multipart,
    file_fields: &[&str],
) -> Result<(serde_json::Map<String, serde_json::Value>, Option<Upload>)> {
    let mut fields = serde_json::Map::new();
    let mut upload = None;

    while let Some(field) = multipart.next_field().await.map_err(invalid_multipart)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if upload.is_none() && file_fields.contains(&name.as_str()) {
            let filename = field.file_name().unwrap_or("upload").to_string();
            let content_type = field.content_type().map(str::to_string);
            let data = field.bytes().await.map_err(invalid_multipart)?;
            upload = Some(Upload {
                data,
                filename,
                content_type,
            });
        } else {
            let text = field.text().await.map_err(invalid_multipart)?;
            fields.insert(name, serde_json::Value::String(text));
        }
    }

    Ok((fields, upload))
}

fn invalid_multipart(err: axum::extract::multipart::MultipartError) -> ProxyError {
    ProxyError::validation(format!("Invalid multipart body: {}", err.body_text()), None)
}

pub(crate) fn is_multipart(headers: &axum::http::HeaderMap) -> bool {
    headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"))
}
