//! Native `/api/*` routes: thin, validated wrappers over upstream features.
//!
//! Responses are the upstream JSON, unmodified.

use super::{logged, read_multipart};
use crate::error::{ProxyError, Result};
use crate::logging::LogLevel;
use crate::relay;
use crate::schemas;
use crate::server::{ApiKey, AppState};
use crate::translate::native_types::{ConversationParams, NativeImageInput};
use crate::translate::request;
use crate::translate::upstream_types::{FeatureRequest, FeatureType};

use axum::body::Body;
use axum::extract::{Multipart, Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

type Shared = State<Arc<AppState>>;

/// Validate a native body, translate it and return the upstream result.
async fn run_feature<T, F>(state: &AppState, key: &ApiKey, body: &[u8], build: F) -> Result<Response>
where
    T: DeserializeOwned + Validate,
    F: FnOnce(&T) -> FeatureRequest,
{
    let req: T = schemas::parse_json(body)?;
    let feature = build(&req);
    state.logger.log_with_context(
        LogLevel::Info,
        "native",
        format!("Calling {}", feature.feature_type),
        json!({
            "model": feature.model,
            "conversation_id": feature.conversation_id,
        }),
    );
    let value = state.upstream(key).call_value(&feature).await?;
    Ok(Json(value).into_response())
}

// ---------------------------------------------------------------------------
// Assets
// ---------------------------------------------------------------------------

/// `POST /api/assets`, multipart with the file in an `asset` or `file` part.
pub async fn upload_asset(
    State(state): Shared,
    Extension(key): Extension<ApiKey>,
    multipart: Multipart,
) -> Result<Response> {
    logged(&state, "native:assets", async {
        let (_, upload) = read_multipart(multipart, &["asset", "file"]).await?;
        let upload = upload.ok_or_else(|| schemas::missing_field("asset"))?;

        state.logger.log_with_context(
            LogLevel::Info,
            "native:assets",
            "Uploading asset",
            json!({ "filename": upload.filename, "size": upload.data.len() }),
        );
        let value = state
            .upstream(&key)
            .upload_asset(upload.data, &upload.filename, upload.content_type.as_deref())
            .await?;
        Ok(Json(value).into_response())
    })
    .await
}

/// `GET /api/assets/:id`
pub async fn get_asset(
    State(state): Shared,
    Extension(key): Extension<ApiKey>,
    Path(id): Path<String>,
) -> Result<Response> {
    logged(&state, "native:assets", async {
        let value = state.upstream(&key).get_asset(&id).await?;
        Ok(Json(value).into_response())
    })
    .await
}

// ---------------------------------------------------------------------------
// Conversations
// ---------------------------------------------------------------------------

pub async fn create_conversation(
    State(state): Shared,
    Extension(key): Extension<ApiKey>,
    body: Bytes,
) -> Result<Response> {
    logged(&state, "native:conversations", async {
        let params: ConversationParams = schemas::parse_json(&body)?;
        let value = state.upstream(&key).create_conversation(&params).await?;
        Ok(Json(value).into_response())
    })
    .await
}

pub async fn list_conversations(
    State(state): Shared,
    Extension(key): Extension<ApiKey>,
) -> Result<Response> {
    logged(&state, "native:conversations", async {
        let value = state.upstream(&key).list_conversations().await?;
        Ok(Json(value).into_response())
    })
    .await
}

pub async fn get_conversation(
    State(state): Shared,
    Extension(key): Extension<ApiKey>,
    Path(id): Path<String>,
) -> Result<Response> {
    logged(&state, "native:conversations", async {
        let value = state.upstream(&key).get_conversation(&id).await?;
        Ok(Json(value).into_response())
    })
    .await
}

pub async fn delete_conversation(
    State(state): Shared,
    Extension(key): Extension<ApiKey>,
    Path(id): Path<String>,
) -> Result<Response> {
    logged(&state, "native:conversations", async {
        let value = state.upstream(&key).delete_conversation(&id).await?;
        Ok(Json(value).into_response())
    })
    .await
}

// ---------------------------------------------------------------------------
// Raw features
// ---------------------------------------------------------------------------

/// `POST /api/features`: the envelope is forwarded exactly as given.
pub async fn feature(
    State(state): Shared,
    Extension(key): Extension<ApiKey>,
    body: Bytes,
) -> Result<Response> {
    logged(&state, "native:features", async {
        let feature: FeatureRequest = schemas::parse_shape(&body)?;
        let value = state.upstream(&key).call_value(&feature).await?;
        Ok(Json(value).into_response())
    })
    .await
}

/// `POST /api/features/stream`: upstream bytes relayed unmodified.
pub async fn feature_stream(
    State(state): Shared,
    Extension(key): Extension<ApiKey>,
    body: Bytes,
) -> Result<Response> {
    logged(&state, "native:features", async {
        let feature: FeatureRequest = schemas::parse_shape(&body)?;
        let upstream = state.upstream(&key).open_stream(&feature).await?;
        let stream = relay::passthrough_stream(
            upstream,
            state.shutdown.child_token(),
            state.config.upstream.stream_idle_timeout(),
            state.logger.clone(),
        );

        Response::builder()
            .header(header::CONTENT_TYPE, "text/event-stream")
            .header(header::CACHE_CONTROL, "no-cache")
            .body(Body::from_stream(stream))
            .map_err(|e| ProxyError::other(format!("Failed to build stream response: {e}")))
    })
    .await
}

// ---------------------------------------------------------------------------
// Capability shortcuts
// ---------------------------------------------------------------------------

pub async fn chat(
    State(state): Shared,
    Extension(key): Extension<ApiKey>,
    body: Bytes,
) -> Result<Response> {
    logged(&state, "native:chat", run_feature(&state, &key, &body, request::native_chat)).await
}

pub async fn image_generate(
    State(state): Shared,
    Extension(key): Extension<ApiKey>,
    body: Bytes,
) -> Result<Response> {
    logged(&state, "native:image", run_feature(&state, &key, &body, request::generate_image)).await
}

pub async fn image_variation(
    State(state): Shared,
    Extension(key): Extension<ApiKey>,
    body: Bytes,
) -> Result<Response> {
    logged(&state, "native:image", run_feature(&state, &key, &body, request::image_variation)).await
}

pub async fn image_upscale(
    State(state): Shared,
    Extension(key): Extension<ApiKey>,
    body: Bytes,
) -> Result<Response> {
    logged(&state, "native:image", run_feature(&state, &key, &body, request::upscale_image)).await
}

pub async fn remove_background(
    State(state): Shared,
    Extension(key): Extension<ApiKey>,
    body: Bytes,
) -> Result<Response> {
    let build = |r: &NativeImageInput| request::image_only(FeatureType::BackgroundRemover, r);
    logged(&state, "native:image", run_feature(&state, &key, &body, build)).await
}

pub async fn replace_background(
    State(state): Shared,
    Extension(key): Extension<ApiKey>,
    body: Bytes,
) -> Result<Response> {
    logged(&state, "native:image", run_feature(&state, &key, &body, request::replace_background)).await
}

pub async fn remove_text(
    State(state): Shared,
    Extension(key): Extension<ApiKey>,
    body: Bytes,
) -> Result<Response> {
    let build = |r: &NativeImageInput| request::image_only(FeatureType::TextRemover, r);
    logged(&state, "native:image", run_feature(&state, &key, &body, build)).await
}

pub async fn object_replace(
    State(state): Shared,
    Extension(key): Extension<ApiKey>,
    body: Bytes,
) -> Result<Response> {
    logged(&state, "native:image", run_feature(&state, &key, &body, request::replace_object)).await
}

pub async fn image_to_prompt(
    State(state): Shared,
    Extension(key): Extension<ApiKey>,
    body: Bytes,
) -> Result<Response> {
    let build = |r: &NativeImageInput| request::image_only(FeatureType::ImageToPrompt, r);
    logged(&state, "native:image", run_feature(&state, &key, &body, build)).await
}

pub async fn text_to_speech(
    State(state): Shared,
    Extension(key): Extension<ApiKey>,
    body: Bytes,
) -> Result<Response> {
    logged(&state, "native:audio", run_feature(&state, &key, &body, request::text_to_speech)).await
}

pub async fn speech_to_text(
    State(state): Shared,
    Extension(key): Extension<ApiKey>,
    body: Bytes,
) -> Result<Response> {
    logged(&state, "native:audio", run_feature(&state, &key, &body, request::speech_to_text)).await
}

pub async fn video_generate(
    State(state): Shared,
    Extension(key): Extension<ApiKey>,
    body: Bytes,
) -> Result<Response> {
    logged(&state, "native:video", run_feature(&state, &key, &body, request::generate_video)).await
}

pub async fn image_to_video(
    State(state): Shared,
    Extension(key): Extension<ApiKey>,
    body: Bytes,
) -> Result<Response> {
    logged(&state, "native:video", run_feature(&state, &key, &body, request::image_to_video)).await
}
