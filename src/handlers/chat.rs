use super::logged;
use crate::error::Result;
use crate::logging::LogLevel;
use crate::models::{self, ModelCategory};
use crate::relay;
use crate::schemas;
use crate::server::{ApiKey, AppState};
use crate::translate::openai_types::ChatCompletionRequest;
use crate::translate::request::chat_to_feature;
use crate::translate::response::chat_completion;
use crate::translate::streaming::ChunkRelay;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use bytes::Bytes;
use futures::StreamExt;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;

/// `POST /v1/chat/completions`
pub async fn completions(
    State(state): State<Arc<AppState>>,
    Extension(key): Extension<ApiKey>,
    body: Bytes,
) -> Result<Response> {
    logged(&state, "chat", handle_completions(&state, &key, &body)).await
}

async fn handle_completions(state: &AppState, key: &ApiKey, body: &[u8]) -> Result<Response> {
    let req: ChatCompletionRequest = schemas::parse_json(body)?;
    let feature = chat_to_feature(&req);

    state.logger.log_with_context(
        LogLevel::Info,
        "chat",
        "Processing chat completion",
        json!({
            "model": req.model,
            "mapped_model": models::resolve(&req.model, ModelCategory::Chat),
            "stream": req.stream,
            "messages": req.messages.len(),
            "feature": feature.feature_type.as_str(),
            "images": feature.prompt_object.get("imageList").and_then(|l| l.as_array()).map_or(0, Vec::len),
        }),
    );

    let client = state.upstream(key);

    if req.stream {
        let upstream = client.open_stream(&feature).await?;
        let payloads = relay::relay_chat_stream(
            upstream,
            ChunkRelay::new(&req.model),
            state.shutdown.child_token(),
            state.config.upstream.stream_idle_timeout(),
            state.logger.clone(),
        );
        let events = payloads.map(|data| Ok::<_, Infallible>(Event::default().data(data)));
        return Ok(Sse::new(events)
            .keep_alive(KeepAlive::default())
            .into_response());
    }

    let response = client.call(&feature).await?;
    Ok(Json(chat_completion(&response, &req.model)).into_response())
}
