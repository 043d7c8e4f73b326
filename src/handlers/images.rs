use super::logged;
use crate::error::{ProxyError, Result};
use crate::logging::LogLevel;
use crate::models::{self, ModelCategory};
use crate::schemas;
use crate::server::{ApiKey, AppState};
use crate::translate::openai_types::{
    ImageGenerationRequest, ImageResponseFormat, ImageVariationRequest,
};
use crate::translate::request::{image_generation_to_feature, image_variation_to_feature};
use crate::translate::response::images_response;
use crate::translate::upstream_types::FeatureRequest;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use bytes::Bytes;
use serde_json::json;
use std::sync::Arc;

/// `POST /v1/images/generations`
pub async fn generations(
    State(state): State<Arc<AppState>>,
    Extension(key): Extension<ApiKey>,
    body: Bytes,
) -> Result<Response> {
    logged(&state, "images", async {
        let req: ImageGenerationRequest = schemas::parse_json(&body)?;
        let feature = image_generation_to_feature(&req);
        run(&state, &key, &req.model, req.n, req.response_format, &feature).await
    })
    .await
}

/// `POST /v1/images/variations`
pub async fn variations(
    State(state): State<Arc<AppState>>,
    Extension(key): Extension<ApiKey>,
    body: Bytes,
) -> Result<Response> {
    logged(&state, "images", async {
        let req: ImageVariationRequest = schemas::parse_json(&body)?;
        let feature = image_variation_to_feature(&req);
        run(&state, &key, &req.model, req.n, req.response_format, &feature).await
    })
    .await
}

/// `POST /v1/images/edits`
pub async fn edits() -> ProxyError {
    ProxyError::not_implemented("Image edits")
}

async fn run(
    state: &AppState,
    key: &ApiKey,
    model: &str,
    n: u32,
    format: ImageResponseFormat,
    feature: &FeatureRequest,
) -> Result<Response> {
    state.logger.log_with_context(
        LogLevel::Info,
        "images",
        format!("Processing {}", feature.feature_type),
        json!({
            "model": model,
            "mapped_model": models::resolve(model, ModelCategory::Image),
            "n": n,
        }),
    );

    if format == ImageResponseFormat::B64Json {
        state.logger.warn(
            "images",
            "b64_json is not supported; returning image URLs instead",
        );
    }

    let response = state.upstream(key).call(feature).await?;
    Ok(Json(images_response(&response, state.asset_base_url())).into_response())
}
