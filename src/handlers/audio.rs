use super::{is_multipart, logged, read_multipart, Upload};
use crate::error::{ProxyError, Result};
use crate::logging::LogLevel;
use crate::models::{self, ModelCategory};
use crate::relay;
use crate::schemas;
use crate::server::{ApiKey, AppState};
use crate::translate::openai_types::{
    SpeechRequest, TranscriptFormat, TranscriptionRequest, TranscriptionResponse,
    TranslationFormat, TranslationRequest,
};
use crate::translate::request::{speech_to_feature, transcription_to_feature, TRANSLATION_LANGUAGE};
use crate::translate::response::{audio_url, transcription_text};
use crate::translate::upstream_types::asset_reference;

use axum::body::Body;
use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use validator::Validate;

/// `POST /v1/audio/speech`: synthesize, then stream the generated file back.
pub async fn speech(
    State(state): State<Arc<AppState>>,
    Extension(key): Extension<ApiKey>,
    body: Bytes,
) -> Result<Response> {
    logged(&state, "audio:speech", async {
        let req: SpeechRequest = schemas::parse_json(&body)?;
        state.logger.log_with_context(
            LogLevel::Info,
            "audio:speech",
            "Processing speech request",
            json!({
                "model": req.model,
                "mapped_model": models::resolve(&req.model, ModelCategory::Audio),
                "voice": req.voice.as_str(),
                "format": req.response_format.as_str(),
            }),
        );

        let client = state.upstream(&key);
        let response = client.call(&speech_to_feature(&req)).await?;
        let url = audio_url(&response, state.asset_base_url())?;

        let audio = client.fetch_asset(&url).await?;
        let stream = relay::passthrough_stream(
            audio.bytes_stream(),
            state.shutdown.child_token(),
            state.config.upstream.stream_idle_timeout(),
            state.logger.clone(),
        );

        Response::builder()
            .header(header::CONTENT_TYPE, req.response_format.content_type())
            .body(Body::from_stream(stream))
            .map_err(|e| ProxyError::other(format!("Failed to build audio response: {e}")))
    })
    .await
}

/// `POST /v1/audio/transcriptions`
pub async fn transcriptions(
    State(state): State<Arc<AppState>>,
    Extension(key): Extension<ApiKey>,
    request: Request,
) -> Result<Response> {
    logged(&state, "audio:transcription", async {
        let (req, upload): (TranscriptionRequest, _) = read_audio_request(request).await?;
        let text = transcribe(
            &state,
            &key,
            &req.model,
            req.file.as_deref(),
            upload,
            req.language.as_deref(),
        )
        .await?;

        Ok(match req.response_format {
            TranscriptFormat::Json => Json(TranscriptionResponse { text }).into_response(),
            TranscriptFormat::Text | TranscriptFormat::Srt | TranscriptFormat::Vtt => {
                text.into_response()
            }
        })
    })
    .await
}

/// `POST /v1/audio/translations`: a transcription with the language forced to English.
pub async fn translations(
    State(state): State<Arc<AppState>>,
    Extension(key): Extension<ApiKey>,
    request: Request,
) -> Result<Response> {
    logged(&state, "audio:translation", async {
        let (req, upload): (TranslationRequest, _) = read_audio_request(request).await?;
        let text = transcribe(
            &state,
            &key,
            &req.model,
            req.file.as_deref(),
            upload,
            Some(TRANSLATION_LANGUAGE),
        )
        .await?;

        Ok(match req.response_format {
            TranslationFormat::Json => Json(TranscriptionResponse { text }).into_response(),
            TranslationFormat::Text => text.into_response(),
        })
    })
    .await
}

/// Parse either a JSON body (`file` is a URL) or a multipart form carrying
/// the audio bytes in its `file` part.
async fn read_audio_request<T>(request: Request) -> Result<(T, Option<Upload>)>
where
    T: DeserializeOwned + Validate,
{
    if is_multipart(request.headers()) {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| ProxyError::validation(e.body_text(), None))?;
        let (fields, upload) = read_multipart(multipart, &["file"]).await?;
        let req = schemas::parse_value(Value::Object(fields))?;
        return Ok((req, upload));
    }

    let body = Bytes::from_request(request, &())
        .await
        .map_err(|e| ProxyError::validation(e.body_text(), None))?;
    Ok((schemas::parse_json(&body)?, None))
}

async fn transcribe(
    state: &AppState,
    key: &ApiKey,
    model: &str,
    file_url: Option<&str>,
    upload: Option<Upload>,
    language: Option<&str>,
) -> Result<String> {
    let client = state.upstream(key);

    let audio_url = match (file_url, upload) {
        (Some(url), _) => url.to_string(),
        (None, Some(upload)) => {
            let uploaded = client
                .upload_asset(upload.data, &upload.filename, upload.content_type.as_deref())
                .await?;
            asset_reference(&uploaded)
                .ok_or_else(|| ProxyError::other("Uploaded asset has no usable reference"))?
        }
        (None, None) => return Err(schemas::missing_field("file")),
    };

    state.logger.log_with_context(
        LogLevel::Info,
        "audio:transcription",
        "Processing transcription",
        json!({
            "model": model,
            "mapped_model": models::resolve(model, ModelCategory::Audio),
            "language": language,
        }),
    );

    let response = client
        .call(&transcription_to_feature(model, &audio_url, language))
        .await?;
    Ok(transcription_text(&response))
}
