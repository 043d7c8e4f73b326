//! Extract OpenAI-shaped results from upstream feature envelopes.
//!
//! Extraction never fails on an unexpected envelope shape. The callers decide
//! whether an empty result is a contract violation (see [`audio_url`]).

use super::openai_types::{
    ChatCompletionResponse, ChatUsage, Choice, ChoiceMessage, ImageData, ImagesResponse,
};
use super::upstream_types::FeatureResponse;
use crate::error::{ProxyError, Result};

/// `chatcmpl-` followed by a dash-free v4 UUID.
pub fn completion_id() -> String {
    format!("chatcmpl-{}", uuid::Uuid::new_v4().simple())
}

pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Build a non-streaming chat completion. `model` is the alias the caller asked for.
pub fn chat_completion(response: &FeatureResponse, model: &str) -> ChatCompletionResponse {
    ChatCompletionResponse {
        id: completion_id(),
        object: "chat.completion".to_string(),
        created: unix_now(),
        model: model.to_string(),
        choices: vec![Choice {
            index: 0,
            message: ChoiceMessage {
                role: "assistant".to_string(),
                content: response.text(),
            },
            finish_reason: Some("stop".to_string()),
        }],
        usage: ChatUsage::default(),
    }
}

/// Turn an upstream asset identifier into an absolute URL.
pub fn asset_url(value: &str, asset_base: &str) -> String {
    if value.starts_with("http://") || value.starts_with("https://") {
        return value.to_string();
    }
    format!(
        "{}/{}",
        asset_base.trim_end_matches('/'),
        value.trim_start_matches('/')
    )
}

pub fn asset_urls(response: &FeatureResponse, asset_base: &str) -> Vec<String> {
    response
        .values()
        .iter()
        .filter(|v| !v.is_empty())
        .map(|v| asset_url(v, asset_base))
        .collect()
}

/// Image results are always returned in URL form; `b64_json` stays absent.
pub fn images_response(response: &FeatureResponse, asset_base: &str) -> ImagesResponse {
    ImagesResponse {
        created: unix_now(),
        data: asset_urls(response, asset_base)
            .into_iter()
            .map(|url| ImageData {
                url: Some(url),
                b64_json: None,
            })
            .collect(),
    }
}

/// First audio URL in the envelope. A TTS call that produced nothing is an error.
pub fn audio_url(response: &FeatureResponse, asset_base: &str) -> Result<String> {
    asset_urls(response, asset_base)
        .into_iter()
        .next()
        .ok_or_else(|| ProxyError::other("No audio generated"))
}

pub fn transcription_text(response: &FeatureResponse) -> String {
    response.text()
}
