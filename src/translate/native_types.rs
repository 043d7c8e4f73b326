//! Bodies accepted by the native `/api/*` convenience routes.
//!
//! Field names follow the upstream's camelCase convention. Every body carries
//! an `extra` bag that is merged into the prompt object last.

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::upstream_types::{Extras, FeatureType};
use crate::schemas::validate_chat_feature;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NativeChat {
    #[validate(length(min = 1))]
    pub model: String,
    #[validate(length(min = 1))]
    pub prompt: String,
    pub conversation_id: Option<String>,
    pub is_mixed: Option<bool>,
    pub web_search: Option<bool>,
    pub num_of_site: Option<u32>,
    pub max_word: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NativeImageGenerate {
    #[validate(length(min = 1))]
    pub model: String,
    #[validate(length(min = 1))]
    pub prompt: String,
    pub num_outputs: Option<u32>,
    pub aspect_ratio: Option<String>,
    pub output_format: Option<String>,
    #[serde(default)]
    pub extra: Extras,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NativeImageVariation {
    #[validate(length(min = 1))]
    pub model: String,
    #[validate(length(min = 1))]
    pub image_url: String,
    pub mode: Option<String>,
    pub n: Option<u32>,
    pub aspect_width: Option<u32>,
    pub aspect_height: Option<u32>,
    pub maintain_moderation: Option<bool>,
    #[serde(default)]
    pub extra: Extras,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NativeImageUpscale {
    #[validate(length(min = 1))]
    pub model: String,
    #[validate(length(min = 1))]
    pub image_url: String,
    pub scale: Option<u32>,
    #[serde(default)]
    pub extra: Extras,
}

/// Body for features that only need an image reference.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NativeImageInput {
    #[validate(length(min = 1))]
    pub model: String,
    #[validate(length(min = 1))]
    pub image_url: String,
    #[serde(default)]
    pub extra: Extras,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NativeBackgroundReplace {
    #[validate(length(min = 1))]
    pub model: String,
    #[validate(length(min = 1))]
    pub image_url: String,
    #[validate(length(min = 1))]
    pub new_background: String,
    #[serde(default)]
    pub extra: Extras,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NativeObjectReplace {
    #[validate(length(min = 1))]
    pub model: String,
    #[validate(length(min = 1))]
    pub image_url: String,
    #[validate(length(min = 1))]
    pub search_prompt: String,
    #[validate(length(min = 1))]
    pub replace_prompt: String,
    #[serde(default)]
    pub extra: Extras,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NativeTextToSpeech {
    #[validate(length(min = 1))]
    pub model: String,
    #[validate(length(min = 1))]
    pub text: String,
    pub voice: Option<String>,
    #[serde(default)]
    pub extra: Extras,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NativeSpeechToText {
    #[validate(length(min = 1))]
    pub model: String,
    #[validate(length(min = 1))]
    pub audio_url: String,
    pub language: Option<String>,
    #[serde(default)]
    pub extra: Extras,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NativeVideoGenerate {
    #[validate(length(min = 1))]
    pub model: String,
    #[validate(length(min = 1))]
    pub prompt: String,
    pub duration: Option<u32>,
    pub aspect_ratio: Option<String>,
    #[serde(default)]
    pub extra: Extras,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NativeImageToVideo {
    #[validate(length(min = 1))]
    pub model: String,
    #[validate(length(min = 1))]
    pub image_url: String,
    pub motion: Option<String>,
    pub duration: Option<u32>,
    #[serde(default)]
    pub extra: Extras,
}

/// `POST /api/conversations` body, forwarded as-is once validated.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ConversationParams {
    #[serde(rename = "type")]
    #[validate(custom(function = "validate_chat_feature"))]
    pub conversation_type: FeatureType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_list: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(url)]
    pub youtube_url: Option<String>,
}
