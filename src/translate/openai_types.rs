//! Type definitions for the OpenAI-compatible surface.
//!
//! Inbound request types carry their schema rules as `validator` attributes;
//! [`crate::schemas`] runs them. Outbound types mirror the OpenAI response
//! objects closely enough for stock OpenAI clients to parse them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::schemas::{validate_content, validate_size_for_variation};

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ChatCompletionRequest {
    #[validate(length(min = 1))]
    pub model: String,
    #[validate(length(min = 1), nested)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub stream: bool,
    #[validate(range(min = 0.0, max = 2.0))]
    pub temperature: Option<f64>,
    #[validate(range(min = 1))]
    pub max_tokens: Option<u32>,
    #[validate(range(min = 0.0, max = 1.0))]
    pub top_p: Option<f64>,
    #[validate(range(min = -2.0, max = 2.0))]
    pub frequency_penalty: Option<f64>,
    #[validate(range(min = -2.0, max = 2.0))]
    pub presence_penalty: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Label used when a turn is flattened into the prompt context.
    pub fn label(self) -> &'static str {
        match self {
            Self::System => "System",
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ChatMessage {
    pub role: Role,
    #[validate(custom(function = "validate_content"))]
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: MessageContent::Text(text.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrlDetail },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageUrlDetail {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: ChatUsage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub index: u32,
    pub message: ChoiceMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceMessage {
    pub role: String,
    pub content: String,
}

/// The upstream reports no token counts, so these stay zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

// ---------------------------------------------------------------------------
// Streaming chunk types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: ChunkDelta,
    /// Serialized as `null` until the terminal chunk.
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImageSize {
    #[serde(rename = "256x256")]
    S256,
    #[serde(rename = "512x512")]
    S512,
    #[default]
    #[serde(rename = "1024x1024")]
    S1024,
    #[serde(rename = "1792x1024")]
    Landscape,
    #[serde(rename = "1024x1792")]
    Portrait,
}

impl ImageSize {
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            Self::S256 => (256, 256),
            Self::S512 => (512, 512),
            Self::S1024 => (1024, 1024),
            Self::Landscape => (1792, 1024),
            Self::Portrait => (1024, 1792),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageQuality {
    #[default]
    Standard,
    Hd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageStyle {
    #[default]
    Vivid,
    Natural,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageResponseFormat {
    #[default]
    Url,
    B64Json,
}

fn default_image_model() -> String {
    "dall-e-3".to_string()
}

fn default_variation_model() -> String {
    "dall-e-2".to_string()
}

fn default_n() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ImageGenerationRequest {
    #[serde(default = "default_image_model")]
    pub model: String,
    #[validate(length(min = 1, max = 4000))]
    pub prompt: String,
    #[serde(default = "default_n")]
    #[validate(range(min = 1, max = 10))]
    pub n: u32,
    #[serde(default)]
    pub size: ImageSize,
    #[serde(default)]
    pub quality: ImageQuality,
    #[serde(default)]
    pub style: ImageStyle,
    #[serde(default)]
    pub response_format: ImageResponseFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ImageVariationRequest {
    #[validate(length(min = 1))]
    pub image: String,
    #[serde(default = "default_variation_model")]
    pub model: String,
    #[serde(default = "default_n")]
    #[validate(range(min = 1, max = 10))]
    pub n: u32,
    #[serde(default)]
    #[validate(custom(function = "validate_size_for_variation"))]
    pub size: ImageSize,
    #[serde(default)]
    pub response_format: ImageResponseFormat,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub b64_json: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagesResponse {
    pub created: i64,
    pub data: Vec<ImageData>,
}

// ---------------------------------------------------------------------------
// Audio
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Voice {
    #[default]
    Alloy,
    Echo,
    Fable,
    Onyx,
    Nova,
    Shimmer,
}

impl Voice {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Alloy => "alloy",
            Self::Echo => "echo",
            Self::Fable => "fable",
            Self::Onyx => "onyx",
            Self::Nova => "nova",
            Self::Shimmer => "shimmer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeechFormat {
    #[default]
    Mp3,
    Opus,
    Aac,
    Flac,
    Wav,
    Pcm,
}

impl SpeechFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Opus => "opus",
            Self::Aac => "aac",
            Self::Flac => "flac",
            Self::Wav => "wav",
            Self::Pcm => "pcm",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Mp3 => "audio/mpeg",
            Self::Opus => "audio/opus",
            Self::Aac => "audio/aac",
            Self::Flac => "audio/flac",
            Self::Wav => "audio/wav",
            Self::Pcm => "audio/pcm",
        }
    }
}

fn default_speech_model() -> String {
    "tts-1".to_string()
}

fn default_speed() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SpeechRequest {
    #[serde(default = "default_speech_model")]
    pub model: String,
    #[validate(length(min = 1, max = 4096))]
    pub input: String,
    #[serde(default)]
    pub voice: Voice,
    #[serde(default)]
    pub response_format: SpeechFormat,
    #[serde(default = "default_speed")]
    #[validate(range(min = 0.25, max = 4.0))]
    pub speed: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptFormat {
    #[default]
    Json,
    Text,
    Srt,
    Vtt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslationFormat {
    #[default]
    Json,
    Text,
}

fn default_whisper_model() -> String {
    "whisper-1".to_string()
}

/// `file` is a URL in JSON bodies; multipart bodies carry the bytes instead
/// and leave it unset.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TranscriptionRequest {
    #[validate(length(min = 1))]
    pub file: Option<String>,
    #[serde(default = "default_whisper_model")]
    pub model: String,
    #[validate(length(equal = 2))]
    pub language: Option<String>,
    pub prompt: Option<String>,
    #[serde(default)]
    pub response_format: TranscriptFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TranslationRequest {
    #[validate(length(min = 1))]
    pub file: Option<String>,
    #[serde(default = "default_whisper_model")]
    pub model: String,
    pub prompt: Option<String>,
    #[serde(default)]
    pub response_format: TranslationFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionResponse {
    pub text: String,
}

// ---------------------------------------------------------------------------
// Models
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelObject {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub owned_by: String,
    pub permission: Vec<Value>,
    pub root: String,
    pub parent: Option<String>,
}

impl ModelObject {
    pub fn new(id: &str, created: i64) -> Self {
        Self {
            id: id.to_string(),
            object: "model".to_string(),
            created,
            owned_by: "1min-proxy".to_string(),
            permission: Vec::new(),
            root: id.to_string(),
            parent: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelList {
    pub object: String,
    pub data: Vec<ModelObject>,
}
