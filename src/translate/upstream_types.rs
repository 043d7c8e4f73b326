//! Type definitions for the upstream aggregation API.
//!
//! Requests are a single feature envelope (`type`, `model`, `promptObject`).
//! Responses are loosely typed: the useful payload lives in one of several
//! places depending on feature and API version, so [`FeatureResponse`]
//! classifies the raw JSON once and extraction pattern-matches on the result.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Open-ended option bag merged into a prompt object after the named fields.
pub type Extras = Map<String, Value>;

// ---------------------------------------------------------------------------
// Feature kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FeatureType {
    ChatWithAi,
    ChatWithImage,
    ChatWithPdf,
    ChatWithYoutubeVideo,
    ImageGenerator,
    ImageVariator,
    ImageUpscaler,
    ImageToPrompt,
    BackgroundRemover,
    BackgroundReplacer,
    TextRemover,
    ImageObjectReplacer,
    ImageTextEditor,
    TextToSpeech,
    SpeechToText,
    VideoGenerator,
    ImageToVideo,
    /// A feature kind this crate has no name for, sent verbatim.
    Custom(String),
}

impl FeatureType {
    pub const KNOWN: [FeatureType; 17] = [
        Self::ChatWithAi,
        Self::ChatWithImage,
        Self::ChatWithPdf,
        Self::ChatWithYoutubeVideo,
        Self::ImageGenerator,
        Self::ImageVariator,
        Self::ImageUpscaler,
        Self::ImageToPrompt,
        Self::BackgroundRemover,
        Self::BackgroundReplacer,
        Self::TextRemover,
        Self::ImageObjectReplacer,
        Self::ImageTextEditor,
        Self::TextToSpeech,
        Self::SpeechToText,
        Self::VideoGenerator,
        Self::ImageToVideo,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Self::ChatWithAi => "CHAT_WITH_AI",
            Self::ChatWithImage => "CHAT_WITH_IMAGE",
            Self::ChatWithPdf => "CHAT_WITH_PDF",
            Self::ChatWithYoutubeVideo => "CHAT_WITH_YOUTUBE_VIDEO",
            Self::ImageGenerator => "IMAGE_GENERATOR",
            Self::ImageVariator => "IMAGE_VARIATOR",
            Self::ImageUpscaler => "IMAGE_UPSCALER",
            Self::ImageToPrompt => "IMAGE_TO_PROMPT",
            Self::BackgroundRemover => "BACKGROUND_REMOVER",
            Self::BackgroundReplacer => "BACKGROUND_REPLACER",
            Self::TextRemover => "TEXT_REMOVER",
            Self::ImageObjectReplacer => "IMAGE_OBJECT_REPLACER",
            Self::ImageTextEditor => "IMAGE_TEXT_EDITOR",
            Self::TextToSpeech => "TEXT_TO_SPEECH",
            Self::SpeechToText => "SPEECH_TO_TEXT",
            Self::VideoGenerator => "VIDEO_GENERATOR",
            Self::ImageToVideo => "IMAGE_TO_VIDEO",
            Self::Custom(name) => name,
        }
    }

    pub fn from_name(name: &str) -> Self {
        Self::KNOWN
            .into_iter()
            .find(|known| known.as_str() == name)
            .unwrap_or_else(|| Self::Custom(name.to_string()))
    }

    /// Whether this is one of the conversation-capable chat kinds.
    pub fn is_chat(&self) -> bool {
        matches!(
            self,
            Self::ChatWithAi | Self::ChatWithImage | Self::ChatWithPdf | Self::ChatWithYoutubeVideo
        )
    }
}

impl FromStr for FeatureType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_name(s))
    }
}

impl fmt::Display for FeatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for FeatureType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FeatureType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_name(&raw))
    }
}

// ---------------------------------------------------------------------------
// Request envelope
// ---------------------------------------------------------------------------

/// Insertion-ordered key/value payload of a feature request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptObject(Map<String, Value>);

impl PromptObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// Insert only when a value was supplied, so upstream defaults stay in effect.
    pub fn with_opt<V: Into<Value>>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.with(key, v),
            None => self,
        }
    }

    /// Merge caller extras last; an extra with the same key replaces the named field.
    pub fn merge(mut self, extras: &Extras) -> Self {
        for (key, value) in extras {
            self.0.insert(key.clone(), value.clone());
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for PromptObject {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureRequest {
    #[serde(rename = "type")]
    pub feature_type: FeatureType,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    pub prompt_object: PromptObject,
}

impl FeatureRequest {
    pub fn new(feature_type: FeatureType, model: impl Into<String>, prompt_object: PromptObject) -> Self {
        Self {
            feature_type,
            model: model.into(),
            conversation_id: None,
            prompt_object,
        }
    }

    pub fn with_conversation(mut self, conversation_id: Option<String>) -> Self {
        self.conversation_id = conversation_id;
        self
    }
}

// ---------------------------------------------------------------------------
// Response envelope
// ---------------------------------------------------------------------------

/// `aiRecord.aiRecordDetail.resultObject` payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultObject {
    Scalar(Value),
    Sequence(Vec<Value>),
}

/// Upstream result classified by where its payload was found.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureResponse {
    Text(String),
    Result(Value),
    Response(Value),
    Content(Value),
    Record(ResultObject),
    Unrecognized(Value),
}

/// A field holding `null`, `false` or `""` counts as missing.
fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !matches!(v, Value::Null | Value::Bool(false)) && v.as_str() != Some(""))
}

impl FeatureResponse {
    /// Classify a raw envelope. Never fails: unknown shapes are kept whole.
    pub fn classify(raw: Value) -> Self {
        if let Value::String(text) = raw {
            return Self::Text(text);
        }
        if let Some(v) = present(raw.get("result")) {
            return Self::Result(v.clone());
        }
        if let Some(v) = present(raw.get("response")) {
            return Self::Response(v.clone());
        }
        if let Some(v) = present(raw.get("content")) {
            return Self::Content(v.clone());
        }
        let record = raw
            .get("aiRecord")
            .and_then(|r| r.get("aiRecordDetail"))
            .and_then(|d| present(d.get("resultObject")));
        match record {
            Some(Value::Array(items)) => Self::Record(ResultObject::Sequence(items.clone())),
            Some(v) => Self::Record(ResultObject::Scalar(v.clone())),
            None => Self::Unrecognized(raw),
        }
    }

    /// The payload as text: sequences are joined with no separator and an
    /// unrecognized envelope is serialized whole.
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Result(v) | Self::Response(v) | Self::Content(v) => value_text(v),
            Self::Record(ResultObject::Scalar(v)) => value_text(v),
            Self::Record(ResultObject::Sequence(items)) => items.iter().map(value_text).collect(),
            Self::Unrecognized(raw) => raw.to_string(),
        }
    }

    /// Individual payload values, e.g. one per generated asset. Arrays found
    /// at any recognized location expand element-wise.
    pub fn values(&self) -> Vec<String> {
        match self {
            Self::Text(text) => vec![text.clone()],
            Self::Result(v) | Self::Response(v) | Self::Content(v) => match v {
                Value::Array(items) => items.iter().map(value_text).collect(),
                other => vec![value_text(other)],
            },
            Self::Record(ResultObject::Scalar(v)) => vec![value_text(v)],
            Self::Record(ResultObject::Sequence(items)) => items.iter().map(value_text).collect(),
            Self::Unrecognized(_) => Vec::new(),
        }
    }
}

impl From<Value> for FeatureResponse {
    fn from(raw: Value) -> Self {
        Self::classify(raw)
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Probe an asset-upload envelope for a reference later features can use.
pub fn asset_reference(upload: &Value) -> Option<String> {
    let probe = |outer: &str, inner: &str| {
        upload
            .get(outer)
            .and_then(|o| o.get(inner))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    probe("fileContent", "path").or_else(|| probe("asset", "key"))
}
