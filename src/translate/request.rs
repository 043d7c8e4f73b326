//! Translate validated requests into upstream feature envelopes.
//!
//! Every function here is pure. Optional fields the caller left out are left
//! out of the prompt object too, so the upstream applies its own defaults.

use serde_json::json;

use super::native_types::{
    NativeBackgroundReplace, NativeChat, NativeImageGenerate, NativeImageInput,
    NativeImageToVideo, NativeImageUpscale, NativeImageVariation, NativeObjectReplace,
    NativeSpeechToText, NativeTextToSpeech, NativeVideoGenerate,
};
use super::openai_types::{
    ChatCompletionRequest, ChatMessage, ContentPart, ImageGenerationRequest,
    ImageVariationRequest, MessageContent, Role, SpeechRequest,
};
use super::upstream_types::{Extras, FeatureRequest, FeatureType, PromptObject};
use crate::models::{self, ModelCategory};

/// Upstream language used for `/v1/audio/translations`.
pub const TRANSLATION_LANGUAGE: &str = "en";

/// Prompt and image references derived from a chat transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatPrompt {
    pub prompt: String,
    pub images: Vec<String>,
}

/// Flatten a conversation into a single upstream prompt.
///
/// Every turn except the last becomes a `"<Role>: <text>\n\n"` line of
/// context. Only turns with plain string content contribute; structured
/// content in earlier turns is dropped. The most recent user message is the
/// prompt proper.
pub fn flatten_messages(messages: &[ChatMessage]) -> ChatPrompt {
    let last_prompt = messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| content_text(&m.content))
        .unwrap_or_default();

    let history = messages.split_last().map_or(&[][..], |(_, rest)| rest);
    let context: String = history
        .iter()
        .filter_map(|m| match &m.content {
            MessageContent::Text(text) => Some(format!("{}: {}\n\n", m.role.label(), text)),
            MessageContent::Parts(_) => None,
        })
        .collect();

    let prompt = if context.is_empty() {
        last_prompt
    } else {
        format!("{context}User: {last_prompt}")
    };

    ChatPrompt {
        prompt,
        images: image_urls(messages),
    }
}

fn content_text(content: &MessageContent) -> String {
    match content {
        MessageContent::Text(text) => text.clone(),
        MessageContent::Parts(parts) => parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text { text } => Some(text.as_str()),
                ContentPart::ImageUrl { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// Image references from user turns, in transcript order.
fn image_urls(messages: &[ChatMessage]) -> Vec<String> {
    messages
        .iter()
        .filter(|m| m.role == Role::User)
        .filter_map(|m| match &m.content {
            MessageContent::Parts(parts) => Some(parts),
            MessageContent::Text(_) => None,
        })
        .flatten()
        .filter_map(|p| match p {
            ContentPart::ImageUrl { image_url } => Some(image_url.url.clone()),
            ContentPart::Text { .. } => None,
        })
        .collect()
}

pub fn chat_to_feature(req: &ChatCompletionRequest) -> FeatureRequest {
    let ChatPrompt { prompt, images } = flatten_messages(&req.messages);
    let model = models::resolve(&req.model, ModelCategory::Chat);

    let mut prompt_object = PromptObject::new()
        .with("prompt", prompt)
        .with("isMixed", false)
        .with("webSearch", false);

    let feature_type = if images.is_empty() {
        FeatureType::ChatWithAi
    } else {
        prompt_object = prompt_object.with("imageList", images);
        FeatureType::ChatWithImage
    };

    FeatureRequest::new(feature_type, model, prompt_object)
}

pub fn native_chat(req: &NativeChat) -> FeatureRequest {
    let prompt_object = PromptObject::new()
        .with("prompt", req.prompt.as_str())
        .with("isMixed", req.is_mixed.unwrap_or(false))
        .with("webSearch", req.web_search.unwrap_or(false))
        .with("numOfSite", req.num_of_site.unwrap_or(1))
        .with("maxWord", req.max_word.unwrap_or(500));

    FeatureRequest::new(
        FeatureType::ChatWithAi,
        models::resolve(&req.model, ModelCategory::Chat),
        prompt_object,
    )
    .with_conversation(req.conversation_id.clone())
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

/// Reduce a `width × height` pair to its simplest ratio, e.g. 1792×1024 → `7:4`.
pub fn calculate_aspect_ratio(width: u32, height: u32) -> String {
    let divisor = gcd(width, height).max(1);
    format!("{}:{}", width / divisor, height / divisor)
}

pub fn image_generation_to_feature(req: &ImageGenerationRequest) -> FeatureRequest {
    let (width, height) = req.size.dimensions();

    let mut extras = Extras::new();
    extras.insert("quality".to_string(), json!(req.quality));
    extras.insert("style".to_string(), json!(req.style));

    let native = NativeImageGenerate {
        model: req.model.clone(),
        prompt: req.prompt.clone(),
        num_outputs: Some(req.n),
        aspect_ratio: Some(calculate_aspect_ratio(width, height)),
        output_format: Some("webp".to_string()),
        extra: extras,
    };
    generate_image(&native)
}

pub fn generate_image(req: &NativeImageGenerate) -> FeatureRequest {
    let prompt_object = PromptObject::new()
        .with("prompt", req.prompt.as_str())
        .with("num_outputs", req.num_outputs.unwrap_or(1))
        .with("aspect_ratio", req.aspect_ratio.as_deref().unwrap_or("1:1"))
        .with("output_format", req.output_format.as_deref().unwrap_or("webp"))
        .merge(&req.extra);

    FeatureRequest::new(
        FeatureType::ImageGenerator,
        models::resolve(&req.model, ModelCategory::Image),
        prompt_object,
    )
}

pub fn image_variation_to_feature(req: &ImageVariationRequest) -> FeatureRequest {
    let native = NativeImageVariation {
        model: req.model.clone(),
        image_url: req.image.clone(),
        mode: Some("fast".to_string()),
        n: Some(req.n),
        aspect_width: None,
        aspect_height: None,
        maintain_moderation: None,
        extra: Extras::new(),
    };
    image_variation(&native)
}

pub fn image_variation(req: &NativeImageVariation) -> FeatureRequest {
    let prompt_object = PromptObject::new()
        .with("imageUrl", req.image_url.as_str())
        .with("mode", req.mode.as_deref().unwrap_or("fast"))
        .with("n", req.n.unwrap_or(4))
        .with("aspect_width", req.aspect_width.unwrap_or(1))
        .with("aspect_height", req.aspect_height.unwrap_or(1))
        .with("maintainModeration", req.maintain_moderation.unwrap_or(true))
        .merge(&req.extra);

    FeatureRequest::new(
        FeatureType::ImageVariator,
        models::resolve(&req.model, ModelCategory::Image),
        prompt_object,
    )
}

pub fn upscale_image(req: &NativeImageUpscale) -> FeatureRequest {
    let prompt_object = PromptObject::new()
        .with("imageUrl", req.image_url.as_str())
        .with("scale", req.scale.unwrap_or(2))
        .merge(&req.extra);

    FeatureRequest::new(
        FeatureType::ImageUpscaler,
        models::resolve(&req.model, ModelCategory::Image),
        prompt_object,
    )
}

/// Features that take nothing but an image: background removal, text
/// removal and image-to-prompt.
pub fn image_only(feature_type: FeatureType, req: &NativeImageInput) -> FeatureRequest {
    let prompt_object = PromptObject::new()
        .with("imageUrl", req.image_url.as_str())
        .merge(&req.extra);

    FeatureRequest::new(
        feature_type,
        models::resolve(&req.model, ModelCategory::Image),
        prompt_object,
    )
}

pub fn replace_background(req: &NativeBackgroundReplace) -> FeatureRequest {
    let prompt_object = PromptObject::new()
        .with("imageUrl", req.image_url.as_str())
        .with("backgroundPrompt", req.new_background.as_str())
        .merge(&req.extra);

    FeatureRequest::new(
        FeatureType::BackgroundReplacer,
        models::resolve(&req.model, ModelCategory::Image),
        prompt_object,
    )
}

pub fn replace_object(req: &NativeObjectReplace) -> FeatureRequest {
    let prompt_object = PromptObject::new()
        .with("imageUrl", req.image_url.as_str())
        .with("searchPrompt", req.search_prompt.as_str())
        .with("replacePrompt", req.replace_prompt.as_str())
        .merge(&req.extra);

    FeatureRequest::new(
        FeatureType::ImageObjectReplacer,
        models::resolve(&req.model, ModelCategory::Image),
        prompt_object,
    )
}

// ---------------------------------------------------------------------------
// Audio
// ---------------------------------------------------------------------------

pub fn speech_to_feature(req: &SpeechRequest) -> FeatureRequest {
    let mut extras = Extras::new();
    extras.insert("format".to_string(), json!(req.response_format.as_str()));

    text_to_speech(&NativeTextToSpeech {
        model: req.model.clone(),
        text: req.input.clone(),
        voice: Some(req.voice.as_str().to_string()),
        extra: extras,
    })
}

pub fn text_to_speech(req: &NativeTextToSpeech) -> FeatureRequest {
    let prompt_object = PromptObject::new()
        .with("text", req.text.as_str())
        .with_opt("voice", req.voice.as_deref())
        .merge(&req.extra);

    FeatureRequest::new(
        FeatureType::TextToSpeech,
        models::resolve(&req.model, ModelCategory::Audio),
        prompt_object,
    )
}

/// Transcription of an already-hosted audio file.
pub fn transcription_to_feature(model: &str, audio_url: &str, language: Option<&str>) -> FeatureRequest {
    speech_to_text(&NativeSpeechToText {
        model: model.to_string(),
        audio_url: audio_url.to_string(),
        language: language.map(str::to_string),
        extra: Extras::new(),
    })
}

pub fn speech_to_text(req: &NativeSpeechToText) -> FeatureRequest {
    let prompt_object = PromptObject::new()
        .with("audioUrl", req.audio_url.as_str())
        .with_opt("language", req.language.as_deref())
        .merge(&req.extra);

    FeatureRequest::new(
        FeatureType::SpeechToText,
        models::resolve(&req.model, ModelCategory::Audio),
        prompt_object,
    )
}

// ---------------------------------------------------------------------------
// Video
// ---------------------------------------------------------------------------

pub fn generate_video(req: &NativeVideoGenerate) -> FeatureRequest {
    let prompt_object = PromptObject::new()
        .with("prompt", req.prompt.as_str())
        .with_opt("duration", req.duration)
        .with_opt("aspectRatio", req.aspect_ratio.as_deref())
        .merge(&req.extra);

    FeatureRequest::new(
        FeatureType::VideoGenerator,
        models::resolve(&req.model, ModelCategory::Video),
        prompt_object,
    )
}

pub fn image_to_video(req: &NativeImageToVideo) -> FeatureRequest {
    let prompt_object = PromptObject::new()
        .with("imageUrl", req.image_url.as_str())
        .with_opt("motion", req.motion.as_deref())
        .with_opt("duration", req.duration)
        .merge(&req.extra);

    FeatureRequest::new(
        FeatureType::ImageToVideo,
        models::resolve(&req.model, ModelCategory::Video),
        prompt_object,
    )
}
