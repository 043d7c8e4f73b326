//! Model alias registry.
//!
//! Maps stable, OpenAI-style model names onto the identifiers the upstream
//! service expects. Lookups are pure and total: a name the registry does not
//! know is passed through untouched so callers can address upstream models
//! directly.

use serde::{Deserialize, Serialize};

/// Capability category an alias belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelCategory {
    #[default]
    Chat,
    Image,
    Audio,
    Video,
}

impl ModelCategory {
    pub const ALL: [ModelCategory; 4] = [Self::Chat, Self::Image, Self::Audio, Self::Video];

    fn table(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Chat => CHAT_MODELS,
            Self::Image => IMAGE_MODELS,
            Self::Audio => AUDIO_MODELS,
            Self::Video => VIDEO_MODELS,
        }
    }
}

pub const CHAT_MODELS: &[(&str, &str)] = &[
    // Claude
    ("claude-3-5-haiku-20241022", "claude-3-5-haiku-20241022"),
    ("claude-3-5-sonnet-20241022", "claude-3-5-sonnet-20241022"),
    ("claude-3-opus-20240229", "claude-3-opus-20240229"),
    ("claude-haiku", "claude-3-5-haiku-20241022"),
    ("claude-sonnet", "claude-3-5-sonnet-20241022"),
    ("claude-opus", "claude-3-opus-20240229"),
    // GPT
    ("gpt-4o", "gpt-4o"),
    ("gpt-4o-mini", "gpt-4o-mini"),
    ("gpt-4-turbo", "gpt-4-turbo"),
    ("gpt-4", "gpt-4"),
    ("gpt-3.5-turbo", "gpt-3.5-turbo"),
    ("o1", "o1"),
    ("o1-mini", "o1-mini"),
    ("o1-preview", "o1-preview"),
    ("o3-mini", "o3-mini"),
    // Gemini
    ("gemini-pro", "gemini-1.5-pro"),
    ("gemini-1.5-pro", "gemini-1.5-pro"),
    ("gemini-1.5-flash", "gemini-1.5-flash"),
    ("gemini-2.0-flash", "gemini-2.0-flash-exp"),
    ("gemini-2.5-flash", "gemini-2.5-flash-preview-04-17"),
    ("gemini-2.5-pro", "gemini-2.5-pro-exp-03-25"),
    // Mistral
    ("mistral-large", "mistral-large-latest"),
    ("mistral-medium", "mistral-medium-latest"),
    ("mistral-small", "mistral-small-latest"),
    ("codestral", "codestral-latest"),
    ("pixtral-large", "pixtral-large-latest"),
    // Llama
    ("llama-3.1-405b", "llama-3.1-405b-instruct"),
    ("llama-3.1-70b", "llama-3.1-70b-instruct"),
    ("llama-3.1-8b", "llama-3.1-8b-instruct"),
    ("llama-3.3-70b", "llama-3.3-70b-instruct"),
    // DeepSeek
    ("deepseek-chat", "deepseek-chat"),
    ("deepseek-reasoner", "deepseek-reasoner"),
    ("deepseek-coder", "deepseek-coder"),
    // Qwen
    ("qwen-max", "qwen-max"),
    ("qwen-plus", "qwen-plus"),
    ("qwen-turbo", "qwen-turbo"),
    ("qwen-coder", "qwen-coder-turbo"),
    // Grok
    ("grok-2", "grok-2-latest"),
    ("grok-beta", "grok-beta"),
    // Perplexity
    ("perplexity-online", "llama-3.1-sonar-huge-128k-online"),
    ("perplexity-sonar", "llama-3.1-sonar-large-128k-online"),
];

pub const IMAGE_MODELS: &[(&str, &str)] = &[
    ("dall-e-3", "dall-e-3"),
    ("dall-e-2", "dall-e-2"),
    ("flux-pro", "black-forest-labs/flux-pro"),
    ("flux-pro-1.1", "black-forest-labs/flux-1.1-pro"),
    ("flux-pro-ultra", "black-forest-labs/flux-1.1-pro-ultra"),
    ("flux-dev", "black-forest-labs/flux-dev"),
    ("flux-schnell", "black-forest-labs/flux-schnell"),
    ("sdxl", "stability-ai/stable-diffusion-xl-1024-v1-0"),
    ("sd-core", "stability-ai/stable-image-core"),
    ("sd-ultra", "stability-ai/stable-image-ultra"),
    ("leonardo-phoenix", "leonardo-ai/phoenix"),
    ("leonardo-lightning", "leonardo-ai/lightning-xl"),
    ("leonardo-anime", "leonardo-ai/anime-xl"),
    ("leonardo-diffusion", "leonardo-ai/diffusion-xl"),
    ("leonardo-kino", "leonardo-ai/kino-xl"),
    ("leonardo-vision", "leonardo-ai/vision-xl"),
    ("magic-art", "magic-art"),
    ("magic-art-5.2", "magic-art-5.2"),
    ("magic-art-6.1", "magic-art-6.1"),
    ("magic-art-7.0", "magic-art-7.0"),
    ("recraft", "recraft-v3"),
    ("gpt-image-1", "gpt-image-1"),
    ("gpt-image-1-mini", "gpt-image-1-mini"),
    ("gemini-image", "gemini-2.0-flash-exp-image"),
    ("grok-image", "grok-2-image"),
    ("qwen-image", "qwen-vl-max"),
];

pub const AUDIO_MODELS: &[(&str, &str)] = &[
    // TTS
    ("tts-1", "tts-1"),
    ("tts-1-hd", "tts-1-hd"),
    ("elevenlabs", "elevenlabs-v1"),
    // STT
    ("whisper-1", "whisper-1"),
    ("whisper-large", "whisper-large-v3"),
];

pub const VIDEO_MODELS: &[(&str, &str)] = &[
    ("runway-gen3", "runway-gen3-turbo"),
    ("luma", "luma-dream-machine"),
    ("kling", "kling-v1"),
    ("minimax", "minimax-video-01"),
    ("haiper", "haiper-video-2"),
    ("pika", "pika-1.0"),
];

/// Map a public alias to its upstream id, passing unknown names through.
#[must_use]
pub fn resolve(alias: &str, category: ModelCategory) -> &str {
    category
        .table()
        .iter()
        .find(|(name, _)| *name == alias)
        .map_or(alias, |(_, upstream)| *upstream)
}

#[must_use]
pub fn resolve_chat(alias: &str) -> &str {
    resolve(alias, ModelCategory::default())
}

/// Look an alias up across every category, in category order.
#[must_use]
pub fn find(alias: &str) -> Option<(ModelCategory, &'static str)> {
    ModelCategory::ALL.into_iter().find_map(|category| {
        category
            .table()
            .iter()
            .find(|(name, _)| *name == alias)
            .map(|(_, upstream)| (category, *upstream))
    })
}

/// All known aliases, grouped by category, in table order.
#[must_use]
pub fn catalog() -> Vec<(ModelCategory, Vec<&'static str>)> {
    ModelCategory::ALL
        .into_iter()
        .map(|category| {
            let aliases = category.table().iter().map(|(name, _)| *name).collect();
            (category, aliases)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_chat_aliases() {
        assert_eq!(resolve("claude-haiku", ModelCategory::Chat), "claude-3-5-haiku-20241022");
        assert_eq!(resolve("gpt-4o", ModelCategory::Chat), "gpt-4o");
        assert_eq!(resolve("gemini-pro", ModelCategory::Chat), "gemini-1.5-pro");
    }

    #[test]
    fn test_resolve_image_aliases() {
        assert_eq!(resolve("dall-e-3", ModelCategory::Image), "dall-e-3");
        assert_eq!(resolve("flux-pro", ModelCategory::Image), "black-forest-labs/flux-pro");
    }

    #[test]
    fn test_every_known_alias_resolves_to_its_table_entry() {
        for category in ModelCategory::ALL {
            for (alias, upstream) in category.table() {
                assert_eq!(resolve(alias, category), *upstream);
            }
        }
    }

    #[test]
    fn test_unknown_alias_passes_through() {
        for category in ModelCategory::ALL {
            assert_eq!(resolve("unknown-model", category), "unknown-model");
            assert_eq!(resolve("", category), "");
        }
    }

    #[test]
    fn test_category_is_respected() {
        // "flux-pro" is an image alias; as a chat alias it is unknown.
        assert_eq!(resolve("flux-pro", ModelCategory::Chat), "flux-pro");
        assert_eq!(resolve("whisper-large", ModelCategory::Audio), "whisper-large-v3");
        assert_eq!(resolve("kling", ModelCategory::Video), "kling-v1");
    }

    #[test]
    fn test_default_category_is_chat() {
        assert_eq!(ModelCategory::default(), ModelCategory::Chat);
        assert_eq!(resolve_chat("claude-haiku"), "claude-3-5-haiku-20241022");
    }

    #[test]
    fn test_find_and_catalog() {
        assert_eq!(find("luma"), Some((ModelCategory::Video, "luma-dream-machine")));
        assert_eq!(find("nope"), None);

        let catalog = catalog();
        assert_eq!(catalog.len(), 4);
        assert_eq!(catalog[0].0, ModelCategory::Chat);
        assert_eq!(catalog[0].1.len(), CHAT_MODELS.len());
        assert!(catalog[1].1.contains(&"flux-schnell"));
    }
}
