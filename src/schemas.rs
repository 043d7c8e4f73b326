//! Request schema validation.
//!
//! Bodies are parsed with `serde` and then checked with `validator`. Both
//! failure paths end up as [`ProxyError::Validation`] carrying structured,
//! field-level details so clients can see which field was rejected.

use std::borrow::Cow;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use validator::{Validate, ValidateUrl, ValidationError, ValidationErrors};

use crate::error::{ProxyError, Result};
use crate::translate::openai_types::{ContentPart, ImageSize, MessageContent};
use crate::translate::upstream_types::FeatureType;

const INVALID_BODY: &str = "Invalid request body";

/// Deserialize a JSON body and run its schema rules.
pub fn parse_json<T>(body: &[u8]) -> Result<T>
where
    T: DeserializeOwned + Validate,
{
    let value: T = parse_shape(body)?;
    check(&value)?;
    Ok(value)
}

/// Structural parse only, for bodies that are forwarded without further rules.
pub fn parse_shape<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| {
        ProxyError::validation(INVALID_BODY, Some(json!({ "body": e.to_string() })))
    })
}

/// Same as [`parse_json`] for bodies already collected into a JSON value,
/// such as multipart form fields.
pub fn parse_value<T>(value: Value) -> Result<T>
where
    T: DeserializeOwned + Validate,
{
    let parsed: T = serde_json::from_value(value).map_err(|e| {
        ProxyError::validation(INVALID_BODY, Some(json!({ "body": e.to_string() })))
    })?;
    check(&parsed)?;
    Ok(parsed)
}

pub fn check<T: Validate>(value: &T) -> Result<()> {
    value.validate().map_err(|errors| invalid(&errors))
}

pub fn invalid(errors: &ValidationErrors) -> ProxyError {
    let details = serde_json::to_value(errors).unwrap_or_else(|_| json!(errors.to_string()));
    ProxyError::validation(INVALID_BODY, Some(details))
}

/// Error for a field that must be present but was not supplied in any form.
pub fn missing_field(field: &'static str) -> ProxyError {
    let mut errors = ValidationErrors::new();
    errors.add(field, ValidationError::new("required"));
    invalid(&errors)
}

fn rule(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

/// Image parts must reference a well-formed URL.
pub fn validate_content(content: &MessageContent) -> std::result::Result<(), ValidationError> {
    let MessageContent::Parts(parts) = content else {
        return Ok(());
    };
    for part in parts {
        if let ContentPart::ImageUrl { image_url } = part {
            if !image_url.url.validate_url() {
                return Err(rule("url", "image_url.url must be a valid URL"));
            }
        }
    }
    Ok(())
}

/// Variations only support the square DALL·E 2 sizes.
pub fn validate_size_for_variation(size: &ImageSize) -> std::result::Result<(), ValidationError> {
    match size {
        ImageSize::S256 | ImageSize::S512 | ImageSize::S1024 => Ok(()),
        ImageSize::Landscape | ImageSize::Portrait => Err(rule(
            "size",
            "size must be one of 256x256, 512x512, 1024x1024",
        )),
    }
}

/// Conversations can only be opened for the chat feature kinds.
pub fn validate_chat_feature(kind: &FeatureType) -> std::result::Result<(), ValidationError> {
    if kind.is_chat() {
        Ok(())
    } else {
        Err(rule(
            "type",
            "type must be one of CHAT_WITH_AI, CHAT_WITH_IMAGE, CHAT_WITH_PDF, CHAT_WITH_YOUTUBE_VIDEO",
        ))
    }
}
