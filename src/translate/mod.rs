//! Translation between the OpenAI-compatible surface and the upstream
//! feature API.
//!
//! Request translators, response extractors and the stream relay state
//! machine live here. Nothing in this module performs I/O.

pub mod native_types;
pub mod openai_types;
pub mod request;
pub mod response;
pub mod streaming;
pub mod upstream_types;
