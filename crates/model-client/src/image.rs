//! Duck-typed image-generation response decoding.
//!
//! The gateway's image responses arrive in one of several shapes
//! depending on which underlying provider served the request. Rather
//! than pick one schema, we try an ordered list of candidate
//! extractors and take the first one that yields a non-empty result.

use serde_json::Value;

/// The resolved image payload: either a reference the caller can fetch,
/// or the image bytes already inlined as a data URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOutput {
    Url(String),
    InlineDataUri(String),
}

type Extractor = fn(&Value) -> Option<ImageOutput>;

const EXTRACTORS: &[Extractor] = &[
    from_chat_content_string,
    from_chat_content_object,
    from_data_array_url,
    from_data_array_b64,
    from_top_level,
];

/// Tries each candidate extractor in order; returns the first match.
pub fn extract_image(value: &Value) -> Option<ImageOutput> {
    EXTRACTORS.iter().find_map(|extractor| extractor(value))
}

fn non_empty(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn as_image_output(s: &str) -> ImageOutput {
    if s.starts_with("data:") {
        ImageOutput::InlineDataUri(s.to_string())
    } else {
        ImageOutput::Url(s.to_string())
    }
}

/// `choices[0].message.content` as a plain string (URL or data URI).
fn from_chat_content_string(value: &Value) -> Option<ImageOutput> {
    let content = value.get("choices")?.get(0)?.get("message")?.get("content")?.as_str()?;
    non_empty(content).map(as_image_output)
}

/// `choices[0].message.content` as a structured object with `url` or `image`.
fn from_chat_content_object(value: &Value) -> Option<ImageOutput> {
    let content = value.get("choices")?.get(0)?.get("message")?.get("content")?;
    let candidate = content.get("url").or_else(|| content.get("image"))?.as_str()?;
    non_empty(candidate).map(as_image_output)
}

/// `data[0].url`.
fn from_data_array_url(value: &Value) -> Option<ImageOutput> {
    let url = value.get("data")?.get(0)?.get("url")?.as_str()?;
    non_empty(url).map(as_image_output)
}

/// `data[0].b64_json`, wrapped as a PNG data URI.
fn from_data_array_b64(value: &Value) -> Option<ImageOutput> {
    let b64 = value.get("data")?.get(0)?.get("b64_json")?.as_str()?;
    non_empty(b64).map(|b64| ImageOutput::InlineDataUri(format!("data:image/png;base64,{}", b64)))
}

/// Top-level `url` or `image` fields.
fn from_top_level(value: &Value) -> Option<ImageOutput> {
    let candidate = value.get("url").or_else(|| value.get("image"))?.as_str()?;
    non_empty(candidate).map(as_image_output)
}
