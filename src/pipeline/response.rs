//! Best-effort cleanup of LLM output.

use crate::error::{Result, Text2SqlError};
use lazy_static::lazy_static;
use regex::Regex;
use serde::de::DeserializeOwned;

lazy_static! {
    static ref OPENING_FENCE_LINE: Regex = Regex::new(r"^```[A-Za-z0-9_+-]*[ \t]*\r?\n").unwrap();
    static ref CLOSING_FENCE: Regex = Regex::new(r"```$").unwrap();
}

/// Removes a leading ```` ```lang ```` marker and a trailing ```` ``` ````.
pub fn strip_code_fences(response: &str) -> String {
    let trimmed = response.trim();
    let without_open = strip_opening_fence(trimmed);
    let without_close = CLOSING_FENCE.replace(without_open.trim_end(), "");
    without_close.trim().to_string()
}

fn strip_opening_fence(text: &str) -> &str {
    if let Some(m) = OPENING_FENCE_LINE.find(text) {
        return &text[m.end()..];
    }
    // Fence glued to the content, e.g. "```json{...}".
    match text.strip_prefix("```") {
        Some(rest) => rest
            .strip_prefix("json")
            .or_else(|| rest.strip_prefix("sql"))
            .unwrap_or(rest),
        None => text,
    }
}

/// Substring from the first `{` to the last `}`, if there is one.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Parses a JSON object out of a chatty or fenced response.
pub fn parse_json_response<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let cleaned = strip_code_fences(raw);
    let candidate = extract_json_object(&cleaned).unwrap_or(&cleaned);
    serde_json::from_str(candidate).map_err(|e| Text2SqlError::ResponseParse {
        message: e.to_string(),
        raw: raw.to_string(),
    })
}
