use serde_json::{Map, Value};
use xtts_core::SynthesisRequest;

use crate::error::ApiError;

pub const NO_TEXT: &str = "No text provided";
pub const INVALID_JSON: &str = "Invalid JSON payload";

/// Turn a raw `/predict` body into a typed request.
///
/// The body is parsed as JSON whatever its content type. Only `text` is
/// required; `speed`, `language` and `enable_text_splitting` override the
/// defaults when present and non-null.
pub fn parse_synthesis_request(body: &[u8]) -> Result<SynthesisRequest, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::InvalidInput(NO_TEXT.to_string()));
    }
    let payload: Value =
        serde_json::from_slice(body).map_err(|_| ApiError::InvalidInput(INVALID_JSON.to_string()))?;
    let Value::Object(fields) = payload else {
        return Err(ApiError::InvalidInput(NO_TEXT.to_string()));
    };

    let text = match fields.get("text") {
        Some(Value::String(text)) => text.clone(),
        _ => return Err(ApiError::InvalidInput(NO_TEXT.to_string())),
    };
    let mut request = SynthesisRequest::new(text)?;

    if let Some(speed) = field(&fields, "speed") {
        let speed = speed
            .as_f64()
            .ok_or_else(|| ApiError::InvalidInput("speed must be a number".to_string()))?;
        request = request.with_speed(speed as f32)?;
    }

    if let Some(language) = field(&fields, "language") {
        let language = language
            .as_str()
            .ok_or_else(|| ApiError::InvalidInput("language must be a string".to_string()))?;
        if !is_valid_language_code(language) {
            return Err(ApiError::InvalidInput(format!(
                "Invalid language code format: {}. Expected a lowercase code such as wo or zh-cn",
                language
            )));
        }
        request = request.with_language(language);
    }

    if let Some(split) = field(&fields, "enable_text_splitting") {
        let split = split.as_bool().ok_or_else(|| {
            ApiError::InvalidInput("enable_text_splitting must be a boolean".to_string())
        })?;
        request = request.with_text_splitting(split);
    }

    Ok(request)
}

fn field<'a>(fields: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    fields.get(name).filter(|v| !v.is_null())
}

/// Language code format: 2-3 lowercase letters, optionally followed by
/// `-` and a 2 letter lowercase region (e.g. `wo`, `zh-cn`).
fn is_valid_language_code(code: &str) -> bool {
    let is_lower = |s: &str| s.chars().all(|c| c.is_ascii_lowercase());
    let parts: Vec<&str> = code.split('-').collect();
    match parts.len() {
        1 => (2..=3).contains(&parts[0].len()) && is_lower(parts[0]),
        2 => {
            (2..=3).contains(&parts[0].len())
                && is_lower(parts[0])
                && parts[1].len() == 2
                && is_lower(parts[1])
        }
        _ => false,
    }
}
