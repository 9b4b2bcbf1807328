use crate::error::{TtsError, TtsResult};

/// Speaking rate used when a request does not set one.
pub const DEFAULT_SPEED: f32 = 1.06;
pub const DEFAULT_LANGUAGE: &str = "wo";

/// Accepted speaking-rate range.
pub const MIN_SPEED: f32 = 0.25;
pub const MAX_SPEED: f32 = 4.0;

/// Per-request synthesis knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisOptions {
    pub speed: f32,
    pub language: String,
    /// Split long input into sentence chunks before inference.
    pub split_text: bool,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            speed: DEFAULT_SPEED,
            language: DEFAULT_LANGUAGE.to_string(),
            split_text: true,
        }
    }
}

/// A validated unit of work for the synthesis service.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    pub text: String,
    pub options: SynthesisOptions,
}

impl SynthesisRequest {
    /// Request with default options. Blank text is rejected.
    pub fn new(text: impl Into<String>) -> TtsResult<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(TtsError::validation("No text provided"));
        }
        Ok(Self {
            text,
            options: SynthesisOptions::default(),
        })
    }

    pub fn with_speed(mut self, speed: f32) -> TtsResult<Self> {
        if !speed.is_finite() || !(MIN_SPEED..=MAX_SPEED).contains(&speed) {
            return Err(TtsError::validation(format!(
                "speed must be between {MIN_SPEED} and {MAX_SPEED}"
            )));
        }
        self.options.speed = speed;
        Ok(self)
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.options.language = language.into();
        self
    }

    pub fn with_text_splitting(mut self, enabled: bool) -> Self {
        self.options.split_text = enabled;
        self
    }
}
