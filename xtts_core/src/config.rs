use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::Deserialize;

use crate::error::{TtsError, TtsResult};

/// Sample rate of every waveform the model emits.
pub const DEFAULT_OUTPUT_SAMPLE_RATE: u32 = 24_000;

/// Split limit for languages without a dedicated entry (Wolof included).
const DEFAULT_CHAR_LIMIT: usize = 250;

/// Fixed on-disk layout of the fine-tuned checkpoint, relative to a root dir.
#[derive(Debug, Clone)]
pub struct ModelPaths {
    pub config: PathBuf,
    pub checkpoint: PathBuf,
    pub vocab: PathBuf,
    pub reference_audio: PathBuf,
}

impl ModelPaths {
    pub fn from_root<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref();
        let checkpoint_dir = root.join("Anta_GPT_XTTS_Wo");
        Self {
            config: checkpoint_dir.join("config.json"),
            checkpoint: checkpoint_dir.join("onnx"),
            vocab: root
                .join("XTTS_v2.0_original_model_files")
                .join("vocab.json"),
            reference_audio: root.join("anta_sample.wav"),
        }
    }
}

/// Subset of the XTTS `config.json` this service relies on.
/// Unknown keys are ignored so the file can be used as exported.
#[derive(Debug, Clone, Deserialize)]
pub struct XttsConfig {
    /// Seconds of reference audio used for the GPT conditioning latent.
    #[serde(default = "default_gpt_cond_len")]
    pub gpt_cond_len: u32,
    /// Maximum seconds of reference audio considered at all.
    #[serde(default = "default_max_ref_len")]
    pub max_ref_len: u32,
    /// Peak-normalize the reference before deriving latents.
    #[serde(default)]
    pub sound_norm_refs: bool,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub model_args: ModelArgs,
    #[serde(default)]
    pub audio: AudioConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelArgs {
    #[serde(default = "default_max_text_tokens")]
    pub gpt_max_text_tokens: usize,
    #[serde(default = "default_model_channels")]
    pub gpt_n_model_channels: usize,
    #[serde(default = "default_speaker_embedding_dim")]
    pub speaker_embedding_dim: usize,
}

impl Default for ModelArgs {
    fn default() -> Self {
        Self {
            gpt_max_text_tokens: default_max_text_tokens(),
            gpt_n_model_channels: default_model_channels(),
            speaker_embedding_dim: default_speaker_embedding_dim(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    /// Rate the reference voice is conditioned at.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_output_sample_rate")]
    pub output_sample_rate: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            output_sample_rate: default_output_sample_rate(),
        }
    }
}

fn default_gpt_cond_len() -> u32 {
    12
}
fn default_max_ref_len() -> u32 {
    10
}
fn default_max_text_tokens() -> usize {
    402
}
fn default_model_channels() -> usize {
    1024
}
fn default_speaker_embedding_dim() -> usize {
    512
}
fn default_sample_rate() -> u32 {
    22_050
}
fn default_output_sample_rate() -> u32 {
    DEFAULT_OUTPUT_SAMPLE_RATE
}

impl XttsConfig {
    /// Load and sanity-check the config descriptor. Any problem is fatal.
    pub fn load<P: AsRef<Path>>(path: P) -> TtsResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))
            .map_err(TtsError::Startup)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> TtsResult<Self> {
        let config: XttsConfig = serde_json::from_str(text)
            .context("Config file is not valid XTTS JSON")
            .map_err(TtsError::Startup)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> TtsResult<()> {
        if self.languages.is_empty() {
            return Err(TtsError::startup("config lists no languages"));
        }
        if self.audio.sample_rate == 0 || self.audio.output_sample_rate == 0 {
            return Err(TtsError::startup("config has a zero sample rate"));
        }
        if self.gpt_cond_len == 0 || self.max_ref_len == 0 {
            return Err(TtsError::startup(
                "gpt_cond_len and max_ref_len must be positive",
            ));
        }
        if self.model_args.gpt_max_text_tokens == 0 {
            return Err(TtsError::startup("gpt_max_text_tokens must be positive"));
        }
        Ok(())
    }

    pub fn supports_language(&self, language: &str) -> bool {
        self.languages.iter().any(|l| l == language)
    }
}

/// Per-language character budget for one synthesis chunk.
pub fn char_limit(language: &str) -> usize {
    match language {
        "en" => 250,
        "de" => 253,
        "fr" => 273,
        "es" => 239,
        "it" => 213,
        "pt" => 203,
        "pl" => 224,
        "zh" | "zh-cn" => 82,
        "ar" => 166,
        "cs" => 186,
        "ru" => 182,
        "nl" => 251,
        "tr" => 226,
        "ja" => 71,
        "hu" => 224,
        "ko" => 95,
        _ => DEFAULT_CHAR_LIMIT,
    }
}
