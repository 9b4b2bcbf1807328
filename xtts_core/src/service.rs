//! Per-request orchestration of the synthesis pipeline.

use std::{
    fmt, fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::Context;
use tempfile::NamedTempFile;
use tracing::{debug, error, info};

use crate::conditioning::ConditioningLatents;
use crate::device::Device;
use crate::error::{TtsError, TtsResult};
use crate::model::ModelHost;
use crate::postprocess::AudioPostProcessor;
use crate::request::SynthesisRequest;
use crate::wav::encode_wav;

#[derive(Debug, Clone)]
pub struct ServiceOptions {
    /// Run the silence-trimming round trip before responding.
    pub trim_silence: bool,
    /// Directory holding the per-request temporary WAV files.
    pub scratch_dir: PathBuf,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            trim_silence: true,
            scratch_dir: std::env::temp_dir(),
        }
    }
}

/// Pipeline position of a request, used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStage {
    Validated,
    Synthesized,
    Normalized,
    Encoded,
    SilenceTrimmed,
}

impl fmt::Display for RequestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestStage::Validated => "validated",
            RequestStage::Synthesized => "synthesized",
            RequestStage::Normalized => "normalized",
            RequestStage::Encoded => "encoded",
            RequestStage::SilenceTrimmed => "silence_trimmed",
        };
        f.write_str(name)
    }
}

/// Owns everything a request needs: the model host, the reference voice and
/// the post-processor. Built once at startup and shared behind an `Arc`.
#[derive(Debug)]
pub struct SynthesisService {
    host: ModelHost,
    latents: ConditioningLatents,
    post: AudioPostProcessor,
    options: ServiceOptions,
}

impl SynthesisService {
    pub fn new(
        host: ModelHost,
        latents: ConditioningLatents,
        post: AudioPostProcessor,
        options: ServiceOptions,
    ) -> Self {
        info!(
            trim_silence = options.trim_silence,
            scratch_dir = %options.scratch_dir.display(),
            "Synthesis service ready"
        );
        Self {
            host,
            latents,
            post,
            options,
        }
    }

    pub fn device(&self) -> Device {
        self.host.device()
    }

    pub fn options(&self) -> &ServiceOptions {
        &self.options
    }

    /// Produce the WAV bytes answering `request`. Blocking.
    pub fn handle(&self, request: &SynthesisRequest) -> TtsResult<Vec<u8>> {
        let mut stage = RequestStage::Validated;
        let result = self.run(request, &mut stage);
        if let Err(e) = &result {
            error!(last_stage = %stage, kind = e.kind(), "Request failed: {e:#}");
        }
        result
    }

    fn run(&self, request: &SynthesisRequest, stage: &mut RequestStage) -> TtsResult<Vec<u8>> {
        debug!(stage = %stage, chars = request.text.chars().count(), "Request received");

        let waveform = self
            .host
            .synthesize(&request.text, &self.latents, &request.options)?;
        *stage = RequestStage::Synthesized;
        debug!(stage = %stage, duration_ms = waveform.duration_ms());

        let waveform = self.post.normalize(waveform);
        *stage = RequestStage::Normalized;
        debug!(stage = %stage, peak = waveform.peak());

        let encoded = encode_wav(&waveform.samples, waveform.sample_rate)
            .context("Failed to encode WAV")
            .map_err(TtsError::Inference)?;
        *stage = RequestStage::Encoded;
        debug!(stage = %stage, bytes = encoded.len());

        if !self.options.trim_silence {
            return Ok(encoded);
        }

        let trimmed = self.trim(&encoded)?;
        *stage = RequestStage::SilenceTrimmed;
        debug!(stage = %stage, bytes = trimmed.len());
        Ok(trimmed)
    }

    /// Both temporary files are removed when this returns, on every path.
    fn trim(&self, encoded: &[u8]) -> TtsResult<Vec<u8>> {
        let mut input = scratch_file(&self.options.scratch_dir)?;
        input
            .write_all(encoded)
            .and_then(|_| input.flush())
            .context("Failed to write temporary WAV")
            .map_err(TtsError::SilenceProcessing)?;

        let output = scratch_file(&self.options.scratch_dir)?;
        self.post.trim_silence(input.path(), output.path())?;

        fs::read(output.path())
            .context("Failed to read trimmed WAV")
            .map_err(TtsError::SilenceProcessing)
    }
}

fn scratch_file(dir: &Path) -> TtsResult<NamedTempFile> {
    tempfile::Builder::new()
        .prefix("tts-")
        .suffix(".wav")
        .tempfile_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))
        .map_err(TtsError::SilenceProcessing)
}
