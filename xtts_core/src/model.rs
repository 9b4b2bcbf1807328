use std::sync::{Mutex, MutexGuard};

use anyhow::Context;
use tracing::{debug, info};

use crate::conditioning::{ConditioningLatents, ReferenceClip};
use crate::config::{char_limit, ModelPaths, XttsConfig};
use crate::device::Device;
use crate::error::{TtsError, TtsResult};
use crate::onnx::OnnxXtts;
use crate::request::SynthesisOptions;
use crate::text::{normalize_text, split_sentences};

/// Mono audio at a fixed sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Largest absolute sample value, 0.0 for an empty waveform.
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }

    pub fn duration_ms(&self) -> u64 {
        (self.samples.len() as f64 / self.sample_rate as f64 * 1000.0) as u64
    }
}

/// The neural model as seen from the host.
///
/// Implementations are not expected to be reentrant; the host never calls
/// into one model from two threads at once.
pub trait SpeechModel: Send {
    /// Derive the speaker representation from a prepared reference clip.
    fn conditioning_latents(&mut self, clip: &ReferenceClip) -> anyhow::Result<ConditioningLatents>;

    /// Run deterministic (greedy) inference for one chunk of text.
    fn inference(
        &mut self,
        text: &str,
        language: &str,
        latents: &ConditioningLatents,
        speed: f32,
    ) -> anyhow::Result<Vec<f32>>;
}

/// Owns the single loaded model, its config and its device.
pub struct ModelHost {
    model: Mutex<Box<dyn SpeechModel>>,
    config: XttsConfig,
    device: Device,
}

impl std::fmt::Debug for ModelHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHost")
            .field("model", &"<SpeechModel>")
            .field("languages", &self.config.languages)
            .field("device", &self.device)
            .finish()
    }
}

impl ModelHost {
    /// Load config, vocabulary and checkpoint. Any failure is fatal; a
    /// partially loaded host is never returned.
    pub fn load(paths: &ModelPaths, device: Device) -> TtsResult<Self> {
        info!("Loading model config from {}", paths.config.display());
        let config = XttsConfig::load(&paths.config)?;

        info!(
            "Loading checkpoint from {} on {device}",
            paths.checkpoint.display()
        );
        let model = OnnxXtts::load(&paths.checkpoint, &paths.vocab, &config, device)?;
        info!("Model loaded, languages: {}", config.languages.join(", "));

        Ok(Self::from_model(config, device, model))
    }

    /// Wrap an already constructed model.
    pub fn from_model<M: SpeechModel + 'static>(config: XttsConfig, device: Device, model: M) -> Self {
        Self {
            model: Mutex::new(Box::new(model)),
            config,
            device,
        }
    }

    pub fn config(&self) -> &XttsConfig {
        &self.config
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Sample rate of every waveform returned by [`ModelHost::synthesize`].
    pub fn sample_rate(&self) -> u32 {
        self.config.audio.output_sample_rate
    }

    fn lock_model(&self) -> anyhow::Result<MutexGuard<'_, Box<dyn SpeechModel>>> {
        self.model.lock().map_err(|_| {
            anyhow::anyhow!(
                "Model lock poisoned - a previous inference panicked. Please restart the server."
            )
        })
    }

    pub(crate) fn conditioning_latents(&self, clip: &ReferenceClip) -> anyhow::Result<ConditioningLatents> {
        let mut model = self.lock_model()?;
        let latents = model.conditioning_latents(clip)?;
        self.check_latents(&latents)?;
        Ok(latents)
    }

    /// Synthesize `text` in the conditioned voice.
    ///
    /// Text is lower-cased before inference. With splitting enabled, each
    /// chunk is synthesized in order and the samples are concatenated.
    /// The returned waveform is not normalized.
    pub fn synthesize(
        &self,
        text: &str,
        latents: &ConditioningLatents,
        options: &SynthesisOptions,
    ) -> TtsResult<Waveform> {
        self.synthesize_inner(text, latents, options)
            .map_err(TtsError::Inference)
    }

    fn synthesize_inner(
        &self,
        text: &str,
        latents: &ConditioningLatents,
        options: &SynthesisOptions,
    ) -> anyhow::Result<Waveform> {
        let language = options.language.as_str();
        anyhow::ensure!(
            self.config.supports_language(language),
            "language '{language}' is not supported by the loaded model (supported: {})",
            self.config.languages.join(", ")
        );
        self.check_latents(latents)?;

        let text = normalize_text(text);
        anyhow::ensure!(!text.is_empty(), "nothing to synthesize after normalization");

        let chunks = if options.split_text {
            split_sentences(&text, char_limit(language))
        } else {
            vec![text]
        };
        debug!(chunks = chunks.len(), language, speed = options.speed, "Running inference");

        let mut samples = Vec::new();
        {
            let mut model = self.lock_model()?;
            for (i, chunk) in chunks.iter().enumerate() {
                let part = model
                    .inference(chunk, language, latents, options.speed)
                    .with_context(|| format!("inference failed on chunk {} of {}", i + 1, chunks.len()))?;
                samples.extend(part);
            }
        }

        anyhow::ensure!(
            samples.iter().all(|s| s.is_finite()),
            "model produced non-finite samples"
        );
        Ok(Waveform::new(samples, self.sample_rate()))
    }

    fn check_latents(&self, latents: &ConditioningLatents) -> anyhow::Result<()> {
        let channels = self.config.model_args.gpt_n_model_channels;
        let gpt_shape = latents.gpt_cond_latent.shape();
        anyhow::ensure!(
            gpt_shape.len() == 3 && gpt_shape[2] == channels,
            "gpt conditioning latent has shape {gpt_shape:?}, expected [1, n, {channels}]"
        );

        let dim = self.config.model_args.speaker_embedding_dim;
        anyhow::ensure!(
            latents.speaker_embedding.len() == dim,
            "speaker embedding has {} values, expected {dim}",
            latents.speaker_embedding.len()
        );
        Ok(())
    }
}
