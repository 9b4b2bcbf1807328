//! Speaker conditioning derived once from the reference voice.

use std::path::Path;

use anyhow::Context;
use ndarray::ArrayD;
use tracing::info;

use crate::config::XttsConfig;
use crate::error::{TtsError, TtsResult};
use crate::model::ModelHost;
use crate::wav::{read_wav, resample};

/// Rate the speaker encoder expects its input at.
pub const SPEAKER_ENCODER_SAMPLE_RATE: u32 = 16_000;

/// Peak level of the reference after `sound_norm_refs` normalization.
const REFERENCE_NORM_PEAK: f32 = 0.75;

/// Prompt-conditioning latent and speaker embedding of the reference voice.
/// Immutable once derived and shared by every synthesis call.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditioningLatents {
    pub gpt_cond_latent: ArrayD<f32>,
    pub speaker_embedding: ArrayD<f32>,
}

impl ConditioningLatents {
    pub fn new(gpt_cond_latent: ArrayD<f32>, speaker_embedding: ArrayD<f32>) -> Self {
        Self {
            gpt_cond_latent,
            speaker_embedding,
        }
    }
}

/// Reference audio prepared for the conditioning encoders.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceClip {
    /// First `gpt_cond_len` seconds at `sample_rate`.
    pub gpt_audio: Vec<f32>,
    /// Whole (length-capped) reference at [`SPEAKER_ENCODER_SAMPLE_RATE`].
    pub speaker_audio: Vec<f32>,
    pub sample_rate: u32,
}

/// Read the reference recording and derive the latents from it.
///
/// Derivation parameters come from the loaded model config. Every failure
/// is a startup failure: the service cannot run without its voice.
pub fn derive_latents<P: AsRef<Path>>(host: &ModelHost, reference_path: P) -> TtsResult<ConditioningLatents> {
    let path = reference_path.as_ref();
    info!("Deriving conditioning latents from {}", path.display());

    let (samples, sample_rate) = read_wav(path)
        .with_context(|| format!("Failed to load reference audio {}", path.display()))
        .map_err(TtsError::Startup)?;
    let clip = prepare_reference(&samples, sample_rate, host.config()).map_err(TtsError::Startup)?;

    let latents = host
        .conditioning_latents(&clip)
        .context("Model rejected the reference audio")
        .map_err(TtsError::Startup)?;
    info!(
        gpt_cond_latent = ?latents.gpt_cond_latent.shape(),
        speaker_embedding = ?latents.speaker_embedding.shape(),
        "Conditioning latents ready"
    );
    Ok(latents)
}

/// Resample, cap, optionally normalize and slice the reference.
pub fn prepare_reference(samples: &[f32], sample_rate: u32, config: &XttsConfig) -> anyhow::Result<ReferenceClip> {
    anyhow::ensure!(!samples.is_empty(), "reference audio is empty");

    let target_rate = config.audio.sample_rate;
    let mut audio = resample(samples, sample_rate, target_rate)?;
    audio.truncate(target_rate as usize * config.max_ref_len as usize);

    if config.sound_norm_refs {
        let peak = audio.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
        anyhow::ensure!(peak > 0.0, "reference audio is silent");
        for s in audio.iter_mut() {
            *s = *s / peak * REFERENCE_NORM_PEAK;
        }
    }

    let gpt_len = (target_rate as usize * config.gpt_cond_len as usize).min(audio.len());
    let gpt_audio = audio[..gpt_len].to_vec();
    let speaker_audio = resample(&audio, target_rate, SPEAKER_ENCODER_SAMPLE_RATE)?;

    Ok(ReferenceClip {
        gpt_audio,
        speaker_audio,
        sample_rate: target_rate,
    })
}

#[cfg(test)]
mod tests {
    use hound::{SampleFormat, WavSpec, WavWriter};

    use super::*;
    use crate::device::Device;
    use crate::model::testing::{test_config, test_latents, ToneModel};

    fn write_reference(path: &Path, seconds: usize, rate: u32, amplitude: f32) {
        let spec = WavSpec {
            channels: 1,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for i in 0..seconds * rate as usize {
            let s = amplitude * (i as f32 * 0.07).sin();
            writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_reference_is_capped_normalized_and_sliced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anta_sample.wav");
        write_reference(&path, 5, 8_000, 0.2);

        let model = ToneModel::default();
        let seen = model.seen_clip.clone();
        let host = ModelHost::from_model(test_config(), Device::Cpu, model);

        let latents = derive_latents(&host, &path).unwrap();
        assert_eq!(latents, test_latents());

        let clip = seen.lock().unwrap().clone().unwrap();
        assert_eq!(clip.sample_rate, 8_000);
        // gpt_cond_len = 2 s
        assert_eq!(clip.gpt_audio.len(), 16_000);
        let peak = clip.gpt_audio.iter().fold(0.0f32, |a, s| a.max(s.abs()));
        assert!((peak - REFERENCE_NORM_PEAK).abs() < 5e-3);
        // max_ref_len = 3 s, resampled to 16 kHz
        let expected = 48_000f32;
        assert!((clip.speaker_audio.len() as f32 - expected).abs() / expected < 0.02);
    }

    #[test]
    fn test_short_reference_keeps_its_length() {
        let config = test_config();
        let samples: Vec<f32> = (0..4_000).map(|i| 0.1 * (i as f32 * 0.1).sin()).collect();
        let clip = prepare_reference(&samples, 8_000, &config).unwrap();
        assert_eq!(clip.gpt_audio.len(), 4_000);
    }

    #[test]
    fn test_missing_reference_is_startup_failure() {
        let host = ModelHost::from_model(test_config(), Device::Cpu, ToneModel::default());
        let err = derive_latents(&host, "/no/such/anta_sample.wav").unwrap_err();
        assert!(matches!(err, TtsError::Startup(_)));
        assert!(err.to_string().contains("anta_sample.wav"));
    }

    #[test]
    fn test_silent_reference_is_rejected_when_normalizing() {
        let config = test_config();
        assert!(prepare_reference(&[0.0; 800], 8_000, &config).is_err());
        assert!(prepare_reference(&[], 8_000, &config).is_err());
    }
}
