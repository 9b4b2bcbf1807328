//! XTTS exported as two ONNX graphs.
//!
//! `conditioning.onnx` maps a reference clip to the GPT conditioning latent
//! and the speaker embedding. `synthesis.onnx` runs greedy GPT decoding plus
//! the HiFi-GAN decoder and yields the 24 kHz waveform for one text chunk.

use std::path::Path;

use anyhow::Context;
use ndarray::{ArrayD, IxDyn};
use ort::{
    execution_providers::CUDAExecutionProvider,
    session::{builder::GraphOptimizationLevel, Session},
    value::{Tensor, TensorRef},
};
use tracing::{debug, info};

use crate::conditioning::{ConditioningLatents, ReferenceClip};
use crate::config::XttsConfig;
use crate::device::Device;
use crate::error::{TtsError, TtsResult};
use crate::model::SpeechModel;
use crate::tokenizer::XttsTokenizer;

pub const CONDITIONING_GRAPH: &str = "conditioning.onnx";
pub const SYNTHESIS_GRAPH: &str = "synthesis.onnx";

pub struct OnnxXtts {
    conditioning: Session,
    synthesis: Session,
    tokenizer: XttsTokenizer,
    max_text_tokens: usize,
}

impl OnnxXtts {
    pub fn load(
        checkpoint_dir: &Path,
        vocab: &Path,
        config: &XttsConfig,
        device: Device,
    ) -> TtsResult<Self> {
        let tokenizer = XttsTokenizer::from_file(vocab).map_err(TtsError::Startup)?;
        let conditioning =
            load_session(&checkpoint_dir.join(CONDITIONING_GRAPH), device).map_err(TtsError::Startup)?;
        let synthesis =
            load_session(&checkpoint_dir.join(SYNTHESIS_GRAPH), device).map_err(TtsError::Startup)?;

        Ok(Self {
            conditioning,
            synthesis,
            tokenizer,
            max_text_tokens: config.model_args.gpt_max_text_tokens,
        })
    }
}

fn load_session(path: &Path, device: Device) -> anyhow::Result<Session> {
    anyhow::ensure!(path.is_file(), "Model graph not found: {}", path.display());

    let mut builder = Session::builder()
        .map_err(|e| anyhow::anyhow!("Failed to create session builder: {e}"))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| anyhow::anyhow!("Failed to set optimization level: {e}"))?;

    if let Device::Cuda(id) = device {
        builder = builder
            .with_execution_providers([CUDAExecutionProvider::default().with_device_id(id).build()])
            .map_err(|e| anyhow::anyhow!("Failed to register CUDA execution provider: {e}"))?;
    }

    let session = builder
        .commit_from_file(path)
        .map_err(|e| anyhow::anyhow!("Failed to load {}: {e}", path.display()))?;
    info!("Loaded {} on {device}", path.display());
    Ok(session)
}

fn to_array(shape: &[i64], data: &[f32]) -> anyhow::Result<ArrayD<f32>> {
    let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
    ArrayD::from_shape_vec(IxDyn(&dims), data.to_vec()).context("output tensor has inconsistent shape")
}

impl SpeechModel for OnnxXtts {
    fn conditioning_latents(&mut self, clip: &ReferenceClip) -> anyhow::Result<ConditioningLatents> {
        let gpt_audio = Tensor::from_array(([1usize, clip.gpt_audio.len()], clip.gpt_audio.clone()))
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        let speaker_audio =
            Tensor::from_array(([1usize, clip.speaker_audio.len()], clip.speaker_audio.clone()))
                .map_err(|e| anyhow::anyhow!("{e}"))?;

        let outputs = self
            .conditioning
            .run(ort::inputs![
                "gpt_audio" => gpt_audio,
                "speaker_audio" => speaker_audio,
            ])
            .map_err(|e| anyhow::anyhow!("conditioning graph failed: {e}"))?;

        let (shape, data) = outputs["gpt_cond_latent"]
            .try_extract_tensor::<f32>()
            .map_err(|e| anyhow::anyhow!("gpt_cond_latent: {e}"))?;
        let gpt_cond_latent = to_array(shape, data)?;

        let (shape, data) = outputs["speaker_embedding"]
            .try_extract_tensor::<f32>()
            .map_err(|e| anyhow::anyhow!("speaker_embedding: {e}"))?;
        let speaker_embedding = to_array(shape, data)?;

        Ok(ConditioningLatents::new(gpt_cond_latent, speaker_embedding))
    }

    fn inference(
        &mut self,
        text: &str,
        language: &str,
        latents: &ConditioningLatents,
        speed: f32,
    ) -> anyhow::Result<Vec<f32>> {
        let tokens = self.tokenizer.encode(text, language)?;
        anyhow::ensure!(
            tokens.len() < self.max_text_tokens,
            "input text produced {} tokens, the model accepts fewer than {}",
            tokens.len(),
            self.max_text_tokens
        );
        debug!(tokens = tokens.len(), "Encoded text chunk");

        let text_tokens =
            Tensor::from_array(([1usize, tokens.len()], tokens)).map_err(|e| anyhow::anyhow!("{e}"))?;
        let gpt_cond_latent = TensorRef::from_array_view(latents.gpt_cond_latent.view())
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        let speaker_embedding = TensorRef::from_array_view(latents.speaker_embedding.view())
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        let speed = Tensor::from_array(([1usize], vec![speed])).map_err(|e| anyhow::anyhow!("{e}"))?;

        let outputs = self
            .synthesis
            .run(ort::inputs![
                "text_tokens" => text_tokens,
                "gpt_cond_latent" => gpt_cond_latent,
                "speaker_embedding" => speaker_embedding,
                "speed" => speed,
            ])
            .map_err(|e| anyhow::anyhow!("synthesis graph failed: {e}"))?;

        let (_, wav) = outputs["wav"]
            .try_extract_tensor::<f32>()
            .map_err(|e| anyhow::anyhow!("wav: {e}"))?;
        Ok(wav.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_graph_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_session(&dir.path().join(SYNTHESIS_GRAPH), Device::Cpu).unwrap_err();
        assert!(err.to_string().contains("synthesis.onnx"));
    }

    #[test]
    fn test_output_shape_is_preserved() {
        let arr = to_array(&[1, 2, 3], &[0.0; 6]).unwrap();
        assert_eq!(arr.shape(), &[1, 2, 3]);
        assert!(to_array(&[1, 4], &[0.0; 3]).is_err());
    }
}
