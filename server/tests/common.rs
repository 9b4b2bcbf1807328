//! Common utilities for integration tests

#![allow(dead_code)]

use std::path::Path;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use axum::Router;
use ndarray::{ArrayD, IxDyn};
use xtts_core::{
    AudioPostProcessor, ConditioningLatents, Device, EnergySilenceDetector, ModelHost,
    ReferenceClip, ServiceOptions, SpeechModel, SynthesisService, XttsConfig,
};
use xtts_server::{build_router, config::ServerConfig, AppState};

const CHANNELS: usize = 16;
const SPEAKER_DIM: usize = 8;

/// Deterministic stand-in for the neural model.
#[derive(Clone, Default)]
pub struct FakeModel {
    pub calls: Arc<AtomicUsize>,
    pub fail: bool,
}

impl SpeechModel for FakeModel {
    fn conditioning_latents(&mut self, _clip: &ReferenceClip) -> anyhow::Result<ConditioningLatents> {
        Ok(latents())
    }

    fn inference(
        &mut self,
        text: &str,
        _language: &str,
        _latents: &ConditioningLatents,
        _speed: f32,
    ) -> anyhow::Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("CUDA out of memory");
        }
        let frames = text.chars().count() * 240;
        Ok((0..frames).map(|i| 0.2 * (i as f32 * 0.06).sin()).collect())
    }
}

impl FakeModel {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn latents() -> ConditioningLatents {
    ConditioningLatents::new(
        ArrayD::from_elem(IxDyn(&[1, 4, CHANNELS]), 0.1),
        ArrayD::from_elem(IxDyn(&[1, SPEAKER_DIM, 1]), 0.1),
    )
}

fn test_config() -> XttsConfig {
    let json = format!(
        r#"{{
            "languages": ["wo", "en"],
            "model_args": {{ "gpt_n_model_channels": {CHANNELS}, "speaker_embedding_dim": {SPEAKER_DIM} }}
        }}"#
    );
    XttsConfig::from_json(&json).expect("test config must parse")
}

/// Create a test app instance around `model`, with temporary files going to
/// `scratch_dir`.
pub fn create_test_app(model: FakeModel, scratch_dir: &Path) -> Router {
    let host = ModelHost::from_model(test_config(), Device::Cpu, model);
    let service = SynthesisService::new(
        host,
        latents(),
        AudioPostProcessor::new(EnergySilenceDetector::default()),
        ServiceOptions {
            trim_silence: true,
            scratch_dir: scratch_dir.to_path_buf(),
        },
    );
    let state = AppState {
        service: Arc::new(service),
    };
    build_router(state, &ServerConfig::default())
}

pub fn listing(dir: &Path) -> Vec<std::path::PathBuf> {
    let mut entries: Vec<_> = std::fs::read_dir(dir)
        .expect("scratch dir must be readable")
        .map(|e| e.expect("dir entry").path())
        .collect();
    entries.sort();
    entries
}
