//! Inference core of the Wolof XTTS voice service.
//!
//! Startup loads one [`ModelHost`] and derives the reference voice's
//! [`ConditioningLatents`] once; every request then goes through
//! [`SynthesisService::handle`].

pub mod conditioning;
pub mod config;
pub mod device;
pub mod error;
pub mod model;
pub mod onnx;
pub mod postprocess;
pub mod request;
pub mod service;
pub mod silence;
pub mod text;
pub mod tokenizer;
pub mod wav;

pub use conditioning::{derive_latents, ConditioningLatents, ReferenceClip};
pub use config::{ModelPaths, XttsConfig};
pub use device::{select_device, Device, DevicePreference};
pub use error::{TtsError, TtsResult};
pub use model::{ModelHost, SpeechModel, Waveform};
pub use postprocess::AudioPostProcessor;
pub use request::{SynthesisOptions, SynthesisRequest};
pub use service::{ServiceOptions, SynthesisService};
pub use silence::{EnergySilenceDetector, SilenceCollaborator, SilenceInterval, SilenceParams};
