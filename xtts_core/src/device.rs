//! Compute device selection.
//!
//! The model runs on ONNX Runtime; the accelerator is the CUDA execution
//! provider when the runtime reports it as usable, the CPU otherwise.

use std::fmt;

use ort::execution_providers::{CUDAExecutionProvider, ExecutionProvider};
use tracing::{info, warn};

use crate::error::{TtsError, TtsResult};

/// Device preference for model loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DevicePreference {
    /// Use CUDA when available, else CPU.
    #[default]
    Auto,
    Cpu,
    Cuda(i32),
}

impl DevicePreference {
    /// Parse from string (for env config). Unknown values mean `Auto`.
    pub fn parse(s: &str) -> Self {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "cpu" => Self::Cpu,
            "cuda" | "gpu" => Self::Cuda(0),
            _ => match s
                .strip_prefix("cuda:")
                .and_then(|id| id.parse::<u32>().ok())
                .and_then(|id| i32::try_from(id).ok())
            {
                Some(id) => Self::Cuda(id),
                None => Self::Auto,
            },
        }
    }
}

/// Device the model is bound to for the whole process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Cuda(i32),
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(id) => write!(f, "cuda:{id}"),
        }
    }
}

impl Device {
    pub fn is_accelerator(&self) -> bool {
        matches!(self, Device::Cuda(_))
    }
}

/// Resolve a preference into a concrete device.
pub fn select_device(preference: DevicePreference) -> TtsResult<Device> {
    match preference {
        DevicePreference::Cpu => {
            info!("Using CPU device (forced)");
            Ok(Device::Cpu)
        }
        DevicePreference::Cuda(id) => {
            if cuda_available() {
                info!("Using CUDA device {id}");
                Ok(Device::Cuda(id))
            } else {
                Err(TtsError::startup(format!(
                    "CUDA device {id} requested but the CUDA execution provider is not available"
                )))
            }
        }
        DevicePreference::Auto => {
            if cuda_available() {
                info!("Auto-selected CUDA device 0");
                Ok(Device::Cuda(0))
            } else {
                info!("Using CPU device (no accelerator available)");
                Ok(Device::Cpu)
            }
        }
    }
}

fn cuda_available() -> bool {
    match CUDAExecutionProvider::default().is_available() {
        Ok(available) => available,
        Err(e) => {
            warn!("Could not query CUDA execution provider: {e}");
            false
        }
    }
}
