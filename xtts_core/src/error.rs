use thiserror::Error;

/// Failure kinds of the synthesis pipeline.
///
/// Only [`TtsError::Startup`] is allowed to stop the process; everything else
/// is recovered at the request boundary.
#[derive(Debug, Error)]
pub enum TtsError {
    /// Model, config, checkpoint or reference voice could not be loaded.
    #[error("startup failed: {0:#}")]
    Startup(anyhow::Error),

    /// The request payload does not describe a synthesis job.
    #[error("{0}")]
    Validation(String),

    /// The model runtime raised, or rejected its inputs.
    #[error("inference failed: {0:#}")]
    Inference(anyhow::Error),

    /// The silence collaborator or a temporary artifact failed.
    #[error("silence processing failed: {0:#}")]
    SilenceProcessing(anyhow::Error),
}

pub type TtsResult<T> = Result<T, TtsError>;

impl TtsError {
    pub fn startup(msg: impl std::fmt::Display) -> Self {
        TtsError::Startup(anyhow::anyhow!("{msg}"))
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        TtsError::Validation(msg.into())
    }

    pub fn inference(msg: impl std::fmt::Display) -> Self {
        TtsError::Inference(anyhow::anyhow!("{msg}"))
    }

    pub fn silence(msg: impl std::fmt::Display) -> Self {
        TtsError::SilenceProcessing(anyhow::anyhow!("{msg}"))
    }

    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            TtsError::Startup(_) => "startup",
            TtsError::Validation(_) => "validation",
            TtsError::Inference(_) => "inference",
            TtsError::SilenceProcessing(_) => "silence_processing",
        }
    }
}
