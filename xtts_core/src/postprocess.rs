use std::path::Path;

use anyhow::Context;
use tracing::{debug, warn};

use crate::error::{TtsError, TtsResult};
use crate::model::Waveform;
use crate::silence::SilenceCollaborator;

/// Scale the waveform so its peak absolute amplitude is exactly 1.0.
///
/// An all-zero waveform is returned untouched (with a warning) so the
/// degenerate case stays observable downstream.
pub fn normalize(mut waveform: Waveform) -> Waveform {
    let peak = waveform.peak();
    if peak == 0.0 {
        warn!(
            samples = waveform.samples.len(),
            "Generated audio is all zeros, skipping normalization"
        );
        return waveform;
    }
    // Division keeps the peak sample at exactly 1.0 and makes a second pass a no-op
    for s in waveform.samples.iter_mut() {
        *s /= peak;
    }
    waveform
}

/// Amplitude normalization plus delegation to a silence collaborator.
pub struct AudioPostProcessor {
    silence: Box<dyn SilenceCollaborator>,
}

impl AudioPostProcessor {
    pub fn new<S: SilenceCollaborator + 'static>(silence: S) -> Self {
        Self {
            silence: Box::new(silence),
        }
    }

    pub fn normalize(&self, waveform: Waveform) -> Waveform {
        normalize(waveform)
    }

    /// Detect silent intervals in `input` and write the audio without them
    /// to `output`.
    pub fn trim_silence(&self, input: &Path, output: &Path) -> TtsResult<()> {
        let intervals = self
            .silence
            .detect_silence(input)
            .with_context(|| format!("silence detection failed for {}", input.display()))
            .map_err(TtsError::SilenceProcessing)?;
        debug!(intervals = intervals.len(), "Detected silent intervals");

        self.silence
            .remove_silence(input, &intervals, output)
            .with_context(|| format!("silence removal failed for {}", input.display()))
            .map_err(TtsError::SilenceProcessing)
    }
}

impl std::fmt::Debug for AudioPostProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioPostProcessor")
            .field("silence", &"<SilenceCollaborator>")
            .finish()
    }
}
