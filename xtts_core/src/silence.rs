//! Silence detection and removal on WAV files.
//!
//! The post-processor only sequences the two calls of a
//! [`SilenceCollaborator`]; how silence is classified is entirely up to the
//! collaborator. [`EnergySilenceDetector`] is the implementation the server
//! ships with.

use std::path::Path;

use anyhow::Context;
use hound::{SampleFormat, WavReader, WavWriter};

use crate::wav::read_wav;

/// Half-open range of frames `[start, end)` classified as silence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SilenceInterval {
    pub start: usize,
    pub end: usize,
}

impl SilenceInterval {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn start_secs(&self, sample_rate: u32) -> f64 {
        self.start as f64 / sample_rate as f64
    }

    pub fn end_secs(&self, sample_rate: u32) -> f64 {
        self.end as f64 / sample_rate as f64
    }
}

/// External silence detection/removal contract.
pub trait SilenceCollaborator: Send + Sync {
    /// Ordered, non-overlapping silent intervals of the file at `path`.
    fn detect_silence(&self, path: &Path) -> anyhow::Result<Vec<SilenceInterval>>;

    /// Write `path` with `intervals` excised to `output`.
    fn remove_silence(
        &self,
        path: &Path,
        intervals: &[SilenceInterval],
        output: &Path,
    ) -> anyhow::Result<()>;
}

/// Thresholds for [`EnergySilenceDetector`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SilenceParams {
    /// Windows quieter than this RMS level (dBFS) count as silent.
    pub threshold_dbfs: f32,
    /// Shortest silent stretch worth removing.
    pub min_silence_ms: u32,
    /// Silence kept on each side of an interval that borders speech.
    pub keep_silence_ms: u32,
    /// Analysis window length.
    pub window_ms: u32,
}

impl Default for SilenceParams {
    fn default() -> Self {
        Self {
            threshold_dbfs: -45.0,
            min_silence_ms: 300,
            keep_silence_ms: 50,
            window_ms: 10,
        }
    }
}

/// RMS-energy silence detector.
#[derive(Debug, Clone, Default)]
pub struct EnergySilenceDetector {
    params: SilenceParams,
}

impl EnergySilenceDetector {
    pub fn new(params: SilenceParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &SilenceParams {
        &self.params
    }

    /// Detection over in-memory mono samples.
    pub fn detect_in_samples(&self, samples: &[f32], sample_rate: u32) -> Vec<SilenceInterval> {
        let total = samples.len();
        let frames_for = |ms: u32| (sample_rate as u64 * ms as u64 / 1000) as usize;
        let window = frames_for(self.params.window_ms).max(1);
        let min_silence = frames_for(self.params.min_silence_ms).max(1);
        let keep = frames_for(self.params.keep_silence_ms);

        let mut intervals = Vec::new();
        let mut run_start: Option<usize> = None;

        for (w, chunk) in samples.chunks(window).enumerate() {
            let offset = w * window;
            if window_dbfs(chunk) < self.params.threshold_dbfs {
                if run_start.is_none() {
                    run_start = Some(offset);
                }
            } else if let Some(start) = run_start.take() {
                push_interval(&mut intervals, start, offset, total, min_silence, keep);
            }
        }
        if let Some(start) = run_start {
            push_interval(&mut intervals, start, total, total, min_silence, keep);
        }
        intervals
    }
}

fn window_dbfs(chunk: &[f32]) -> f32 {
    if chunk.is_empty() {
        return f32::NEG_INFINITY;
    }
    let mean_square = chunk.iter().map(|s| s * s).sum::<f32>() / chunk.len() as f32;
    let rms = mean_square.sqrt();
    if rms > 0.0 {
        20.0 * rms.log10()
    } else {
        f32::NEG_INFINITY
    }
}

fn push_interval(
    intervals: &mut Vec<SilenceInterval>,
    start: usize,
    end: usize,
    total: usize,
    min_silence: usize,
    keep: usize,
) {
    if end - start < min_silence {
        return;
    }
    // Only pad the sides that touch audio
    let start = if start > 0 { start + keep } else { start };
    let end = if end < total { end.saturating_sub(keep) } else { end };
    if start < end {
        intervals.push(SilenceInterval { start, end });
    }
}

fn validate_intervals(intervals: &[SilenceInterval], frames: usize) -> anyhow::Result<()> {
    let mut last_end = 0usize;
    for interval in intervals {
        anyhow::ensure!(
            interval.start < interval.end,
            "empty or inverted silence interval {}..{}",
            interval.start,
            interval.end
        );
        anyhow::ensure!(
            interval.start >= last_end,
            "silence intervals are unordered or overlapping at frame {}",
            interval.start
        );
        anyhow::ensure!(
            interval.end <= frames,
            "silence interval ends at frame {} past the end of the audio ({frames} frames)",
            interval.end
        );
        last_end = interval.end;
    }
    Ok(())
}

/// Indices of frames that survive removal, in time order.
fn retained_frames(intervals: &[SilenceInterval], frames: usize) -> impl Iterator<Item = usize> + '_ {
    let mut next = 0usize;
    (0..frames).filter(move |&f| {
        while next < intervals.len() && intervals[next].end <= f {
            next += 1;
        }
        !(next < intervals.len() && intervals[next].start <= f)
    })
}

impl SilenceCollaborator for EnergySilenceDetector {
    fn detect_silence(&self, path: &Path) -> anyhow::Result<Vec<SilenceInterval>> {
        let (samples, sample_rate) = read_wav(path)?;
        Ok(self.detect_in_samples(&samples, sample_rate))
    }

    fn remove_silence(
        &self,
        path: &Path,
        intervals: &[SilenceInterval],
        output: &Path,
    ) -> anyhow::Result<()> {
        let mut reader = WavReader::open(path)
            .with_context(|| format!("Failed to open WAV file: {}", path.display()))?;
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;
        let frames = reader.duration() as usize;
        validate_intervals(intervals, frames)?;

        let mut writer = WavWriter::create(output, spec)
            .with_context(|| format!("Failed to create WAV file: {}", output.display()))?;

        match spec.sample_format {
            SampleFormat::Int => {
                let samples = reader
                    .samples::<i32>()
                    .collect::<Result<Vec<_>, _>>()
                    .context("corrupt sample data")?;
                for frame in retained_frames(intervals, frames) {
                    for s in &samples[frame * channels..(frame + 1) * channels] {
                        writer.write_sample(*s)?;
                    }
                }
            }
            SampleFormat::Float => {
                let samples = reader
                    .samples::<f32>()
                    .collect::<Result<Vec<_>, _>>()
                    .context("corrupt sample data")?;
                for frame in retained_frames(intervals, frames) {
                    for s in &samples[frame * channels..(frame + 1) * channels] {
                        writer.write_sample(*s)?;
                    }
                }
            }
        }
        writer.finalize().context("wav finalize failed")?;
        Ok(())
    }
}
