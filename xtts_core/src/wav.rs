use std::{io::Cursor, path::Path};

use anyhow::Context;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use rubato::{FastFixedIn, PolynomialDegree, Resampler};

/// Read a WAV file as mono f32 samples in [-1, 1].
/// Multi-channel input is down-mixed by averaging the channels.
pub fn read_wav<P: AsRef<Path>>(path: P) -> anyhow::Result<(Vec<f32>, u32)> {
    let path = path.as_ref();
    let mut reader = WavReader::open(path)
        .with_context(|| format!("Failed to open WAV file: {}", path.display()))?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<Result<Vec<_>, _>>()
        }
        SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>(),
    }
    .with_context(|| format!("Corrupt sample data in {}", path.display()))?;

    let channels = spec.channels.max(1) as usize;
    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };
    Ok((samples, spec.sample_rate))
}

/// Encode mono samples as 16-bit PCM WAV bytes.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> anyhow::Result<Vec<u8>> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    // WAV header (44 bytes) + 2 bytes per sample
    let mut cursor = Cursor::new(Vec::<u8>::with_capacity(44 + samples.len() * 2));
    {
        let mut writer = WavWriter::new(&mut cursor, spec).context("wav header write failed")?;
        const I16_MAX_F32: f32 = i16::MAX as f32;
        for &s in samples {
            let v = (s.clamp(-1.0, 1.0) * I16_MAX_F32) as i16;
            writer.write_sample(v).context("wav sample write failed")?;
        }
        writer.finalize().context("wav finalize failed")?;
    }
    Ok(cursor.into_inner())
}

/// Resample mono audio with a polynomial interpolator.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> anyhow::Result<Vec<f32>> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    anyhow::ensure!(from_rate > 0 && to_rate > 0, "sample rates must be positive");

    let ratio = to_rate as f64 / from_rate as f64;
    let mut resampler = FastFixedIn::<f32>::new(
        ratio,
        1.0,
        PolynomialDegree::Septic,
        samples.len(),
        1,
    )
    .context("failed to build resampler")?;

    let mut out = resampler
        .process(&[samples], None)
        .context("resampling failed")?;
    Ok(out.pop().unwrap_or_default())
}
