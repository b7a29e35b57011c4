//! Channel and sample-rate alignment of decoded segments.

use anyhow::{Result, anyhow, bail};
use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::debug;

/// Widen interleaved audio to `to_channels`. Mono is copied into every output
/// channel; any other widening is unsupported.
pub fn upmix(samples: Vec<f32>, from_channels: usize, to_channels: usize) -> Result<Vec<f32>> {
    if from_channels == to_channels {
        return Ok(samples);
    }
    if from_channels != 1 || to_channels < 1 {
        bail!(
            "Cannot convert {} channel audio to {} channels",
            from_channels,
            to_channels
        );
    }

    let mut out = Vec::with_capacity(samples.len() * to_channels);
    for sample in samples {
        out.extend(std::iter::repeat_n(sample, to_channels));
    }
    Ok(out)
}

/// Resample interleaved audio from `input_rate` to `output_rate`.
pub fn resample(
    input: Vec<f32>,
    input_rate: u32,
    output_rate: u32,
    channels: usize,
) -> Result<Vec<f32>> {
    if input_rate == output_rate || input.is_empty() {
        return Ok(input);
    }

    debug!(
        "Resampling from {}Hz to {}Hz ({} channels)",
        input_rate, output_rate, channels
    );

    let planar_input = deinterleave(&input, channels);
    let input_frames = planar_input[0].len();

    let mut resampler = FastFixedIn::<f32>::new(
        output_rate as f64 / input_rate as f64,
        1.0,
        PolynomialDegree::Septic,
        input_frames,
        channels,
    )
    .map_err(|e| anyhow!("Failed to create resampler: {}", e))?;

    let planar_output = resampler
        .process(&planar_input, None)
        .map_err(|e| anyhow!("Resampling failed: {}", e))?;

    Ok(interleave(planar_output))
}

fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let frames = samples.len() / channels;
    let mut planar = vec![Vec::with_capacity(frames); channels];
    for frame in samples.chunks_exact(channels) {
        for (ch, sample) in frame.iter().enumerate() {
            planar[ch].push(*sample);
        }
    }
    planar
}

fn interleave(planar: Vec<Vec<f32>>) -> Vec<f32> {
    let channels = planar.len();
    let frames = planar.first().map_or(0, Vec::len);
    let mut out = Vec::with_capacity(frames * channels);
    for frame in 0..frames {
        for channel in &planar {
            out.push(channel[frame]);
        }
    }
    out
}
