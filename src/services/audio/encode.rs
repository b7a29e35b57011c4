//! MP3 encoding through LAME at the fixed output bitrate.

use anyhow::{Context, Result, anyhow, bail};
use mp3lame_encoder::{Bitrate, Builder, FlushNoGap, InterleavedPcm, MonoPcm, Quality};
use std::path::Path;

/// Output bitrate in kbps. Not configurable per request.
pub const OUTPUT_BITRATE_KBPS: u32 = 128;

/// Frames handed to LAME per call
const ENCODE_CHUNK_FRAMES: usize = 1152 * 8;

/// Bytes LAME may emit on flush
const FLUSH_RESERVE: usize = 7200;

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

/// Encode interleaved f32 PCM as a constant-bitrate MP3 byte stream.
pub fn encode_mp3(samples: &[f32], sample_rate: u32, channels: usize) -> Result<Vec<u8>> {
    if !(1..=2).contains(&channels) {
        bail!("MP3 output supports 1 or 2 channels, got {}", channels);
    }

    let mut builder = Builder::new().ok_or_else(|| anyhow!("Failed to create LAME encoder"))?;
    builder
        .set_num_channels(channels as u8)
        .map_err(|e| anyhow!("Failed to set channel count {}: {:?}", channels, e))?;
    builder
        .set_sample_rate(sample_rate)
        .map_err(|e| anyhow!("Failed to set sample rate {}: {:?}", sample_rate, e))?;
    builder
        .set_brate(Bitrate::Kbps128)
        .map_err(|e| anyhow!("Failed to set bitrate: {:?}", e))?;
    builder
        .set_quality(Quality::Good)
        .map_err(|e| anyhow!("Failed to set quality: {:?}", e))?;
    let mut encoder = builder
        .build()
        .map_err(|e| anyhow!("Failed to initialize LAME encoder: {:?}", e))?;

    let pcm: Vec<i16> = samples.iter().copied().map(to_i16).collect();

    let mut out = Vec::new();

    for chunk in pcm.chunks(ENCODE_CHUNK_FRAMES * channels) {
        out.reserve(mp3lame_encoder::max_required_buffer_size(chunk.len() / channels));
        let res = if channels == 1 {
            encoder.encode_to_vec(MonoPcm(chunk), &mut out)
        } else {
            encoder.encode_to_vec(InterleavedPcm(chunk), &mut out)
        };
        res.map_err(|e| anyhow!("MP3 encoding failed: {:?}", e))?;
    }

    out.reserve(FLUSH_RESERVE);
    encoder
        .flush_to_vec::<FlushNoGap>(&mut out)
        .map_err(|e| anyhow!("Failed to flush MP3 encoder: {:?}", e))?;

    Ok(out)
}

/// Encode and write the stream to `dest`, returning its size in bytes.
pub fn encode_mp3_file(
    samples: &[f32],
    sample_rate: u32,
    channels: usize,
    dest: &Path,
) -> Result<u64> {
    let bytes = encode_mp3(samples, sample_rate, channels)?;
    std::fs::write(dest, &bytes)
        .with_context(|| format!("Failed to write encoded audio to {}", dest.display()))?;
    Ok(bytes.len() as u64)
}
