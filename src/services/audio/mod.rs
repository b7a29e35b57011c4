//! Audio concatenation engine.
//!
//! Decodes staged MP3 fragments, aligns them to a common channel layout and
//! sample rate (the widest of the inputs), appends them in request order and
//! re-encodes the result as a single 128 kbps MP3.

pub mod decode;
pub mod encode;
pub mod resample;

use anyhow::{Result, bail};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::services::staging::StagedFile;
use decode::{DecodedSegment, decode_mp3};
use encode::{OUTPUT_BITRATE_KBPS, encode_mp3_file};

pub struct AudioSummary {
    pub path: PathBuf,
    pub sample_rate: u32,
    pub channels: usize,
    pub frames: usize,
    pub duration_seconds: f64,
    pub bytes: u64,
}

pub struct AudioConcatenator;

impl AudioConcatenator {
    /// Join every staged file, in order, into one MP3 at `dest`.
    ///
    /// Segments are appended sample for sample: no crossfade, no gain change.
    pub fn concatenate(staged: &[StagedFile], dest: &Path) -> Result<AudioSummary> {
        if staged.is_empty() {
            bail!("Cannot concatenate an empty list of audio files");
        }

        let mut segments = Vec::with_capacity(staged.len());
        for file in staged {
            let segment = decode_mp3(&file.local_path)
                .map_err(|e| e.context(format!("Failed to decode {}", file.source_key)))?;
            debug!(
                "Decoded {}: {} Hz, {} ch, {:.3}s",
                file.source_key,
                segment.sample_rate,
                segment.channels,
                segment.duration_seconds()
            );
            segments.push(segment);
        }

        let combined = Self::join(segments)?;

        let bytes = encode_mp3_file(
            &combined.samples,
            combined.sample_rate,
            combined.channels,
            dest,
        )?;

        info!(
            "🎵 Encoded {:.3}s of audio ({} Hz, {} ch) at {} kbps, {} bytes",
            combined.duration_seconds(),
            combined.sample_rate,
            combined.channels,
            OUTPUT_BITRATE_KBPS,
            bytes
        );

        Ok(AudioSummary {
            path: dest.to_path_buf(),
            sample_rate: combined.sample_rate,
            channels: combined.channels,
            frames: combined.frames(),
            duration_seconds: combined.duration_seconds(),
            bytes,
        })
    }

    /// Bring every segment to the widest channel count and highest sample rate,
    /// then append them in order.
    pub fn join(segments: Vec<DecodedSegment>) -> Result<DecodedSegment> {
        let Some(sample_rate) = segments.iter().map(|s| s.sample_rate).max() else {
            bail!("Cannot join an empty list of audio segments");
        };
        let channels = segments.iter().map(|s| s.channels).max().unwrap_or(1);

        let output_frames: usize = segments
            .iter()
            .map(|s| {
                (s.frames() as u64 * sample_rate as u64 / s.sample_rate.max(1) as u64) as usize
            })
            .sum();
        let mut samples = Vec::with_capacity(output_frames * channels);

        for segment in segments {
            let widened = resample::upmix(segment.samples, segment.channels, channels)?;
            let aligned = resample::resample(widened, segment.sample_rate, sample_rate, channels)?;
            samples.extend_from_slice(&aligned);
        }

        Ok(DecodedSegment {
            samples,
            sample_rate,
            channels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(value: f32, frames: usize, sample_rate: u32, channels: usize) -> DecodedSegment {
        DecodedSegment {
            samples: vec![value; frames * channels],
            sample_rate,
            channels,
        }
    }

    #[test]
    fn test_join_appends_in_order() {
        let joined = AudioConcatenator::join(vec![
            segment(0.5, 3, 44_100, 1),
            segment(-0.5, 2, 44_100, 1),
        ])
        .unwrap();
        assert_eq!(joined.channels, 1);
        assert_eq!(joined.samples, vec![0.5, 0.5, 0.5, -0.5, -0.5]);
    }

    #[test]
    fn test_join_widens_mono_to_stereo() {
        let joined = AudioConcatenator::join(vec![
            segment(0.25, 2, 44_100, 1),
            segment(0.75, 1, 44_100, 2),
        ])
        .unwrap();
        assert_eq!(joined.channels, 2);
        assert_eq!(joined.samples, vec![0.25, 0.25, 0.25, 0.25, 0.75, 0.75]);
    }

    #[test]
    fn test_join_reserves_output_size_only() {
        let joined = AudioConcatenator::join(vec![
            segment(0.2, 100, 44_100, 2),
            segment(0.4, 50, 44_100, 1),
        ])
        .unwrap();
        assert_eq!(joined.samples.len(), 300);
        assert_eq!(joined.samples.capacity(), 300);
    }

    #[test]
    fn test_join_uses_highest_sample_rate() {
        let joined = AudioConcatenator::join(vec![
            segment(0.1, 22_050, 22_050, 1),
            segment(0.1, 44_100, 44_100, 1),
        ])
        .unwrap();
        assert_eq!(joined.sample_rate, 44_100);
        assert!((joined.duration_seconds() - 2.0).abs() < 0.05);
    }

    #[test]
    fn test_empty_input_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AudioConcatenator::concatenate(&[], &dir.path().join("out.mp3")).is_err());
        assert!(AudioConcatenator::join(Vec::new()).is_err());
    }
}
