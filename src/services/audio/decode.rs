//! MP3 decoding to interleaved f32 PCM via symphonia.

use anyhow::{Context, Result, anyhow, bail};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_MP3, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

/// One fully decoded segment
#[derive(Debug, Clone)]
pub struct DecodedSegment {
    /// Interleaved samples in [-1.0, 1.0]
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: usize,
}

impl DecodedSegment {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels
        }
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.frames() as f64 / self.sample_rate as f64
        }
    }
}

/// Decode an MP3 file completely.
///
/// Any probe, codec or packet error fails the whole file. A stream whose
/// format changes mid-way is rejected.
pub fn decode_mp3(path: &Path) -> Result<DecodedSegment> {
    debug!(path = %path.display(), "Decoding MP3");

    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open audio file: {}", path.display()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    hint.with_extension("mp3");

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| anyhow!("Failed to probe {} as MP3: {}", path.display(), e))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec == CODEC_TYPE_MP3)
        .ok_or_else(|| anyhow!("No MP3 audio track found in {}", path.display()))?;
    let track_id = track.id;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| anyhow!("Failed to create MP3 decoder for {}: {}", path.display(), e))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut layout: Option<(u32, usize)> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => bail!("Error reading packet from {}: {}", path.display(), e),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder
            .decode(&packet)
            .map_err(|e| anyhow!("Failed to decode {}: {}", path.display(), e))?;

        let spec = *decoded.spec();
        let current = (spec.rate, spec.channels.count());
        match layout {
            None => layout = Some(current),
            Some(first) if first != current => bail!(
                "Audio format changed mid-stream in {} ({} Hz/{} ch -> {} Hz/{} ch)",
                path.display(),
                first.0,
                first.1,
                current.0,
                current.1
            ),
            Some(_) => {}
        }

        // MP3 packets never exceed the decoder's initial capacity
        let buf = sample_buf
            .get_or_insert_with(|| SampleBuffer::<f32>::new(decoded.capacity() as u64, spec));
        buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buf.samples());
    }

    let (sample_rate, channels) =
        layout.ok_or_else(|| anyhow!("No audio frames decoded from {}", path.display()))?;

    let segment = DecodedSegment {
        samples,
        sample_rate,
        channels,
    };

    debug!(
        path = %path.display(),
        sample_rate,
        channels,
        frames = segment.frames(),
        duration_seconds = format!("{:.3}", segment.duration_seconds()),
        "MP3 decoding complete"
    );

    Ok(segment)
}
