//! Decoding of speech clips (WAV or MP3) into PCM plus a lip-sync envelope

use crate::error::SpeechError;
use agora_core::AmplitudeEnvelope;
use bytes::Bytes;
use std::io::Cursor;
use std::time::Duration;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

/// Interleaved f32 PCM of a whole clip
#[derive(Debug, Clone)]
pub struct DecodedClip {
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
    pub duration: Duration,
    pub envelope: AmplitudeEnvelope,
}

impl DecodedClip {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }
}

/// Decode a complete audio container held in memory.
///
/// Duration comes from the decoded frame count, falling back to the
/// container's declared frame count when no packet decodes.
pub fn decode_clip(bytes: Bytes, envelope_window: Duration) -> Result<DecodedClip, SpeechError> {
    if bytes.is_empty() {
        return Err(SpeechError::Decode("empty audio payload".to_string()));
    }

    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());
    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| SpeechError::Decode(format!("unrecognized audio container: {}", e)))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| SpeechError::Decode("no decodable audio track".to_string()))?;
    let track_id = track.id;
    let declared_frames = track.codec_params.n_frames;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| SpeechError::Decode(format!("unsupported codec: {}", e)))?;

    let mut samples: Vec<f32> = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(SpeechError::Decode(e.to_string())),
        };
        if packet.track_id() != track_id {
            continue;
        }
        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate = spec.rate;
                channels = spec.channels.count() as u16;
                let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buf.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buf.samples());
            }
            Err(SymphoniaError::DecodeError(e)) => {
                debug!(error = %e, "skipping undecodable packet");
            }
            Err(e) => return Err(SpeechError::Decode(e.to_string())),
        }
    }

    if sample_rate == 0 {
        return Err(SpeechError::Decode("unknown sample rate".to_string()));
    }
    let channels = channels.max(1);

    let decoded_frames = samples.len() / channels as usize;
    let frames = if decoded_frames > 0 {
        decoded_frames as u64
    } else {
        declared_frames.unwrap_or(0)
    };
    let duration = Duration::from_secs_f64(frames as f64 / f64::from(sample_rate));
    let envelope = rms_envelope(&samples, channels, sample_rate, envelope_window);

    debug!(
        sample_rate,
        channels,
        duration_ms = duration.as_millis() as u64,
        "decoded clip"
    );

    Ok(DecodedClip {
        samples,
        channels,
        sample_rate,
        duration,
        envelope,
    })
}

/// RMS loudness of each `window` of interleaved samples
fn rms_envelope(samples: &[f32], channels: u16, sample_rate: u32, window: Duration) -> AmplitudeEnvelope {
    let frames_per_window = ((f64::from(sample_rate) * window.as_secs_f64()).round() as usize).max(1);
    let chunk = frames_per_window * channels.max(1) as usize;
    let levels = samples
        .chunks(chunk)
        .map(|c| {
            let sum: f32 = c.iter().map(|s| s * s).sum();
            (sum / c.len() as f32).sqrt()
        })
        .collect();
    AmplitudeEnvelope::from_levels(window, levels)
}
