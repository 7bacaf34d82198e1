//! Minimal WAV encode/parse helpers.
//!
//! Backends that produce raw PCM (the worker, espeak's `--stdout`) and the
//! result-stamping code both need a small amount of RIFF plumbing; a full
//! audio crate is not warranted for a 44-byte header.

use std::io::Write;
use std::time::Duration;

/// Encode mono f32 PCM to a 16-bit PCM WAV byte buffer.
#[must_use]
pub fn encode_pcm16(samples: &[f32], sample_rate: u32) -> Vec<u8> {
    let data_len = samples.len() * 2;
    let file_len = 44 + data_len as u32;

    let mut buf = Vec::with_capacity(44 + data_len);
    // Writes to a Vec cannot fail.
    let _ = buf.write_all(b"RIFF");
    let _ = buf.write_all(&(file_len - 8).to_le_bytes());
    let _ = buf.write_all(b"WAVE");
    let _ = buf.write_all(b"fmt ");
    let _ = buf.write_all(&16u32.to_le_bytes());
    let _ = buf.write_all(&1u16.to_le_bytes()); // PCM
    let _ = buf.write_all(&1u16.to_le_bytes()); // mono
    let _ = buf.write_all(&sample_rate.to_le_bytes());
    let _ = buf.write_all(&(sample_rate * 2).to_le_bytes()); // byte rate
    let _ = buf.write_all(&2u16.to_le_bytes()); // block align
    let _ = buf.write_all(&16u16.to_le_bytes()); // bits per sample
    let _ = buf.write_all(b"data");
    let _ = buf.write_all(&(data_len as u32).to_le_bytes());
    for &s in samples {
        let clamped = s.clamp(-1.0, 1.0);
        #[allow(clippy::cast_possible_truncation)]
        let i = (clamped * 32767.0).round() as i16;
        let _ = buf.write_all(&i.to_le_bytes());
    }
    buf
}

/// Header facts parsed from a WAV buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavInfo {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    /// Length of the `data` chunk in bytes.
    pub data_len: u32,
}

impl WavInfo {
    /// Parse the RIFF header of `bytes`. Returns `None` for anything that
    /// is not a PCM WAV with a locatable `data` chunk.
    #[must_use]
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 44 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
            return None;
        }

        let mut sample_rate = None;
        let mut channels = None;
        let mut bits_per_sample = None;

        // Walk chunks; `fmt ` is not guaranteed to sit at offset 12.
        let mut pos = 12;
        while pos + 8 <= bytes.len() {
            let id = &bytes[pos..pos + 4];
            let size = u32::from_le_bytes(bytes[pos + 4..pos + 8].try_into().ok()?) as usize;
            let body = pos + 8;

            match id {
                b"fmt " if body + 16 <= bytes.len() => {
                    channels = Some(u16::from_le_bytes(
                        bytes[body + 2..body + 4].try_into().ok()?,
                    ));
                    sample_rate = Some(u32::from_le_bytes(
                        bytes[body + 4..body + 8].try_into().ok()?,
                    ));
                    bits_per_sample = Some(u16::from_le_bytes(
                        bytes[body + 14..body + 16].try_into().ok()?,
                    ));
                }
                b"data" => {
                    return Some(Self {
                        sample_rate: sample_rate?,
                        channels: channels?,
                        bits_per_sample: bits_per_sample?,
                        data_len: u32::try_from(size).ok()?,
                    });
                }
                _ => {}
            }

            // Chunks are word-aligned.
            pos = body + size + (size % 2);
        }
        None
    }

    /// Playable duration implied by the header.
    #[must_use]
    pub fn duration(&self) -> Duration {
        let bytes_per_sec =
            u64::from(self.sample_rate) * u64::from(self.channels) * u64::from(self.bits_per_sample)
                / 8;
        if bytes_per_sec == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(u64::from(self.data_len) * 1_000_000 / bytes_per_sec)
    }
}
