//! PCM sample conversion and signal statistics.
//!
//! Every decoder here is a pure function over a little-endian byte buffer.

use sizzle_core::{Analysis, Error, Result};

use sizzle_core::types::audio::CLIP_THRESHOLD;

/// WAVE format code for integer PCM.
pub const WAVE_FORMAT_PCM: u16 = 1;
/// WAVE format code for IEEE float samples.
pub const WAVE_FORMAT_IEEE_FLOAT: u16 = 3;

/// Raw sample layout inside a data chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// Unsigned 8-bit, midpoint 128.
    U8,
    I16,
    /// Packed three byte signed integer.
    I24,
    I32,
    F32,
}

impl SampleFormat {
    /// Integer PCM layout for a bit depth.
    pub fn from_bits(bits_per_sample: u16) -> Result<Self> {
        match bits_per_sample {
            8 => Ok(Self::U8),
            16 => Ok(Self::I16),
            24 => Ok(Self::I24),
            32 => Ok(Self::I32),
            other => Err(Error::UnsupportedFormat(format!(
                "{other} bits per sample"
            ))),
        }
    }

    /// Layout for a `fmt ` chunk's format code and bit depth.
    ///
    /// Only IEEE float at 32 bits selects `F32`; every other code decodes as
    /// integer PCM.
    pub fn from_wave_format(format_code: u16, bits_per_sample: u16) -> Result<Self> {
        let format = Self::from_bits(bits_per_sample)?;
        if format_code == WAVE_FORMAT_IEEE_FLOAT && format == Self::I32 {
            return Ok(Self::F32);
        }
        Ok(format)
    }

    pub const fn bytes_per_sample(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::I16 => 2,
            Self::I24 => 3,
            Self::I32 | Self::F32 => 4,
        }
    }

    /// Decode one sample from exactly `bytes_per_sample()` bytes.
    fn decode_one(self, b: &[u8]) -> f32 {
        match self {
            Self::U8 => (f32::from(b[0]) - 128.0) / 128.0,
            Self::I16 => f32::from(i16::from_le_bytes([b[0], b[1]])) / 32_768.0,
            Self::I24 => {
                // Shift into the top bytes and back to sign extend bit 23.
                let v = i32::from_le_bytes([0, b[0], b[1], b[2]]) >> 8;
                v as f32 / 8_388_608.0
            }
            Self::I32 => i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f32 / 2_147_483_648.0,
            Self::F32 => {
                let v = f32::from_le_bytes([b[0], b[1], b[2], b[3]]);
                // Float data is not range-limited on disk.
                if v.is_finite() {
                    v.clamp(-1.0, 1.0)
                } else {
                    0.0
                }
            }
        }
    }
}

/// Decode `frames * channels` interleaved samples.
///
/// Stops early if `bytes` holds fewer samples than requested.
pub fn decode_samples(bytes: &[u8], format: SampleFormat, frames: u64, channels: u16) -> Vec<f32> {
    let wanted = usize::try_from(frames)
        .unwrap_or(usize::MAX)
        .saturating_mul(usize::from(channels));
    let width = format.bytes_per_sample();
    let count = wanted.min(bytes.len() / width);

    bytes
        .chunks_exact(width)
        .take(count)
        .map(|b| format.decode_one(b))
        .collect()
}

/// Number of whole frames in a data chunk. A trailing partial frame is ignored.
pub fn frame_count(data_len: usize, format: SampleFormat, channels: u16) -> u64 {
    let frame_bytes = format.bytes_per_sample() * usize::from(channels);
    if frame_bytes == 0 {
        return 0;
    }
    (data_len / frame_bytes) as u64
}

/// Single pass min/max/RMS scan.
pub fn analyze(samples: &[f32]) -> Analysis {
    if samples.is_empty() {
        return Analysis::default();
    }

    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    let mut sum_sq = 0.0f64;
    for &s in samples {
        min = min.min(s);
        max = max.max(s);
        sum_sq += f64::from(s) * f64::from(s);
    }

    let rms = (sum_sq / samples.len() as f64).sqrt() as f32;
    Analysis {
        min_amplitude: min,
        max_amplitude: max,
        rms_amplitude: rms,
        clipping_detected: max >= CLIP_THRESHOLD || min <= -CLIP_THRESHOLD,
    }
}
