//! Decoded sample buffers and the facts derived from them.

use serde::{Deserialize, Serialize};

/// Amplitude at or beyond which a sample counts as clipped.
pub const CLIP_THRESHOLD: f32 = 0.999;

/// Interleaved float samples normalized to [-1.0, 1.0].
///
/// Immutable once produced; a reload replaces it wholesale.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    /// Samples per channel.
    pub total_frames: u64,
}

impl DecodedAudio {
    /// Wrap an interleaved buffer, dropping a trailing partial frame.
    pub fn from_interleaved(mut samples: Vec<f32>, channels: u16) -> Self {
        if channels == 0 {
            return Self::default();
        }
        let channels = usize::from(channels);
        let total_frames = samples.len() / channels;
        samples.truncate(total_frames * channels);
        Self {
            samples,
            total_frames: total_frames as u64,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_frames == 0 || self.samples.is_empty()
    }
}

/// Stream parameters of a decoded buffer.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct PlaybackFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub duration_seconds: f64,
}

impl PlaybackFormat {
    pub fn new(sample_rate: u32, channels: u16, total_frames: u64) -> Self {
        let duration_seconds = if sample_rate == 0 {
            0.0
        } else {
            total_frames as f64 / f64::from(sample_rate)
        };
        Self {
            sample_rate,
            channels,
            duration_seconds,
        }
    }

    /// True if transport operations can run against this format.
    pub const fn is_playable(&self) -> bool {
        self.sample_rate > 0 && self.channels > 0
    }
}

/// Basic signal statistics, computed once at decode time.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Analysis {
    pub min_amplitude: f32,
    pub max_amplitude: f32,
    pub rms_amplitude: f32,
    pub clipping_detected: bool,
}

impl Analysis {
    /// Peak absolute amplitude.
    pub fn peak(&self) -> f32 {
        self.max_amplitude.abs().max(self.min_amplitude.abs())
    }
}
