//! Test tone generation.

use std::f64::consts::TAU;
use std::str::FromStr;

use sizzle_core::Error;

/// Periodic waveform shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Waveform {
    #[default]
    Sine,
    Square,
    Sawtooth,
}

impl Waveform {
    /// Value at `phase` (in cycles, wrapped to [0, 1)).
    fn value(self, phase: f64) -> f64 {
        match self {
            Self::Sine => (TAU * phase).sin(),
            Self::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Self::Sawtooth => 2.0 * phase - 1.0,
        }
    }
}

impl FromStr for Waveform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sine" | "sin" => Ok(Self::Sine),
            "square" | "sq" => Ok(Self::Square),
            "sawtooth" | "saw" => Ok(Self::Sawtooth),
            other => Err(Error::InvalidArgument(format!("unknown waveform: {other}"))),
        }
    }
}

/// Interleaved tone with the same value on every channel.
///
/// `amplitude` is clamped to [0, 1].
pub fn tone(
    waveform: Waveform,
    frequency: f64,
    seconds: f64,
    sample_rate: u32,
    channels: u16,
    amplitude: f32,
) -> Vec<f32> {
    if sample_rate == 0 || channels == 0 || seconds.is_nan() || seconds <= 0.0 {
        return Vec::new();
    }

    let frames = (seconds * f64::from(sample_rate)).round() as usize;
    let amplitude = f64::from(amplitude.clamp(0.0, 1.0));
    let step = frequency / f64::from(sample_rate);

    let mut samples = Vec::with_capacity(frames * usize::from(channels));
    for frame in 0..frames {
        let phase = (frame as f64 * step).rem_euclid(1.0);
        let value = (waveform.value(phase) * amplitude) as f32;
        samples.extend(std::iter::repeat(value).take(usize::from(channels)));
    }
    samples
}
