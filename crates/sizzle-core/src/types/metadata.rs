//! File, codec, and tag metadata attached to a decoded buffer.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::audio::{Analysis, DecodedAudio, PlaybackFormat};

/// Where a buffer came from.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileInfo {
    pub path: Option<PathBuf>,
    /// Container name, e.g. `"wav"`.
    pub format: String,
    pub size_bytes: u64,
}

/// Codec level facts reported by the container.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CodecInfo {
    pub codec_name: String,
    pub bitrate_kbps: u32,
    pub is_vbr: bool,
    pub format_code: u16,
    pub bits_per_sample: u16,
    pub block_align: u16,
    pub byte_rate: u32,
}

/// Text tags found in the container.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub year: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl Tags {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.artist.is_none()
            && self.album.is_none()
            && self.year.is_none()
            && self.extra.is_empty()
    }
}

/// A decoded buffer together with everything known about it.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct AudioFile {
    pub file: FileInfo,
    pub format: PlaybackFormat,
    pub codec: CodecInfo,
    #[serde(skip)]
    pub decoded: DecodedAudio,
    pub total_frames: u64,
    pub analysis: Analysis,
    #[serde(skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,
}

impl AudioFile {
    /// Build from an in-memory buffer with no container behind it.
    pub fn from_samples(decoded: DecodedAudio, sample_rate: u32, channels: u16) -> Self {
        let total_frames = decoded.total_frames;
        Self {
            file: FileInfo {
                path: None,
                format: "raw".to_string(),
                size_bytes: (decoded.samples.len() * std::mem::size_of::<f32>()) as u64,
            },
            format: PlaybackFormat::new(sample_rate, channels, total_frames),
            codec: CodecInfo {
                codec_name: "float".to_string(),
                bits_per_sample: 32,
                ..CodecInfo::default()
            },
            decoded,
            total_frames,
            analysis: Analysis::default(),
            tags: Tags::default(),
        }
    }

    /// True if the buffer holds at least one frame in a playable format.
    pub fn has_decoded_data(&self) -> bool {
        self.total_frames > 0 && self.format.channels > 0 && !self.decoded.samples.is_empty()
    }

    pub const fn channels(&self) -> u16 {
        self.format.channels
    }

    pub const fn sample_rate(&self) -> u32 {
        self.format.sample_rate
    }
}
