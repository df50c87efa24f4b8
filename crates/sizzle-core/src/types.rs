//! Core domain types for Sizzle.

pub mod audio;
pub mod metadata;
pub mod transport;

pub use audio::{Analysis, DecodedAudio, PlaybackFormat};
pub use metadata::{AudioFile, CodecInfo, FileInfo, Tags};
pub use transport::TransportState;
