//! # sizzle-audio
//!
//! Real-time WAV playback engine for Sizzle.
//!
//! Features:
//! - PCM codec for 8/16/24/32-bit integer and 32-bit float samples
//! - Streaming RIFF/WAVE parser
//! - Lock-free transport state shared with the render callback
//! - Low-latency cpal output, plus a headless backend for tests

pub mod codec;
pub mod engine;
pub mod generate;
pub mod output;
pub mod render;
pub mod subsystem;
pub mod transport;
pub mod wav;

pub use engine::{AudioEngine, EngineConfig, EngineEvent};
pub use output::{CpalBackend, HeadlessBackend, OutputBackend, OutputStream, StreamRequest};
pub use render::{ErrorReporter, Renderer};
pub use sizzle_core::TransportState;
pub use subsystem::{Subsystem, SubsystemGuard};
pub use transport::Transport;
