//! Audio output backends.
//!
//! A backend opens one stream per loaded buffer. The stream pulls audio
//! through a [`Renderer`] from whatever thread the backend drives it on.

mod device;
mod headless;

pub use device::{default_device_name, list_output_devices, CpalBackend};
pub use headless::HeadlessBackend;

use crate::render::Renderer;
use sizzle_core::Result;

/// Parameters for opening an output stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamRequest {
    pub sample_rate: u32,
    pub channels: u16,
    /// Frames per callback; `None` lets the backend choose.
    pub buffer_frames: Option<u32>,
    /// Output device name; `None` selects the default device.
    pub device: Option<String>,
}

/// Something that can open output streams.
pub trait OutputBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Open a stream that renders through `renderer`. The stream starts paused.
    fn open(&self, request: &StreamRequest, renderer: Renderer) -> Result<Box<dyn OutputStream>>;
}

/// An open output stream. Dropping it closes the stream.
pub trait OutputStream: Send {
    fn start(&mut self) -> Result<()>;

    fn stop(&mut self) -> Result<()>;

    /// Name of the device the stream is bound to.
    fn device_name(&self) -> &str;
}
