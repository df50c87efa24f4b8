//! Output backend without hardware.
//!
//! The caller plays the part of the audio thread by calling
//! [`HeadlessBackend::pump`]. Used by tests and by tooling that renders
//! offline.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use sizzle_core::{Error, Result};
use tracing::debug;

use super::{OutputBackend, OutputStream, StreamRequest};
use crate::render::Renderer;

const DEVICE_NAME: &str = "headless";

#[derive(Default)]
struct Shared {
    active: Mutex<Option<ActiveStream>>,
    next_id: AtomicU64,
    opened: AtomicUsize,
    fail_opens: AtomicBool,
}

struct ActiveStream {
    id: u64,
    request: StreamRequest,
    renderer: Renderer,
    running: bool,
}

/// Backend whose callback is driven by hand.
///
/// Clones share the same stream slot, so a test can keep one handle while
/// the engine owns another.
#[derive(Clone, Default)]
pub struct HeadlessBackend {
    shared: Arc<Shared>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `open` fail until cleared.
    pub fn fail_opens(&self, fail: bool) {
        self.shared.fail_opens.store(fail, Ordering::Release);
    }

    /// Run one callback of `frames` frames.
    ///
    /// Returns `None` if no stream is open and running, which is when real
    /// hardware would not call back either.
    pub fn pump(&self, frames: usize) -> Option<Vec<f32>> {
        let active = self.shared.active.lock();
        let stream = active.as_ref().filter(|s| s.running)?;
        let mut out = vec![0.0; frames * usize::from(stream.renderer.channels())];
        stream.renderer.render(&mut out);
        Some(out)
    }

    /// Streams opened over the backend's lifetime.
    pub fn streams_opened(&self) -> usize {
        self.shared.opened.load(Ordering::Acquire)
    }

    pub fn is_open(&self) -> bool {
        self.shared.active.lock().is_some()
    }

    pub fn is_running(&self) -> bool {
        self.shared.active.lock().as_ref().is_some_and(|s| s.running)
    }

    /// Request the open stream was created with.
    pub fn request(&self) -> Option<StreamRequest> {
        self.shared.active.lock().as_ref().map(|s| s.request.clone())
    }
}

impl OutputBackend for HeadlessBackend {
    fn name(&self) -> &str {
        DEVICE_NAME
    }

    fn open(&self, request: &StreamRequest, renderer: Renderer) -> Result<Box<dyn OutputStream>> {
        if self.shared.fail_opens.load(Ordering::Acquire) {
            return Err(Error::Backend("Headless output refused to open".to_string()));
        }

        let id = self.shared.next_id.fetch_add(1, Ordering::AcqRel);
        *self.shared.active.lock() = Some(ActiveStream {
            id,
            request: request.clone(),
            renderer,
            running: false,
        });
        self.shared.opened.fetch_add(1, Ordering::AcqRel);
        debug!(
            "Opened headless stream {id}: {}Hz, {} channels",
            request.sample_rate, request.channels
        );

        Ok(Box::new(HeadlessStream {
            shared: Arc::clone(&self.shared),
            id,
        }))
    }
}

struct HeadlessStream {
    shared: Arc<Shared>,
    id: u64,
}

impl HeadlessStream {
    fn set_running(&self, running: bool) -> Result<()> {
        let mut active = self.shared.active.lock();
        match active.as_mut() {
            Some(stream) if stream.id == self.id => {
                stream.running = running;
                Ok(())
            }
            _ => Err(Error::Backend("Headless stream was replaced".to_string())),
        }
    }
}

impl OutputStream for HeadlessStream {
    fn start(&mut self) -> Result<()> {
        self.set_running(true)
    }

    fn stop(&mut self) -> Result<()> {
        self.set_running(false)
    }

    fn device_name(&self) -> &str {
        DEVICE_NAME
    }
}

impl Drop for HeadlessStream {
    fn drop(&mut self) {
        let mut active = self.shared.active.lock();
        if active.as_ref().is_some_and(|s| s.id == self.id) {
            *active = None;
            debug!("Closed headless stream {}", self.id);
        }
    }
}
