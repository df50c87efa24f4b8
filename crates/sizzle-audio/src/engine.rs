//! Playback engine coordinating decode, transport, and output.
//!
//! Control methods run on the caller's thread. Only `play` opening a stream
//! and a reload or drop closing one take the stream mutex; everything else
//! goes through the [`Transport`] atomics. The render callback only touches
//! those atomics and the immutable buffer it was opened with.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::{Mutex, RwLock};
use sizzle_core::{AudioFile, DecodedAudio, Error, PlaybackFormat, Result, TransportState};
use tracing::{debug, error, info, trace, warn};

use crate::codec;
use crate::output::{CpalBackend, OutputBackend, OutputStream, StreamRequest};
use crate::render::Renderer;
use crate::transport::Transport;
use crate::wav;

/// Queue depth for engine events. Events beyond it are dropped.
const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Engine settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Output device name; `None` uses the host default.
    pub device: Option<String>,
    /// Frames per callback; `None` lets the backend choose.
    pub buffer_frames: Option<u32>,
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            device: None,
            buffer_frames: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// Events emitted by the engine and its render callback.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A control call changed the transport state.
    StateChanged(TransportState),
    /// A new buffer replaced the old one.
    TrackLoaded { duration: f64 },
    /// Playback wrapped; carries the number of wraps so far.
    Looped(u32),
    /// Playback ran off the end and stopped.
    PlaybackFinished,
    /// The output reported a problem.
    Error(String),
}

/// WAV playback engine.
pub struct AudioEngine {
    transport: Arc<Transport>,
    /// Held only to open or close the stream. A reload swaps `audio` while
    /// holding it, so no stream outlives the buffer it renders.
    stream: Mutex<Option<Box<dyn OutputStream>>>,
    /// Written only with `stream` held.
    audio: RwLock<Option<Arc<AudioFile>>>,
    backend: Arc<dyn OutputBackend>,
    config: EngineConfig,
    event_tx: Sender<EngineEvent>,
    event_rx: Receiver<EngineEvent>,
}

impl AudioEngine {
    /// Engine on the system's audio hardware.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let backend: Arc<dyn OutputBackend> = Arc::new(CpalBackend::new());
        Ok(Self::with_backend(backend, config))
    }

    pub fn with_backend(backend: Arc<dyn OutputBackend>, config: EngineConfig) -> Self {
        let (event_tx, event_rx) = bounded(config.event_capacity.max(1));
        info!("Audio engine created ({} backend)", backend.name());

        Self {
            transport: Arc::new(Transport::new()),
            stream: Mutex::new(None),
            audio: RwLock::new(None),
            backend,
            config,
            event_tx,
            event_rx,
        }
    }

    /// Decode a WAV file and make it the current buffer.
    ///
    /// On failure the previous buffer and transport state are untouched.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let audio = wav::decode_file(path).inspect_err(|e| {
            warn!("Failed to load {}: {e}", path.display());
        })?;
        self.install(audio);
        Ok(())
    }

    /// Decode an in-memory WAV image.
    pub fn load_bytes(&self, data: &[u8]) -> Result<()> {
        let audio = wav::decode_bytes(data).inspect_err(|e| {
            warn!("Failed to decode WAV data: {e}");
        })?;
        self.install(audio);
        Ok(())
    }

    /// Load interleaved float samples directly.
    pub fn load_samples(&self, samples: Vec<f32>, channels: u16, sample_rate: u32) -> Result<()> {
        if channels == 0 {
            return Err(Error::InvalidArgument("channels must be non-zero".to_string()));
        }
        if sample_rate == 0 {
            return Err(Error::InvalidArgument("sample rate must be non-zero".to_string()));
        }

        let decoded = DecodedAudio::from_interleaved(samples, channels);
        let mut audio = AudioFile::from_samples(decoded, sample_rate, channels);
        audio.analysis = codec::analyze(&audio.decoded.samples);
        self.install(audio);
        Ok(())
    }

    fn install(&self, audio: AudioFile) {
        let duration = audio.format.duration_seconds;
        let previous = self.transport.state();

        {
            let mut stream = self.stream.lock();
            // The old stream must be gone before its buffer is released.
            Self::close_stream(&mut stream);
            self.transport.reset(&audio.format, audio.total_frames);
            *self.audio.write() = Some(Arc::new(audio));
        }

        info!("Loaded buffer ({duration:.2}s)");
        if previous != TransportState::Stopped {
            self.emit(EngineEvent::StateChanged(TransportState::Stopped));
        }
        self.emit(EngineEvent::TrackLoaded { duration });
    }

    fn close_stream(slot: &mut Option<Box<dyn OutputStream>>) {
        if let Some(mut stream) = slot.take() {
            if let Err(e) = stream.stop() {
                warn!("Failed to stop output stream: {e}");
            }
            drop(stream);
            debug!("Output stream closed");
        }
    }

    /// Start playback, opening the output stream on first use.
    ///
    /// Playing again after running off the end starts from the beginning; a
    /// position set while stopped is honored otherwise.
    pub fn play(&self) -> Result<()> {
        if self.transport.state() == TransportState::Playing {
            return Ok(());
        }

        let mut slot = self.stream.lock();
        let audio = self
            .audio
            .read()
            .clone()
            .filter(|a| a.has_decoded_data() && a.format.is_playable())
            .ok_or(Error::NoData)?;

        if slot.is_none() {
            let request = StreamRequest {
                sample_rate: audio.sample_rate(),
                channels: audio.channels(),
                buffer_frames: self.config.buffer_frames,
                device: self.config.device.clone(),
            };
            let renderer = Renderer::new(audio, Arc::clone(&self.transport), self.event_tx.clone());
            let stream = self.backend.open(&request, renderer).inspect_err(|e| {
                error!("Failed to open output stream: {e}");
            })?;
            info!(
                "Opened output stream on {}: {}Hz, {} channels",
                stream.device_name(),
                request.sample_rate,
                request.channels
            );
            *slot = Some(stream);
        }

        self.transport.rewind_if_finished();
        let previous = self.transport.state();
        self.transport.set_state(TransportState::Playing);

        if let Some(stream) = slot.as_mut() {
            if let Err(e) = stream.start() {
                error!("Failed to start output stream: {e}");
                self.transport.set_state(TransportState::Stopped);
                return Err(e);
            }
        }
        drop(slot);

        debug!("Playback started from {:.3}s", self.transport.position_seconds());
        if previous != TransportState::Playing {
            self.emit(EngineEvent::StateChanged(TransportState::Playing));
        }
        Ok(())
    }

    /// Play and block until playback runs off the end.
    ///
    /// Returns `Ok(false)` if `timeout` passes or the engine is stopped or
    /// reloaded first. Playback is left running on timeout.
    pub fn play_to_end(&self, timeout: Duration) -> Result<bool> {
        // A finish left over from an earlier pass must not end this one.
        while self.event_rx.try_recv().is_ok() {}
        self.play()?;

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.event_rx.recv_timeout(remaining) {
                Ok(EngineEvent::PlaybackFinished) => return Ok(true),
                Ok(EngineEvent::StateChanged(TransportState::Stopped)) => return Ok(false),
                Ok(EngineEvent::Error(message)) => warn!("Output error: {message}"),
                Ok(_) => {}
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {
                    debug!("Gave up waiting for the end of playback");
                    return Ok(false);
                }
            }
        }
    }

    /// `Playing -> Paused`. The stream keeps running and renders silence.
    pub fn pause(&self) {
        if self.transport.pause() {
            debug!("Paused at {:.3}s", self.transport.position_seconds());
            self.emit(EngineEvent::StateChanged(TransportState::Paused));
        }
    }

    /// `Paused -> Playing`. Does nothing from `Stopped`; use [`Self::play`].
    pub fn resume(&self) {
        if self.transport.resume() {
            debug!("Resumed at {:.3}s", self.transport.position_seconds());
            self.emit(EngineEvent::StateChanged(TransportState::Playing));
        } else if self.transport.state() == TransportState::Stopped {
            debug!("Resume ignored while stopped");
        }
    }

    /// Stop playback and rewind to the beginning.
    ///
    /// The open stream renders silence from its next callback on and stays
    /// open, so the next `play` is cheap.
    pub fn stop(&self) {
        let previous = self.transport.state();
        self.transport.stop();

        if previous != TransportState::Stopped {
            debug!("Playback stopped");
            self.emit(EngineEvent::StateChanged(TransportState::Stopped));
        }
    }

    /// Move the play position. Clamped to the buffer; takes effect on the
    /// next callback.
    pub fn seek(&self, seconds: f64) -> Result<()> {
        if !self.transport.seek(seconds) {
            return Err(Error::NoData);
        }
        trace!("Seek to {:.3}s", self.transport.position_seconds());
        Ok(())
    }

    /// Enable or disable looping. Disabling resets the count to infinite.
    pub fn set_loop(&self, enabled: bool) {
        self.transport.set_loop(enabled);
        debug!("Looping {}", if enabled { "enabled" } else { "disabled" });
    }

    /// Replay `count` more times after the first pass; 0 loops forever.
    pub fn set_loop_count(&self, count: u32) {
        self.transport.set_loop_count(count);
        debug!("Loop count set to {count}");
    }

    /// Position a loop wrap returns to. Reset to 0 on every load.
    pub fn set_loop_start(&self, seconds: f64) -> Result<()> {
        if !self.transport.set_loop_start(seconds) {
            return Err(Error::NoData);
        }
        Ok(())
    }

    /// Loop between `start` and `end` seconds instead of the whole buffer.
    ///
    /// `end` is clamped to the duration and 0 means the end of the buffer. A
    /// `start` at or past `end` falls back to 0. Reset on every load.
    pub fn set_loop_region(&self, start: f64, end: f64) -> Result<()> {
        if !self.transport.set_loop_region(start, end) {
            return Err(Error::NoData);
        }
        debug!(
            "Loop region {:.3}s..{:.3}s",
            self.loop_start_seconds(),
            self.loop_end_seconds()
        );
        Ok(())
    }

    pub fn reset_loop_region(&self) {
        self.transport.reset_loop_region();
    }

    pub fn state(&self) -> TransportState {
        self.transport.state()
    }

    pub fn position_seconds(&self) -> f64 {
        self.transport.position_seconds()
    }

    pub fn duration_seconds(&self) -> f64 {
        self.transport.duration_seconds()
    }

    pub fn is_looping(&self) -> bool {
        self.transport.is_looping()
    }

    pub fn loop_count(&self) -> u32 {
        self.transport.loop_count()
    }

    pub fn played_loops(&self) -> u32 {
        self.transport.played_loops()
    }

    pub fn loop_start_seconds(&self) -> f64 {
        let sample_rate = self.transport.sample_rate();
        if sample_rate == 0 {
            return 0.0;
        }
        self.transport.loop_start_frame() as f64 / f64::from(sample_rate)
    }

    pub fn loop_end_seconds(&self) -> f64 {
        let sample_rate = self.transport.sample_rate();
        if sample_rate == 0 {
            return 0.0;
        }
        self.transport.loop_end_frame() as f64 / f64::from(sample_rate)
    }

    pub fn has_data(&self) -> bool {
        self.transport.has_data()
    }

    pub fn format(&self) -> Option<PlaybackFormat> {
        self.transport.has_data().then(|| {
            PlaybackFormat::new(
                self.transport.sample_rate(),
                self.transport.channels(),
                self.transport.total_frames(),
            )
        })
    }

    /// The loaded buffer with its container metadata.
    pub fn metadata(&self) -> Option<Arc<AudioFile>> {
        self.audio.read().clone()
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn try_recv_event(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_event_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    fn emit(&self, event: EngineEvent) {
        if self.event_tx.try_send(event).is_err() {
            trace!("Event queue full, dropping event");
        }
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.transport.stop();
        let mut stream = self.stream.lock();
        Self::close_stream(&mut stream);
        *self.audio.write() = None;
        debug!("Audio engine dropped");
    }
}
