//! Real-time render path.
//!
//! `Renderer::render` runs on the backend's audio thread. It never blocks,
//! allocates, or returns an error: anything unexpected degrades to silence.

use std::sync::Arc;

use crossbeam_channel::Sender;
use sizzle_core::AudioFile;

use crate::engine::EngineEvent;
use crate::transport::Transport;

/// Callback context handed to an output stream.
///
/// Holds the decoded buffer the stream was opened for; the engine closes the
/// stream before it swaps in a new buffer.
pub struct Renderer {
    audio: Arc<AudioFile>,
    transport: Arc<Transport>,
    events: Sender<EngineEvent>,
}

impl Renderer {
    pub fn new(
        audio: Arc<AudioFile>,
        transport: Arc<Transport>,
        events: Sender<EngineEvent>,
    ) -> Self {
        Self {
            audio,
            transport,
            events,
        }
    }

    pub fn channels(&self) -> u16 {
        self.audio.format.channels
    }

    /// Handle for reporting backend failures from outside the callback.
    pub fn error_reporter(&self) -> ErrorReporter {
        ErrorReporter {
            events: self.events.clone(),
        }
    }

    /// Fill `out` with interleaved frames and advance the transport.
    pub fn render(&self, out: &mut [f32]) {
        let channels = usize::from(self.audio.format.channels);
        let total_frames = self.audio.total_frames;
        let source = self.audio.decoded.samples.as_slice();

        if channels == 0 || total_frames == 0 || source.is_empty() {
            out.fill(0.0);
            return;
        }
        if !self.transport.is_playing() {
            out.fill(0.0);
            return;
        }

        let frames = out.len() / channels;
        let started_at = self.transport.position_frames();
        let mut frame = started_at;
        let wrap_at = self.transport.wrap_point(total_frames);
        // Cleared once the loop count is spent; playback then runs past the
        // loop end to the end of the buffer.
        let mut may_wrap = true;

        for index in 0..frames {
            if may_wrap && frame >= wrap_at {
                if let Some((start, played)) = self.transport.try_wrap(wrap_at) {
                    frame = start;
                    let _ = self.events.try_send(EngineEvent::Looped(played));
                } else {
                    may_wrap = false;
                }
            }
            if frame >= total_frames {
                out[index * channels..].fill(0.0);
                self.transport.commit_frame(started_at, frame);
                if self.transport.finish() {
                    let _ = self.events.try_send(EngineEvent::PlaybackFinished);
                }
                return;
            }

            let dst = &mut out[index * channels..(index + 1) * channels];
            let src_start = frame as usize * channels;
            match source.get(src_start..src_start + channels) {
                Some(src) => dst.copy_from_slice(src),
                None => dst.fill(0.0),
            }
            frame += 1;
        }

        // Partial trailing frame.
        out[frames * channels..].fill(0.0);
        self.transport.commit_frame(started_at, frame);
    }
}

/// Forwards backend errors to the engine's event queue.
#[derive(Clone)]
pub struct ErrorReporter {
    events: Sender<EngineEvent>,
}

impl ErrorReporter {
    pub fn report(&self, message: String) {
        let _ = self.events.try_send(EngineEvent::Error(message));
    }
}
