//! Lock-free transport state.
//!
//! Every field is an independent atomic. The control thread writes through
//! the public methods; the render callback reads the same fields and only
//! ever advances the position, counts loop wraps, and flags end-of-stream.
//! Readers may observe a torn combination of fields for up to one callback
//! period; nothing here locks.

use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, AtomicU64, AtomicU8, Ordering};

use sizzle_core::{PlaybackFormat, TransportState};

/// Atomic playback state shared with the render callback.
#[derive(Debug, Default)]
pub struct Transport {
    state: AtomicU8,
    current_frame: AtomicU64,
    loop_enabled: AtomicBool,
    /// 0 = loop forever.
    loop_count: AtomicU32,
    played_loops: AtomicU32,
    loop_start: AtomicU64,
    /// Exclusive; equals `total_frames` unless a region is set.
    loop_end: AtomicU64,
    sample_rate: AtomicU32,
    channels: AtomicU16,
    total_frames: AtomicU64,
}

impl Transport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopt a freshly loaded buffer. Loop settings survive the reload, the
    /// loop region does not.
    pub fn reset(&self, format: &PlaybackFormat, total_frames: u64) {
        self.sample_rate.store(format.sample_rate, Ordering::Release);
        self.channels.store(format.channels, Ordering::Release);
        self.total_frames.store(total_frames, Ordering::Release);

        self.state
            .store(TransportState::Stopped.as_u8(), Ordering::Release);
        self.current_frame.store(0, Ordering::Release);
        self.played_loops.store(0, Ordering::Release);
        self.loop_start.store(0, Ordering::Release);
        self.loop_end.store(total_frames, Ordering::Release);
    }

    pub fn state(&self) -> TransportState {
        TransportState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: TransportState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    /// Move from `from` to `to` only if the state is still `from`.
    pub fn transition(&self, from: TransportState, to: TransportState) -> bool {
        self.state
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// True if a buffer with at least one frame is loaded.
    pub fn has_data(&self) -> bool {
        self.total_frames.load(Ordering::Acquire) > 0 && self.channels.load(Ordering::Acquire) > 0
    }

    /// `Playing -> Paused`; no-op otherwise.
    pub fn pause(&self) -> bool {
        self.transition(TransportState::Playing, TransportState::Paused)
    }

    /// `Paused -> Playing`; no-op otherwise, including from `Stopped`.
    pub fn resume(&self) -> bool {
        self.transition(TransportState::Paused, TransportState::Playing)
    }

    /// Enter `Stopped` and rewind.
    pub fn stop(&self) {
        self.set_state(TransportState::Stopped);
        self.current_frame.store(0, Ordering::Release);
        self.played_loops.store(0, Ordering::Release);
    }

    /// Rewind a stopped transport that ran off the end, so replay starts over.
    pub fn rewind_if_finished(&self) -> bool {
        let total = self.total_frames.load(Ordering::Acquire);
        if self.state() == TransportState::Stopped
            && self.current_frame.load(Ordering::Acquire) >= total
        {
            self.current_frame.store(0, Ordering::Release);
            self.played_loops.store(0, Ordering::Release);
            return true;
        }
        false
    }

    /// Frame index for `seconds`, clamped to `[0, total_frames - 1]`.
    ///
    /// `None` without data or with a zero sample rate.
    pub fn frame_at(&self, seconds: f64) -> Option<u64> {
        let sample_rate = self.sample_rate.load(Ordering::Acquire);
        let total = self.total_frames.load(Ordering::Acquire);
        if !self.has_data() || sample_rate == 0 {
            return None;
        }
        // `as` saturates: negative and NaN land on 0.
        let target = (seconds * f64::from(sample_rate)) as u64;
        Some(target.min(total.saturating_sub(1)))
    }

    /// Store a new position; applied by the next callback.
    pub fn seek(&self, seconds: f64) -> bool {
        let Some(frame) = self.frame_at(seconds) else {
            return false;
        };
        self.current_frame.store(frame, Ordering::Release);
        true
    }

    /// Enable or disable looping. Disabling also resets the count to infinite.
    pub fn set_loop(&self, enabled: bool) {
        self.loop_enabled.store(enabled, Ordering::Release);
        if !enabled {
            self.loop_count.store(0, Ordering::Release);
        }
    }

    /// Loop `count` more times (0 = forever). Implies looping is enabled.
    pub fn set_loop_count(&self, count: u32) {
        self.loop_enabled.store(true, Ordering::Release);
        self.loop_count.store(count, Ordering::Release);
        self.played_loops.store(0, Ordering::Release);
    }

    /// Frame a loop wrap returns to. A start at or past the loop end falls
    /// back to 0.
    pub fn set_loop_start(&self, seconds: f64) -> bool {
        let Some(frame) = self.frame_at(seconds) else {
            return false;
        };
        let end = self.loop_end.load(Ordering::Acquire);
        self.loop_start
            .store(if frame < end { frame } else { 0 }, Ordering::Release);
        true
    }

    /// Loop between `start` and `end` seconds.
    ///
    /// The end is clamped to the buffer, and a zero end means the whole
    /// buffer. A start at or past the end falls back to 0.
    pub fn set_loop_region(&self, start: f64, end: f64) -> bool {
        let Some(start) = self.frame_at(start) else {
            return false;
        };
        let total = self.total_frames.load(Ordering::Acquire);
        let sample_rate = self.sample_rate.load(Ordering::Acquire);

        let end = ((end * f64::from(sample_rate)) as u64).min(total);
        let end = if end == 0 { total } else { end };
        let start = if start < end { start } else { 0 };

        self.loop_end.store(end, Ordering::Release);
        self.loop_start.store(start, Ordering::Release);
        true
    }

    /// Loop over the whole buffer again.
    pub fn reset_loop_region(&self) {
        self.loop_start.store(0, Ordering::Release);
        self.loop_end
            .store(self.total_frames.load(Ordering::Acquire), Ordering::Release);
    }

    pub fn position_frames(&self) -> u64 {
        self.current_frame.load(Ordering::Acquire)
    }

    pub fn position_seconds(&self) -> f64 {
        let sample_rate = self.sample_rate.load(Ordering::Acquire);
        if sample_rate == 0 {
            return 0.0;
        }
        self.position_frames() as f64 / f64::from(sample_rate)
    }

    pub fn duration_seconds(&self) -> f64 {
        let sample_rate = self.sample_rate.load(Ordering::Acquire);
        if sample_rate == 0 {
            return 0.0;
        }
        self.total_frames.load(Ordering::Acquire) as f64 / f64::from(sample_rate)
    }

    pub fn is_looping(&self) -> bool {
        self.loop_enabled.load(Ordering::Acquire)
    }

    pub fn loop_count(&self) -> u32 {
        self.loop_count.load(Ordering::Acquire)
    }

    pub fn played_loops(&self) -> u32 {
        self.played_loops.load(Ordering::Acquire)
    }

    pub fn loop_start_frame(&self) -> u64 {
        self.loop_start.load(Ordering::Acquire)
    }

    pub fn loop_end_frame(&self) -> u64 {
        self.loop_end.load(Ordering::Acquire)
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames.load(Ordering::Acquire)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.load(Ordering::Acquire)
    }

    pub fn channels(&self) -> u16 {
        self.channels.load(Ordering::Acquire)
    }

    // Render side. Called once per callback, never allocates.

    pub(crate) fn is_playing(&self) -> bool {
        self.state() == TransportState::Playing
    }

    /// Publish the position reached at the end of a buffer.
    ///
    /// Loses to a seek stored since `started_at` was read.
    pub(crate) fn commit_frame(&self, started_at: u64, reached: u64) {
        let _ = self.current_frame.compare_exchange(
            started_at,
            reached,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Frame at which playback wraps: the loop end while looping, otherwise
    /// the end of the buffer.
    pub(crate) fn wrap_point(&self, total_frames: u64) -> u64 {
        if !self.loop_enabled.load(Ordering::Acquire) {
            return total_frames;
        }
        match self.loop_end.load(Ordering::Acquire) {
            0 => total_frames,
            end => end.min(total_frames),
        }
    }

    /// Count a wrap if the loop settings allow one.
    ///
    /// Returns the frame to continue from and the number of wraps so far.
    /// `wrap_point` bounds the loop start.
    pub(crate) fn try_wrap(&self, wrap_point: u64) -> Option<(u64, u32)> {
        if !self.loop_enabled.load(Ordering::Acquire) {
            return None;
        }
        let limit = self.loop_count.load(Ordering::Acquire);
        if limit != 0 && self.played_loops.load(Ordering::Acquire) >= limit {
            return None;
        }

        let played = self.played_loops.fetch_add(1, Ordering::AcqRel) + 1;
        let start = self.loop_start.load(Ordering::Acquire);
        let start = if start < wrap_point { start } else { 0 };
        Some((start, played))
    }

    /// End-of-stream inside the callback. Only stops a transport that is
    /// still playing; a pause or stop issued meanwhile wins.
    pub(crate) fn finish(&self) -> bool {
        self.transition(TransportState::Playing, TransportState::Stopped)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]

    use super::*;

    fn loaded(sample_rate: u32, channels: u16, frames: u64) -> Transport {
        let transport = Transport::new();
        transport.reset(&PlaybackFormat::new(sample_rate, channels, frames), frames);
        transport
    }

    #[test]
    fn test_state_machine() {
        let transport = loaded(8000, 2, 8000);
        assert_eq!(transport.state(), TransportState::Stopped);

        // Nothing to pause or resume yet.
        assert!(!transport.pause());
        assert!(!transport.resume());
        assert_eq!(transport.state(), TransportState::Stopped);

        transport.set_state(TransportState::Playing);
        assert!(transport.pause());
        assert_eq!(transport.state(), TransportState::Paused);
        assert!(!transport.pause());

        assert!(transport.resume());
        assert_eq!(transport.state(), TransportState::Playing);

        transport.stop();
        assert_eq!(transport.state(), TransportState::Stopped);
    }

    #[test]
    fn test_seek_clamps() {
        let transport = loaded(8000, 2, 8000);

        assert!(transport.seek(0.5));
        assert_eq!(transport.position_frames(), 4000);
        assert_eq!(transport.position_seconds(), 0.5);

        transport.seek(10.0);
        assert_eq!(transport.position_frames(), 7999);
        assert!(transport.position_seconds() < transport.duration_seconds());

        transport.seek(-3.0);
        assert_eq!(transport.position_frames(), 0);

        transport.seek(f64::NAN);
        assert_eq!(transport.position_frames(), 0);
    }

    #[test]
    fn test_seek_without_data() {
        let transport = Transport::new();
        assert!(!transport.seek(1.0));
        assert_eq!(transport.position_seconds(), 0.0);
        assert_eq!(transport.duration_seconds(), 0.0);

        let silent_rate = loaded(0, 2, 100);
        assert!(!silent_rate.seek(0.0));
    }

    #[test]
    fn test_stop_resets_position_and_loops() {
        let transport = loaded(8000, 1, 8000);
        transport.set_loop_count(3);
        transport.seek(0.25);
        let _ = transport.try_wrap(8000);
        assert_eq!(transport.played_loops(), 1);

        transport.stop();
        assert_eq!(transport.position_frames(), 0);
        assert_eq!(transport.played_loops(), 0);
        assert!(transport.is_looping());
    }

    #[test]
    fn test_loop_configuration() {
        let transport = loaded(8000, 1, 8000);

        transport.set_loop_count(2);
        assert!(transport.is_looping());
        assert_eq!(transport.loop_count(), 2);

        transport.set_loop(false);
        assert!(!transport.is_looping());
        assert_eq!(transport.loop_count(), 0);

        transport.set_loop(true);
        assert_eq!(transport.loop_count(), 0);
    }

    #[test]
    fn test_try_wrap_respects_count() {
        let transport = loaded(8000, 1, 100);
        assert_eq!(transport.try_wrap(100), None);

        transport.set_loop_count(2);
        assert_eq!(transport.try_wrap(100), Some((0, 1)));
        assert_eq!(transport.try_wrap(100), Some((0, 2)));
        assert_eq!(transport.try_wrap(100), None);
        assert_eq!(transport.played_loops(), 2);
    }

    #[test]
    fn test_loop_start() {
        let transport = loaded(100, 1, 100);
        transport.set_loop(true);
        assert!(transport.set_loop_start(0.25));
        assert_eq!(transport.try_wrap(100), Some((25, 1)));

        // A start at or past the wrap point falls back to the beginning.
        assert_eq!(transport.try_wrap(10), Some((0, 2)));
    }

    #[test]
    fn test_loop_region() {
        let transport = loaded(100, 1, 100);
        assert_eq!(transport.loop_end_frame(), 100);
        // Region bounds only apply while looping.
        assert!(transport.set_loop_region(0.2, 0.5));
        assert_eq!(transport.wrap_point(100), 100);

        transport.set_loop(true);
        assert_eq!(transport.loop_start_frame(), 20);
        assert_eq!(transport.loop_end_frame(), 50);
        assert_eq!(transport.wrap_point(100), 50);
        assert_eq!(transport.try_wrap(50), Some((20, 1)));

        // End clamps to the buffer; an inverted region restarts from 0.
        transport.set_loop_region(0.8, 5.0);
        assert_eq!(transport.loop_end_frame(), 100);
        transport.set_loop_region(0.6, 0.4);
        assert_eq!(transport.loop_start_frame(), 0);
        assert_eq!(transport.loop_end_frame(), 40);

        // A start past the current end falls back to 0.
        transport.set_loop_start(0.45);
        assert_eq!(transport.loop_start_frame(), 0);

        transport.reset_loop_region();
        assert_eq!(transport.loop_start_frame(), 0);
        assert_eq!(transport.loop_end_frame(), 100);
    }

    #[test]
    fn test_finish_yields_to_control() {
        let transport = loaded(100, 1, 100);
        transport.set_state(TransportState::Paused);
        assert!(!transport.finish());
        assert_eq!(transport.state(), TransportState::Paused);

        transport.set_state(TransportState::Playing);
        assert!(transport.finish());
        assert_eq!(transport.state(), TransportState::Stopped);
    }

    #[test]
    fn test_reset_keeps_loop_settings() {
        let transport = loaded(100, 1, 100);
        transport.set_loop_count(4);
        transport.set_loop_start(0.5);
        transport.set_state(TransportState::Playing);
        transport.seek(0.75);

        transport.set_loop_region(0.1, 0.6);

        transport.reset(&PlaybackFormat::new(200, 2, 50), 50);
        assert_eq!(transport.loop_end_frame(), 50);
        assert_eq!(transport.state(), TransportState::Stopped);
        assert_eq!(transport.position_frames(), 0);
        assert_eq!(transport.loop_start_frame(), 0);
        assert_eq!(transport.loop_count(), 4);
        assert_eq!(transport.sample_rate(), 200);
        assert_eq!(transport.channels(), 2);
    }

    #[test]
    fn test_commit_loses_to_seek() {
        let transport = loaded(100, 1, 100);
        transport.commit_frame(0, 10);
        assert_eq!(transport.position_frames(), 10);

        // A seek lands while a buffer is in flight.
        transport.seek(0.5);
        transport.commit_frame(10, 20);
        assert_eq!(transport.position_frames(), 50);
    }

    #[test]
    fn test_rewind_if_finished() {
        let transport = loaded(100, 1, 100);
        transport.commit_frame(0, 100);
        assert!(transport.rewind_if_finished());
        assert_eq!(transport.position_frames(), 0);
        assert!(!transport.rewind_if_finished());
    }
}
