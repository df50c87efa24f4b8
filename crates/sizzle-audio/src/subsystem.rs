//! Process-wide audio host lifetime.
//!
//! The host backend is brought up by the first guard and released with the
//! last one. Engines acquire a guard through their output backend, so the
//! host stays alive exactly as long as some engine does.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use cpal::HostId;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::{debug, info};

static GLOBAL: Lazy<Subsystem> = Lazy::new(Subsystem::new);

/// Reference-counted audio host.
#[derive(Debug, Default)]
pub struct Subsystem {
    refs: AtomicUsize,
    initialized: AtomicBool,
    initializations: AtomicU64,
    /// Serializes the 0 -> 1 and 1 -> 0 transitions.
    host: Mutex<Option<HostId>>,
}

impl Subsystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// The instance shared by every engine in the process.
    pub fn global() -> &'static Self {
        &GLOBAL
    }

    /// Take a reference, initializing the host if this is the first one.
    pub fn acquire(&self) -> SubsystemGuard<'_> {
        let previous = self.refs.fetch_add(1, Ordering::AcqRel);
        if previous == 0 || !self.initialized.load(Ordering::Acquire) {
            let mut host = self.host.lock();
            if host.is_none() {
                let id = cpal::default_host().id();
                *host = Some(id);
                self.initialized.store(true, Ordering::Release);
                self.initializations.fetch_add(1, Ordering::AcqRel);
                info!("Audio subsystem initialized (host: {:?})", id);
            }
        }
        SubsystemGuard { subsystem: self }
    }

    fn release(&self) {
        if self.refs.fetch_sub(1, Ordering::AcqRel) != 1 {
            return;
        }
        let mut host = self.host.lock();
        // Someone may have acquired between the decrement and the lock.
        if self.refs.load(Ordering::Acquire) == 0 {
            if let Some(id) = host.take() {
                self.initialized.store(false, Ordering::Release);
                info!("Audio subsystem terminated (host: {:?})", id);
            }
        }
    }

    pub fn refs(&self) -> usize {
        self.refs.load(Ordering::Acquire)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// How many times the host has been brought up.
    pub fn initializations(&self) -> u64 {
        self.initializations.load(Ordering::Acquire)
    }

    /// Host selected at initialization; `None` while no guard is held.
    pub fn host_id(&self) -> Option<HostId> {
        *self.host.lock()
    }
}

/// Keeps the subsystem alive; dropping it releases the reference.
#[derive(Debug)]
pub struct SubsystemGuard<'a> {
    subsystem: &'a Subsystem,
}

impl SubsystemGuard<'_> {
    pub fn host_id(&self) -> Option<HostId> {
        self.subsystem.host_id()
    }
}

impl Drop for SubsystemGuard<'_> {
    fn drop(&mut self) {
        debug!("Releasing audio subsystem reference");
        self.subsystem.release();
    }
}
