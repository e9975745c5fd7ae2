//! Thread-safe handle around an `EventCorrelator`.
//!
//! The correlator itself is single-threaded. When events fan in from several
//! threads, each operation runs under one mutex so open/lookup/close/close_all
//! stay atomic with respect to each other.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::contracts::LifecycleEvent;
use crate::correlator::EventCorrelator;
use crate::telemetry::{Exporter, TelemetryError};

/// Cloneable, lock-protected correlator.
pub struct SharedCorrelator<E: Exporter> {
    inner: Arc<Mutex<EventCorrelator<E>>>,
}

impl<E: Exporter> Clone for SharedCorrelator<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: Exporter> SharedCorrelator<E> {
    pub fn new(correlator: EventCorrelator<E>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(correlator)),
        }
    }

    pub fn handle(&self, event: LifecycleEvent) {
        self.lock().handle(event);
    }

    pub fn abort(&self, reason: &str) {
        self.lock().abort(reason);
    }

    pub fn shutdown(&self) -> Result<(), TelemetryError> {
        self.lock().shutdown()
    }

    /// Run `f` with exclusive access to the correlator.
    pub fn with<R>(&self, f: impl FnOnce(&mut EventCorrelator<E>) -> R) -> R {
        f(&mut self.lock())
    }

    // A panic on another thread must not stop telemetry for the rest of the run.
    fn lock(&self) -> MutexGuard<'_, EventCorrelator<E>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
