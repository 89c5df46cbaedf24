use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by the acquisition thread, readable without the frame lock.
#[derive(Debug, Default)]
pub struct AcquisitionStats {
    acquired: AtomicU64,
    incomplete: AtomicU64,
    malformed: AtomicU64,
    errors: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub acquired: u64,
    pub incomplete: u64,
    pub malformed: u64,
    pub errors: u64,
}

impl StatsSnapshot {
    pub fn attempts(&self) -> u64 {
        self.acquired + self.incomplete + self.malformed + self.errors
    }
}

impl AcquisitionStats {
    pub(crate) fn record_acquired(&self) {
        self.acquired.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_incomplete(&self) {
        self.incomplete.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            acquired: self.acquired.load(Ordering::Relaxed),
            incomplete: self.incomplete.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}
