// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Runtime diagnostics: the last-errors ring and statistics counters.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::error::RuntimeError;

// =============================================================================
// ErrorRing
// =============================================================================

/// One recorded error.
#[derive(Debug, Clone)]
pub struct ErrorRecord {
    /// When the error was recorded.
    pub timestamp: DateTime<Utc>,

    /// Error category (see [`RuntimeError::category`]).
    pub category: &'static str,

    /// Rendered error message.
    pub message: String,
}

/// A bounded FIFO ring of the most recent errors.
///
/// The ring is clipped on overflow: once full, recording a new error
/// evicts the oldest. Intended for diagnostics endpoints, not as an
/// error-delivery mechanism; per-request errors are always surfaced to
/// the submitter separately.
#[derive(Debug)]
pub struct ErrorRing {
    records: Mutex<VecDeque<ErrorRecord>>,
    capacity: usize,
    total: AtomicU64,
}

impl ErrorRing {
    /// Default ring capacity.
    pub const DEFAULT_CAPACITY: usize = 1000;

    /// Creates a ring with the given capacity (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            total: AtomicU64::new(0),
        }
    }

    /// Records an error.
    pub fn record(&self, error: &RuntimeError) {
        self.total.fetch_add(1, Ordering::Relaxed);
        let record = ErrorRecord {
            timestamp: Utc::now(),
            category: error.category(),
            message: error.to_string(),
        };
        let mut records = self.records.lock();
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// Returns a snapshot of the ring, oldest first.
    pub fn snapshot(&self) -> Vec<ErrorRecord> {
        self.records.lock().iter().cloned().collect()
    }

    /// Returns the number of errors currently retained.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Returns `true` if no errors have been retained.
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Returns the total number of errors ever recorded.
    pub fn total_recorded(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Clears the ring.
    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl Default for ErrorRing {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

// =============================================================================
// RuntimeStats
// =============================================================================

/// Statistics counters and session stamps for the whole runtime.
#[derive(Debug, Default)]
pub struct RuntimeStats {
    connects: AtomicU64,
    failed_connects: AtomicU64,
    reads_ok: AtomicU64,
    reads_failed: AtomicU64,
    writes_ok: AtomicU64,
    writes_failed: AtomicU64,
    notifications: AtomicU64,
    notifications_dropped: AtomicU64,
    reconnect_attempt: AtomicU32,
    last_connect: Mutex<Option<DateTime<Utc>>>,
    last_disconnect: Mutex<Option<DateTime<Utc>>>,
}

impl RuntimeStats {
    /// Creates zeroed statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful connect: stamps the time and resets the
    /// reconnect attempt counter.
    pub fn record_connect(&self) {
        self.connects.fetch_add(1, Ordering::Relaxed);
        self.reconnect_attempt.store(0, Ordering::Relaxed);
        *self.last_connect.lock() = Some(Utc::now());
    }

    /// Records a failed connect attempt.
    pub fn record_failed_connect(&self) {
        self.failed_connects.fetch_add(1, Ordering::Relaxed);
    }

    /// Records the end of a session, explicit or lost.
    pub fn record_disconnect(&self) {
        *self.last_disconnect.lock() = Some(Utc::now());
    }

    /// Records a read outcome.
    pub fn record_read(&self, ok: bool) {
        if ok {
            self.reads_ok.fetch_add(1, Ordering::Relaxed);
        } else {
            self.reads_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records a write outcome.
    pub fn record_write(&self, ok: bool) {
        if ok {
            self.writes_ok.fetch_add(1, Ordering::Relaxed);
        } else {
            self.writes_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records an ingested change notification.
    pub fn record_notification(&self) {
        self.notifications.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a dropped (non-Good or unroutable) notification.
    pub fn record_notification_dropped(&self) {
        self.notifications_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Bumps and returns the current reconnect attempt (0-based).
    pub fn next_reconnect_attempt(&self) -> u32 {
        self.reconnect_attempt.fetch_add(1, Ordering::Relaxed)
    }

    /// Returns the current reconnect attempt counter.
    pub fn reconnect_attempt(&self) -> u32 {
        self.reconnect_attempt.load(Ordering::Relaxed)
    }

    /// Returns the number of successful connects.
    pub fn connects(&self) -> u64 {
        self.connects.load(Ordering::Relaxed)
    }

    /// Returns the number of failed connect attempts.
    pub fn failed_connects(&self) -> u64 {
        self.failed_connects.load(Ordering::Relaxed)
    }

    /// Returns (successful, failed) read counts.
    pub fn reads(&self) -> (u64, u64) {
        (
            self.reads_ok.load(Ordering::Relaxed),
            self.reads_failed.load(Ordering::Relaxed),
        )
    }

    /// Returns (successful, failed) write counts.
    pub fn writes(&self) -> (u64, u64) {
        (
            self.writes_ok.load(Ordering::Relaxed),
            self.writes_failed.load(Ordering::Relaxed),
        )
    }

    /// Returns (ingested, dropped) notification counts.
    pub fn notifications(&self) -> (u64, u64) {
        (
            self.notifications.load(Ordering::Relaxed),
            self.notifications_dropped.load(Ordering::Relaxed),
        )
    }

    /// Returns when the session last reached `Connected`.
    pub fn last_connect(&self) -> Option<DateTime<Utc>> {
        *self.last_connect.lock()
    }

    /// Returns when the session last ended.
    pub fn last_disconnect(&self) -> Option<DateTime<Utc>> {
        *self.last_disconnect.lock()
    }
}

// =============================================================================
// Tests
// =============================================================================
