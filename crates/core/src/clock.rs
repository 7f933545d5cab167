// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Time sources for age scoring and elapsed-time measurement.
//!
//! The scheduler scores tasks by wall-clock age and the dispatcher measures
//! execution time on a monotonic clock; both read time through [`Clock`] so
//! starvation thresholds and timing-sensitive paths are exact under test.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// A paired wall/monotonic time source.
pub trait Clock: Clone + Send + Sync {
    /// Monotonic instant, for measuring elapsed execution time.
    fn now(&self) -> Instant;

    /// Wall-clock milliseconds since the Unix epoch, for task age.
    fn epoch_ms(&self) -> u64;
}

/// Production clock reading the operating system.
#[derive(Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn epoch_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Deterministic clock that only moves when a test advances it.
///
/// Both readings derive from one atomic millisecond offset: `epoch_ms`
/// starts at [`ManualClock::ORIGIN_EPOCH_MS`] and `now` at a fixed instant
/// captured on construction. A task built at the origin is exactly as old
/// as the total advancement, which makes starvation-threshold cases exact
/// (advance 60 001 ms, get the bonus; advance 60 000, don't).
#[derive(Clone)]
pub struct ManualClock {
    started: Instant,
    offset_ms: Arc<AtomicU64>,
}

impl ManualClock {
    /// Wall-clock origin. Test task builders create tasks relative to this
    /// so age arithmetic never underflows.
    pub const ORIGIN_EPOCH_MS: u64 = 1_000_000;

    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            offset_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Move both readings forward. Clones observe the advancement.
    pub fn advance(&self, duration: Duration) {
        self.advance_ms(duration.as_millis() as u64);
    }

    /// Move both readings forward by whole milliseconds.
    pub fn advance_ms(&self, ms: u64) {
        self.offset_ms.fetch_add(ms, Ordering::SeqCst);
    }

    /// Total advancement so far.
    pub fn elapsed_ms(&self) -> u64 {
        self.offset_ms.load(Ordering::SeqCst)
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.started + Duration::from_millis(self.elapsed_ms())
    }

    fn epoch_ms(&self) -> u64 {
        Self::ORIGIN_EPOCH_MS + self.elapsed_ms()
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
