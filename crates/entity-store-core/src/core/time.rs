// crates/entity-store-core/src/core/time.rs
// ============================================================================
// Module: Entity Store Time Source
// Description: Clock abstraction for row timestamps.
// Purpose: Keep timestamp assignment injectable for deterministic tests.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Stores stamp `created_at` and `updated_at` as unix milliseconds obtained
//! from a [`Clock`]. Production wiring uses [`SystemClock`]; tests can supply
//! [`SteppingClock`] to make creation order explicit.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Source of unix millisecond timestamps.
pub trait Clock: Send + Sync {
    /// Returns the current time in unix milliseconds.
    fn now_millis(&self) -> i64;
}

/// Wall-clock time source.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
    }
}

/// Deterministic clock that advances by a fixed step on every read.
#[derive(Debug)]
pub struct SteppingClock {
    /// Next value to return.
    next: AtomicI64,
    /// Increment applied after each read.
    step: i64,
}

impl SteppingClock {
    /// Creates a clock starting at `start` and advancing by `step`.
    #[must_use]
    pub const fn new(start: i64, step: i64) -> Self {
        Self {
            next: AtomicI64::new(start),
            step,
        }
    }
}

impl Clock for SteppingClock {
    fn now_millis(&self) -> i64 {
        self.next.fetch_add(self.step, Ordering::SeqCst)
    }
}
