// crates/entity-store-core/src/runtime/invalidation.rs
// ============================================================================
// Module: Cache Invalidation Announcers
// Description: Fire-and-forget stale-view signals after mutations.
// Purpose: Let the presentation layer recompute views touched by writes.
// Dependencies: crate::core, crate::interfaces, tokio
// ============================================================================

//! ## Overview
//! Announcers implement [`InvalidationAnnouncer`]. Delivery is best effort:
//! an announcer never reports failure back to the mutation that triggered it.
//!
//! - [`NoopAnnouncer`] discards signals.
//! - [`StaleViewRegistry`] keeps an in-process set of stale views that a
//!   renderer consumes before its next render.
//! - [`ChannelAnnouncer`] forwards view paths into a Tokio mpsc channel and
//!   counts signals dropped because the channel was full or closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use tokio::sync::mpsc::Sender;

use crate::core::identifiers::ViewPath;
use crate::interfaces::InvalidationAnnouncer;

// ============================================================================
// SECTION: Noop
// ============================================================================

/// Announcer that discards every signal.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAnnouncer;

impl InvalidationAnnouncer for NoopAnnouncer {
    fn invalidate(&self, _view: &ViewPath) {}
}

// ============================================================================
// SECTION: Stale View Registry
// ============================================================================

/// In-process set of views awaiting recomputation.
///
/// # Invariants
/// - A view stays stale until a renderer takes it, however many times it is
///   invalidated in between.
#[derive(Debug, Default)]
pub struct StaleViewRegistry {
    /// Stale view paths.
    stale: Mutex<BTreeSet<ViewPath>>,
}

impl StaleViewRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the view has been invalidated and not yet taken.
    #[must_use]
    pub fn is_stale(&self, view: &ViewPath) -> bool {
        self.lock().contains(view)
    }

    /// Clears the stale mark for a view, returning whether it was set.
    #[must_use]
    pub fn take_stale(&self, view: &ViewPath) -> bool {
        self.lock().remove(view)
    }

    /// Clears and returns every stale view.
    #[must_use]
    pub fn drain(&self) -> Vec<ViewPath> {
        std::mem::take(&mut *self.lock()).into_iter().collect()
    }

    /// Acquires the set, recovering it if a holder panicked; the set is
    /// valid after any partial insert or remove.
    fn lock(&self) -> MutexGuard<'_, BTreeSet<ViewPath>> {
        self.stale.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl InvalidationAnnouncer for StaleViewRegistry {
    fn invalidate(&self, view: &ViewPath) {
        self.lock().insert(view.clone());
    }
}

// ============================================================================
// SECTION: Channel Announcer
// ============================================================================

/// Announcer that forwards view paths into a Tokio mpsc channel.
#[derive(Debug)]
pub struct ChannelAnnouncer {
    /// Sender used to publish view paths.
    sender: Sender<ViewPath>,
    /// Signals dropped because the channel was full or closed.
    dropped: AtomicU64,
}

impl ChannelAnnouncer {
    /// Creates an announcer over a channel sender.
    #[must_use]
    pub const fn new(sender: Sender<ViewPath>) -> Self {
        Self {
            sender,
            dropped: AtomicU64::new(0),
        }
    }

    /// Returns how many signals could not be enqueued.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl InvalidationAnnouncer for ChannelAnnouncer {
    fn invalidate(&self, view: &ViewPath) {
        if self.sender.try_send(view.clone()).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::panic, reason = "Test-only assertions are permitted.")]

    use std::sync::Arc;
    use std::thread;

    use tokio::sync::mpsc;

    use super::*;

    #[test]
    fn registry_marks_until_taken() {
        let registry = StaleViewRegistry::new();
        let notes = ViewPath::new("/notes");
        registry.invalidate(&notes);
        registry.invalidate(&notes);
        assert!(registry.is_stale(&notes));
        assert!(registry.take_stale(&notes));
        assert!(!registry.is_stale(&notes));
        assert!(!registry.take_stale(&notes));
    }

    #[test]
    fn registry_drain_empties_set() {
        let registry = StaleViewRegistry::new();
        registry.invalidate(&ViewPath::new("/b"));
        registry.invalidate(&ViewPath::new("/a"));
        assert_eq!(registry.drain(), vec![ViewPath::new("/a"), ViewPath::new("/b")]);
        assert!(registry.drain().is_empty());
    }

    #[test]
    fn registry_keeps_marking_after_holder_panics() {
        let registry = Arc::new(StaleViewRegistry::new());
        let poisoner = Arc::clone(&registry);
        let joined = thread::spawn(move || {
            let _guard = poisoner.stale.lock();
            panic!("holder panicked");
        })
        .join();
        assert!(joined.is_err());
        assert!(registry.stale.is_poisoned());

        let notes = ViewPath::new("/notes");
        registry.invalidate(&notes);
        assert!(registry.is_stale(&notes));
        assert_eq!(registry.drain(), vec![notes]);
    }

    #[test]
    fn channel_announcer_counts_drops_when_full() {
        let (sender, mut receiver) = mpsc::channel(1);
        let announcer = ChannelAnnouncer::new(sender);
        announcer.invalidate(&ViewPath::new("/notes"));
        announcer.invalidate(&ViewPath::new("/bugs"));
        assert_eq!(announcer.dropped(), 1);
        assert_eq!(receiver.try_recv().ok(), Some(ViewPath::new("/notes")));
    }

    #[test]
    fn channel_announcer_counts_drops_when_closed() {
        let (sender, receiver) = mpsc::channel(4);
        drop(receiver);
        let announcer = ChannelAnnouncer::new(sender);
        announcer.invalidate(&ViewPath::new("/notes"));
        assert_eq!(announcer.dropped(), 1);
    }
}
