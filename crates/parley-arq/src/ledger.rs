//! Shared bookkeeping for the reliability engine: outstanding sends
//! awaiting confirmation, and inbound message IDs already processed.
//!
//! Both collections are touched from two directions at once — the
//! inbound receive path records confirmations and duplicates while
//! confirmed-send tasks register and poll their own entries — so one
//! lock guards them both. Every lookup, insertion, and flag flip
//! happens under that lock, and the lock is never held across an
//! await.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU16, Ordering};

/// One send awaiting its CONFIRM.
#[derive(Debug, Clone, Copy, Default)]
struct OutstandingSend {
    confirmed: bool,
    attempts: u8,
}

/// The engine's shared state: outstanding-send table plus the
/// append-only dedup set of inbound IDs.
#[derive(Debug, Default)]
pub struct ArqLedger {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    outstanding: HashMap<u16, OutstandingSend>,
    // Never pruned: the set only grows for the life of the session,
    // which is bounded by the u16 ID space.
    seen_inbound: HashSet<u16>,
}

impl ArqLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a send that expects confirmation. Call before the
    /// first transmission so an immediate CONFIRM still matches.
    pub fn register(&self, id: u16) {
        let mut inner = self.lock();
        inner.outstanding.insert(id, OutstandingSend::default());
    }

    /// Counts one (re)transmission of `id`.
    pub fn note_attempt(&self, id: u16) -> u8 {
        let mut inner = self.lock();
        match inner.outstanding.get_mut(&id) {
            Some(entry) => {
                entry.attempts = entry.attempts.saturating_add(1);
                entry.attempts
            }
            None => 0,
        }
    }

    /// Records an inbound CONFIRM. Returns `true` if `ref_id` matched
    /// an outstanding send; unmatched confirmations are ignored as
    /// late or spurious.
    pub fn confirm(&self, ref_id: u16) -> bool {
        let mut inner = self.lock();
        match inner.outstanding.get_mut(&ref_id) {
            Some(entry) => {
                entry.confirmed = true;
                true
            }
            None => {
                tracing::debug!(ref_id, "ignoring unmatched CONFIRM");
                false
            }
        }
    }

    /// Whether `id` has been confirmed. Checked at retry boundaries
    /// only, so one redundant datagram may still go out after the
    /// CONFIRM arrives.
    pub fn is_confirmed(&self, id: u16) -> bool {
        self.lock()
            .outstanding
            .get(&id)
            .is_some_and(|e| e.confirmed)
    }

    /// Drops the entry once its send loop has finished with it.
    pub fn finish(&self, id: u16) {
        self.lock().outstanding.remove(&id);
    }

    /// Records an inbound message ID. Returns `true` the first time —
    /// act on the message — and `false` for a retransmission the peer
    /// sent because our CONFIRM got lost; still acknowledge it, but do
    /// not process it again.
    pub fn record_inbound(&self, id: u16) -> bool {
        self.lock().seen_inbound.insert(id)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("arq ledger lock poisoned")
    }
}

/// Monotonic message-ID allocator, one per datagram connection.
///
/// An explicit field rather than process-global state, so tests can
/// construct independent sessions with deterministic IDs. IDs start at
/// 1 and are never reused within a run.
#[derive(Debug)]
pub struct MessageIds {
    next: AtomicU16,
}

impl MessageIds {
    pub fn new() -> Self {
        Self {
            next: AtomicU16::new(1),
        }
    }

    /// Allocates the next ID, or `None` once the u16 space is used up.
    /// Wrapping around would reissue IDs the peer has already seen and
    /// break its duplicate detection, so exhaustion ends allocation
    /// instead.
    pub fn next(&self) -> Option<u16> {
        self.next
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |id| {
                id.checked_add(1)
            })
            .ok()
    }
}

impl Default for MessageIds {
    fn default() -> Self {
        Self::new()
    }
}

// =========================================================================
// Tests
// =========================================================================
