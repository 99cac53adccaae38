//! The confirmed-send loop: transmit, wait, retransmit, give up.

use std::time::Duration;

use crate::{ArqError, ArqLedger};

/// How long to wait for a CONFIRM and how often to retry.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Fixed interval between transmissions. No backoff: the original
    /// frame is resent unchanged every `delay`.
    pub delay: Duration,
    /// Retransmissions after the original send; the total attempt
    /// budget is `retransmissions + 1`.
    pub retransmissions: u8,
}

impl RetryPolicy {
    /// Total transmissions allowed, original send included.
    pub fn max_attempts(&self) -> u8 {
        self.retransmissions.saturating_add(1)
    }

    /// The shutdown BYE wait: four times the confirmation delay,
    /// after which the client closes regardless.
    pub fn shutdown_window(&self) -> Duration {
        self.delay.saturating_mul(4)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(250),
            retransmissions: 3,
        }
    }
}

/// Anything that can put one frame on the wire.
///
/// The engine never owns a socket; the datagram orchestrator
/// implements this for its link so the retry loop can be exercised
/// against a mock in tests.
pub trait DatagramSink: Send + Sync {
    /// Transmits one already-encoded frame to the peer.
    async fn transmit(&self, frame: &[u8]) -> Result<(), ArqError>;
}

/// Sends `frame` and retransmits at fixed intervals until its CONFIRM
/// arrives or the attempt budget is spent.
///
/// The confirmed flag is checked only at each retry boundary, so one
/// redundant datagram may follow a confirmation that raced the timer —
/// the peer's dedup absorbs it.
///
/// # Errors
/// [`ArqError::ConfirmTimeout`] after `retransmissions + 1` unconfirmed
/// attempts; this is fatal for the session. Transmission failures are
/// passed through.
pub async fn send_confirmed<S: DatagramSink>(
    sink: &S,
    ledger: &ArqLedger,
    policy: &RetryPolicy,
    id: u16,
    frame: &[u8],
) -> Result<(), ArqError> {
    // Register first: the CONFIRM may beat the first sleep.
    ledger.register(id);

    loop {
        sink.transmit(frame).await?;
        let attempts = ledger.note_attempt(id);
        tracing::trace!(id, attempts, "datagram transmitted");

        tokio::time::sleep(policy.delay).await;

        if ledger.is_confirmed(id) {
            ledger.finish(id);
            return Ok(());
        }
        if attempts >= policy.max_attempts() {
            ledger.finish(id);
            tracing::warn!(id, attempts, "confirmation budget exhausted");
            return Err(ArqError::ConfirmTimeout { id, attempts });
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
