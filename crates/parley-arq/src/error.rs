//! Error types for the reliability engine.

/// Errors that can occur while delivering a confirmed datagram.
#[derive(Debug, thiserror::Error)]
pub enum ArqError {
    /// The retransmission budget was exhausted without a CONFIRM.
    ///
    /// Fatal for the session: at-least-once delivery can no longer be
    /// claimed, so the client reports failure and terminates rather
    /// than silently dropping the message.
    #[error("no confirmation received for message {id} after {attempts} attempts")]
    ConfirmTimeout {
        /// The unacknowledged message ID.
        id: u16,
        /// Total transmissions made (original send included).
        attempts: u8,
    },

    /// Every message ID has been allocated.
    ///
    /// Fatal for the session: reissuing an ID would defeat the peer's
    /// duplicate detection.
    #[error("message ID space exhausted")]
    IdsExhausted,

    /// The underlying socket refused a transmission.
    #[error("send failed: {0}")]
    Send(#[source] Box<dyn std::error::Error + Send + Sync>),
}
