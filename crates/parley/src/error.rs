//! Unified error type for the Parley client.

use parley_arq::ArqError;
use parley_protocol::ProtocolError;
use parley_session::SessionError;
use parley_transport::TransportError;

/// Top-level error that wraps all layer-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From`
/// impls, so the `?` operator converts layer errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ParleyError {
    /// A transport-level error (connect, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (field bounds, encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (action illegal in the current state).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A reliability-level error (confirmation budget exhausted).
    #[error(transparent)]
    Arq(#[from] ArqError),
}
