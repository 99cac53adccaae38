//! Session state machine for Parley.
//!
//! One [`Session`] exists per process. It validates which user actions
//! and which inbound message kinds are legal in the current
//! [`SessionState`], and tells the transport orchestrator what to do
//! with what it received — render it, absorb it, or shut down.
//!
//! The session layer is transport-agnostic: the TCP and UDP clients
//! drive the same state machine and differ only in framing and
//! reliability mechanics.

mod error;
mod session;

pub use error::SessionError;
pub use session::{MsgDisposition, ReplyOutcome, Session, SessionState};
