//! Reliability engine for Parley's datagram transport.
//!
//! UDP gives no delivery guarantee, so the client layers its own
//! automatic-repeat-request scheme on top:
//!
//! - every outbound message carries a per-connection [`MessageIds`]
//!   ID and is retransmitted at fixed intervals until the peer's
//!   CONFIRM arrives ([`send_confirmed`]);
//! - exhausting the attempt budget is fatal, never a silent drop;
//! - inbound IDs are recorded in the [`ArqLedger`] so the peer's own
//!   retransmissions are acknowledged but not processed twice.
//!
//! The stream transport never touches this crate — TCP already
//! delivers at-least-once in order.

#![allow(async_fn_in_trait)]

mod error;
mod ledger;
mod retry;

pub use error::ArqError;
pub use ledger::{ArqLedger, MessageIds};
pub use retry::{DatagramSink, RetryPolicy, send_confirmed};
