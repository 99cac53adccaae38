//! # Parley
//!
//! A chat client that speaks one logical protocol over two transports:
//! a CRLF text grammar over TCP, or binary frames over UDP with an
//! application-level confirm/retransmit layer.
//!
//! This crate ties the layers together: it parses local commands,
//! drives the shared session state machine, and runs one of two
//! transport orchestrators ([`TcpChat`] or [`UdpChat`]) behind the
//! common [`Chat`] trait.
//!
//! ```text
//! stdin → commands → session ┬→ text codec   → TCP stream
//!                            └→ binary codec → UDP + ARQ
//! ```

#![allow(async_fn_in_trait)]

mod command;
mod compose;
mod error;
mod ui;

pub mod chat;
pub mod config;
pub mod tcp;
pub mod udp;

pub use chat::{Chat, Flow};
pub use config::{ClientConfig, TransportMode};
pub use error::ParleyError;
pub use tcp::TcpChat;
pub use udp::UdpChat;

// Re-exported so binaries and tests can build a config without
// depending on the layer crates directly.
pub use parley_arq::RetryPolicy;
pub use parley_protocol::ChannelId;
pub use parley_session::SessionState;
