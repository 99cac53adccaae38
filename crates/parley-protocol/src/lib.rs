//! Wire protocol for Parley.
//!
//! This crate defines the "language" that the client and server speak:
//!
//! - **Types** ([`ChatMessage`] and the validated field newtypes) — the
//!   transport-independent message model.
//! - **Text codec** ([`text`]) — the CRLF-terminated grammar used on
//!   the stream transport.
//! - **Binary codec** ([`binary`]) — the tagged frame format used on
//!   the datagram transport.
//! - **Errors** ([`ProtocolError`]) — what can go wrong while building,
//!   encoding, or decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and session
//! (client state). It knows nothing about sockets, retransmission, or
//! who is connected — it only converts between [`ChatMessage`] and
//! bytes.
//!
//! ```text
//! Transport (bytes) → Protocol (ChatMessage) → Session (state machine)
//! ```

mod error;
mod types;

pub mod binary;
pub mod text;

pub use error::ProtocolError;
pub use types::{
    ChannelId, ChatMessage, Content, DisplayName, Secret, Username,
};
