//! Transport links for the Parley client.
//!
//! Two links, one per wire encoding:
//!
//! - [`StreamLink`] — TCP, framing the text grammar by its CRLF
//!   terminator (one byte at a time; `\r` must immediately precede
//!   `\n`).
//! - [`DatagramLink`] — UDP, one binary frame per datagram, with the
//!   server's dynamic port adopted from its first reply.
//!
//! Links move bytes; they never interpret them. Encoding and decoding
//! live in `parley-protocol`, retransmission in `parley-arq`.

mod error;
mod tcp;
mod udp;

pub use error::TransportError;
pub use tcp::{StreamLink, StreamReader, StreamWriter, MAX_LINE};
pub use udp::DatagramLink;
