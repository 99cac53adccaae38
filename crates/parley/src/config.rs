//! Client configuration, resolved from the command line before any
//! socket is opened.

use std::net::SocketAddr;

use parley_arq::RetryPolicy;
use parley_protocol::ChannelId;

/// Which transport carries the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    /// Text grammar over a TCP stream.
    Tcp,
    /// Binary frames over UDP with confirmation and retransmission.
    Udp,
}

/// Everything a chat client needs to start.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub mode: TransportMode,
    /// Resolved server address. For UDP this is the configured port;
    /// the per-session dynamic port is learned from the first reply.
    pub server: SocketAddr,
    /// Confirmation timing for the datagram transport. Ignored by TCP.
    pub retry: RetryPolicy,
    /// Channel to attribute inbound traffic to before the first JOIN.
    pub default_channel: Option<ChannelId>,
}
