/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Establishing the connection or binding the local socket failed.
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] std::io::Error),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// The peer closed the stream in the middle of a message.
    #[error("connection closed mid-message")]
    ClosedMidMessage,

    /// An inbound line was not valid UTF-8. Treated like a decode
    /// failure by the caller, not like an I/O fault.
    #[error("inbound line is not valid UTF-8")]
    InvalidUtf8,

    /// An inbound line exceeded any legal message length without a
    /// CRLF terminator appearing.
    #[error("inbound line exceeded {0} bytes without a terminator")]
    LineTooLong(usize),
}
