//! Error types for the protocol layer.

/// Errors that can occur while building, encoding, or decoding messages.
///
/// A `ProtocolError` always means "the bytes/fields are wrong", never
/// "the network failed" — transport problems live in their own error
/// type one layer down.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A message field violates its length or character-set bound.
    ///
    /// Raised at construction time, before any bytes exist. This is the
    /// "build failure" category: the attempted action is aborted and
    /// nothing is transmitted.
    #[error("invalid {field}: {reason}")]
    InvalidField {
        /// Which field was rejected ("username", "content", ...).
        field: &'static str,
        /// The bound that was violated.
        reason: &'static str,
    },

    /// An inbound text line does not match the wire grammar.
    #[error("malformed line: {0:?}")]
    MalformedLine(String),

    /// The message kind has no representation in this codec
    /// (e.g. CONFIRM in the text grammar).
    #[error("{0} has no representation in this codec")]
    NotRepresentable(&'static str),

    /// A binary frame ended before all mandatory fields were read.
    #[error("truncated frame: missing {missing}")]
    Truncated {
        /// The field that could not be read.
        missing: &'static str,
    },

    /// A string field in a binary frame has no null terminator.
    #[error("unterminated {0} field in frame")]
    UnterminatedField(&'static str),

    /// A binary frame carried bytes past the end of its last field.
    #[error("unexpected trailing bytes in frame")]
    TrailingBytes,

    /// The first byte of a binary frame is not a known message tag.
    #[error("unknown message tag 0x{0:02x}")]
    UnknownTag(u8),

    /// A REPLY frame's result byte was neither 0 (NOK) nor 1 (OK).
    #[error("invalid reply result byte 0x{0:02x}")]
    InvalidReplyResult(u8),
}
