//! The logical message model: what the client and server say to each
//! other, independent of how it is framed on the wire.
//!
//! Every protocol unit is a [`ChatMessage`]. The text codec and the
//! binary codec both encode and decode this one type, so the session
//! layer never cares which transport a message arrived on.
//!
//! Field values are newtype wrappers ([`Username`], [`DisplayName`], ...)
//! whose constructors enforce the grammar's length and character-set
//! bounds. A value that exists is a value that is legal on the wire —
//! out-of-range input fails at construction time, before any bytes are
//! built.

use std::fmt;

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Validated field newtypes
// ---------------------------------------------------------------------------

/// `ID` characters: letters, digits, `.` and `-`.
fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '.' || c == '-'
}

/// `SECRET` characters: letters, digits and `-`.
fn is_secret_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-'
}

/// `DNAME` characters: printable ASCII excluding space (0x21–0x7E).
fn is_dname_char(c: char) -> bool {
    matches!(c, '\x21'..='\x7e')
}

/// `CONTENT` characters: printable ASCII including space (0x20–0x7E).
fn is_content_char(c: char) -> bool {
    matches!(c, '\x20'..='\x7e')
}

/// Declares a validated string newtype with a length bound and a
/// per-character predicate.
///
/// Each generated type offers `new` (validating constructor), `as_str`,
/// and `Display`. The inner `String` is private so a value can only be
/// obtained through validation.
macro_rules! bounded_string {
    (
        $(#[$doc:meta])*
        $name:ident, $field:literal, $max:literal, $pred:ident, $reason:literal
    ) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name(String);

        impl $name {
            /// Validates `value` against the grammar bound for this field.
            ///
            /// # Errors
            /// Returns [`ProtocolError::InvalidField`] when the value is
            /// empty, too long, or contains a character outside the
            /// allowed set.
            pub fn new(value: impl Into<String>) -> Result<Self, ProtocolError> {
                let value = value.into();
                if value.is_empty()
                    || value.len() > $max
                    || !value.chars().all($pred)
                {
                    return Err(ProtocolError::InvalidField {
                        field: $field,
                        reason: $reason,
                    });
                }
                Ok(Self(value))
            }

            /// Returns the validated string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

bounded_string!(
    /// A user name: 1–20 characters of `[A-Za-z0-9.-]`.
    Username, "username", 20, is_id_char,
    "must be 1-20 characters of [A-Za-z0-9.-]"
);

bounded_string!(
    /// A channel identifier: 1–20 characters of `[A-Za-z0-9.-]`.
    ChannelId, "channel id", 20, is_id_char,
    "must be 1-20 characters of [A-Za-z0-9.-]"
);

bounded_string!(
    /// An authentication secret: 1–128 characters of `[A-Za-z0-9-]`.
    Secret, "secret", 128, is_secret_char,
    "must be 1-128 characters of [A-Za-z0-9-]"
);

bounded_string!(
    /// A display name: 1–20 printable non-space ASCII characters.
    DisplayName, "display name", 20, is_dname_char,
    "must be 1-20 printable non-space characters"
);

bounded_string!(
    /// Message content: 1–1400 printable ASCII characters, space allowed.
    Content, "content", 1400, is_content_char,
    "must be 1-1400 printable characters"
);

// ---------------------------------------------------------------------------
// ChatMessage
// ---------------------------------------------------------------------------

/// One protocol unit, independent of transport framing.
///
/// The same set of kinds exists in both wire encodings; only CONFIRM is
/// datagram-only (the stream transport is reliable by itself, so it
/// never acknowledges at the application level).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatMessage {
    /// Client → server: authenticate as `username` with `secret`,
    /// presenting `display_name` to other users.
    Auth {
        username: Username,
        display_name: DisplayName,
        secret: Secret,
    },

    /// Client → server: join `channel_id`.
    Join {
        channel_id: ChannelId,
        display_name: DisplayName,
    },

    /// Either direction: a chat line from `display_name`.
    Msg {
        display_name: DisplayName,
        content: Content,
    },

    /// Either direction: a protocol error, after which the sender
    /// terminates the session.
    Err {
        display_name: DisplayName,
        content: Content,
    },

    /// Server → client: the verdict on the most recent AUTH or JOIN.
    ///
    /// `ref_id` identifies the request being answered. Only the binary
    /// encoding carries it on the wire; the text codec decodes it as 0.
    Reply {
        ok: bool,
        ref_id: u16,
        content: Content,
    },

    /// Either direction: orderly end of the session.
    Bye,

    /// Datagram only: acknowledges receipt of the message whose ID is
    /// `ref_id`. Never itself confirmed.
    Confirm { ref_id: u16 },
}

impl ChatMessage {
    /// Short kind name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ChatMessage::Auth { .. } => "AUTH",
            ChatMessage::Join { .. } => "JOIN",
            ChatMessage::Msg { .. } => "MSG",
            ChatMessage::Err { .. } => "ERR",
            ChatMessage::Reply { .. } => "REPLY",
            ChatMessage::Bye => "BYE",
            ChatMessage::Confirm { .. } => "CONFIRM",
        }
    }

    /// Whether the datagram transport expects this message to be
    /// acknowledged by the peer. Everything except CONFIRM is.
    pub fn needs_confirm(&self) -> bool {
        !matches!(self, ChatMessage::Confirm { .. })
    }
}

// =========================================================================
// Tests
// =========================================================================
