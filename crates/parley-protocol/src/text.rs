//! The CRLF text encoding used on the stream transport.
//!
//! Grammar (case-sensitive ASCII, every message terminated by `\r\n`):
//!
//! ```text
//! AUTH  = "AUTH " ID " AS " DNAME " USING " SECRET
//! JOIN  = "JOIN " ID " AS " DNAME
//! MSG   = "MSG FROM " DNAME " IS " CONTENT
//! ERR   = "ERR FROM " DNAME " IS " CONTENT
//! REPLY = "REPLY " ("OK" | "NOK") " IS " CONTENT
//! BYE   = "BYE"
//! ```
//!
//! No I/O happens here — framing (reading bytes until the terminator)
//! is the transport's job; this module turns one complete line into a
//! [`ChatMessage`] and back.

use crate::{
    ChannelId, ChatMessage, Content, DisplayName, ProtocolError, Secret,
    Username,
};

/// Every text message on the wire ends with this sequence. A bare `\n`
/// is not a terminator.
pub const TERMINATOR: &str = "\r\n";

/// Encodes a message as one grammar-valid, CRLF-terminated line.
///
/// The line is built from the message's (already validated) fields and
/// then checked against the full grammar by parsing it back. A check
/// failure means the message could not have been built legally; nothing
/// is handed to the transport in that case.
///
/// # Errors
/// - [`ProtocolError::NotRepresentable`] for CONFIRM, which exists only
///   in the binary encoding.
/// - [`ProtocolError::MalformedLine`] if the built line fails the
///   grammar check.
pub fn encode(message: &ChatMessage) -> Result<String, ProtocolError> {
    let line = match message {
        ChatMessage::Auth {
            username,
            display_name,
            secret,
        } => format!("AUTH {username} AS {display_name} USING {secret}{TERMINATOR}"),
        ChatMessage::Join {
            channel_id,
            display_name,
        } => format!("JOIN {channel_id} AS {display_name}{TERMINATOR}"),
        ChatMessage::Msg {
            display_name,
            content,
        } => format!("MSG FROM {display_name} IS {content}{TERMINATOR}"),
        ChatMessage::Err {
            display_name,
            content,
        } => format!("ERR FROM {display_name} IS {content}{TERMINATOR}"),
        ChatMessage::Reply { ok, content, .. } => {
            let verdict = if *ok { "OK" } else { "NOK" };
            format!("REPLY {verdict} IS {content}{TERMINATOR}")
        }
        ChatMessage::Bye => format!("BYE{TERMINATOR}"),
        ChatMessage::Confirm { .. } => {
            return Err(ProtocolError::NotRepresentable("CONFIRM"));
        }
    };

    // Build-then-check: the assembled line must itself parse.
    decode(&line)?;
    Ok(line)
}

/// Decodes one complete line (including the `\r\n` terminator) into a
/// [`ChatMessage`].
///
/// # Errors
/// Returns [`ProtocolError::MalformedLine`] when the line is not
/// terminated by CRLF or does not match any production, and a field
/// error when a token violates its bound. The caller must treat any
/// failure as a desynchronized stream.
pub fn decode(line: &str) -> Result<ChatMessage, ProtocolError> {
    let malformed = || ProtocolError::MalformedLine(line.to_string());

    let body = line.strip_suffix(TERMINATOR).ok_or_else(malformed)?;
    // The terminator is the only place CR or LF may appear.
    if body.contains('\r') || body.contains('\n') {
        return Err(malformed());
    }

    if let Some(rest) = body.strip_prefix("AUTH ") {
        // AUTH <id> AS <dname> USING <secret> — fixed token layout.
        let parts: Vec<&str> = rest.split(' ').collect();
        let [id, "AS", dname, "USING", secret] = parts.as_slice() else {
            return Err(malformed());
        };
        return Ok(ChatMessage::Auth {
            username: Username::new(*id)?,
            display_name: DisplayName::new(*dname)?,
            secret: Secret::new(*secret)?,
        });
    }

    if let Some(rest) = body.strip_prefix("JOIN ") {
        let parts: Vec<&str> = rest.split(' ').collect();
        let [id, "AS", dname] = parts.as_slice() else {
            return Err(malformed());
        };
        return Ok(ChatMessage::Join {
            channel_id: ChannelId::new(*id)?,
            display_name: DisplayName::new(*dname)?,
        });
    }

    if let Some(rest) = body.strip_prefix("MSG FROM ") {
        let (dname, content) = split_is(rest).ok_or_else(malformed)?;
        return Ok(ChatMessage::Msg {
            display_name: DisplayName::new(dname)?,
            content: Content::new(content)?,
        });
    }

    if let Some(rest) = body.strip_prefix("ERR FROM ") {
        let (dname, content) = split_is(rest).ok_or_else(malformed)?;
        return Ok(ChatMessage::Err {
            display_name: DisplayName::new(dname)?,
            content: Content::new(content)?,
        });
    }

    if let Some(rest) = body.strip_prefix("REPLY ") {
        let (verdict, content) = split_is(rest).ok_or_else(malformed)?;
        let ok = match verdict {
            "OK" => true,
            "NOK" => false,
            _ => return Err(malformed()),
        };
        return Ok(ChatMessage::Reply {
            ok,
            ref_id: 0,
            content: Content::new(content)?,
        });
    }

    if body == "BYE" {
        return Ok(ChatMessage::Bye);
    }

    Err(malformed())
}

/// Splits `"<token> IS <content>"` into `(token, content)`.
///
/// The first token cannot contain a space, so everything after the
/// first `" IS "` — spaces included — belongs to the content.
fn split_is(rest: &str) -> Option<(&str, &str)> {
    let (token, tail) = rest.split_once(' ')?;
    let content = tail.strip_prefix("IS ")?;
    Some((token, content))
}

// =========================================================================
// Tests
// =========================================================================
