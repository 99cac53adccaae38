//! The binary frame encoding used on the datagram transport.
//!
//! Every datagram carries exactly one frame. All multi-byte integers
//! are **big-endian**; string fields are ASCII, null-terminated.
//!
//! ```text
//! +--------+----------------+----------------------------------+
//! | 1 byte |    2 bytes     |        type-specific body        |
//! |  tag   |   message id   |                                  |
//! +--------+----------------+----------------------------------+
//!
//! CONFIRM  tag, ref-id(2)                      (no id of its own)
//! REPLY    tag, id(2), result(1), ref-id(2), content\0
//! AUTH     tag, id(2), username\0 dname\0 secret\0
//! JOIN     tag, id(2), channel\0 dname\0
//! MSG/ERR  tag, id(2), dname\0 content\0
//! BYE      tag, id(2)
//! ```
//!
//! No I/O happens here — this is pure data transformation.

use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    ChannelId, ChatMessage, Content, DisplayName, ProtocolError, Secret,
    Username,
};

/// Message-type tag values, one per [`ChatMessage`] kind.
pub mod tag {
    pub const CONFIRM: u8 = 0x00;
    pub const REPLY: u8 = 0x01;
    pub const AUTH: u8 = 0x02;
    pub const JOIN: u8 = 0x03;
    pub const MSG: u8 = 0x04;
    pub const ERR: u8 = 0xFE;
    pub const BYE: u8 = 0xFF;
}

/// One datagram on the wire: a sender-assigned message ID plus the
/// logical message.
///
/// CONFIRM frames carry no ID of their own, only the echoed ref-ID;
/// for them `message_id` is ignored on encode and decoded as 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub message_id: u16,
    pub message: ChatMessage,
}

impl Frame {
    pub fn new(message_id: u16, message: ChatMessage) -> Self {
        Self {
            message_id,
            message,
        }
    }
}

/// Serializes a frame into a buffer ready for transmission.
///
/// Infallible: the fields inside a [`ChatMessage`] are validated at
/// construction, and every validated field is ASCII without embedded
/// NULs, so the layout above can always be produced.
pub fn encode(frame: &Frame) -> Bytes {
    let mut buf = BytesMut::with_capacity(64);

    match &frame.message {
        ChatMessage::Confirm { ref_id } => {
            buf.put_u8(tag::CONFIRM);
            buf.put_u16(*ref_id);
        }
        ChatMessage::Reply {
            ok,
            ref_id,
            content,
        } => {
            buf.put_u8(tag::REPLY);
            buf.put_u16(frame.message_id);
            buf.put_u8(u8::from(*ok));
            buf.put_u16(*ref_id);
            put_cstr(&mut buf, content.as_str());
        }
        ChatMessage::Auth {
            username,
            display_name,
            secret,
        } => {
            buf.put_u8(tag::AUTH);
            buf.put_u16(frame.message_id);
            put_cstr(&mut buf, username.as_str());
            put_cstr(&mut buf, display_name.as_str());
            put_cstr(&mut buf, secret.as_str());
        }
        ChatMessage::Join {
            channel_id,
            display_name,
        } => {
            buf.put_u8(tag::JOIN);
            buf.put_u16(frame.message_id);
            put_cstr(&mut buf, channel_id.as_str());
            put_cstr(&mut buf, display_name.as_str());
        }
        ChatMessage::Msg {
            display_name,
            content,
        } => {
            buf.put_u8(tag::MSG);
            buf.put_u16(frame.message_id);
            put_cstr(&mut buf, display_name.as_str());
            put_cstr(&mut buf, content.as_str());
        }
        ChatMessage::Err {
            display_name,
            content,
        } => {
            buf.put_u8(tag::ERR);
            buf.put_u16(frame.message_id);
            put_cstr(&mut buf, display_name.as_str());
            put_cstr(&mut buf, content.as_str());
        }
        ChatMessage::Bye => {
            buf.put_u8(tag::BYE);
            buf.put_u16(frame.message_id);
        }
    }

    buf.freeze()
}

/// Deserializes one datagram back into a [`Frame`].
///
/// # Errors
/// Short buffers yield [`ProtocolError::Truncated`] or
/// [`ProtocolError::UnterminatedField`]; an unknown tag, a bad REPLY
/// result byte, out-of-bound field values, or bytes left over after the
/// last field are also decode failures.
pub fn decode(buf: &[u8]) -> Result<Frame, ProtocolError> {
    let mut cur = Cursor { buf, pos: 0 };

    let tag_byte = cur.take_u8("tag")?;
    let frame = match tag_byte {
        tag::CONFIRM => Frame::new(
            0,
            ChatMessage::Confirm {
                ref_id: cur.take_u16("ref id")?,
            },
        ),
        tag::REPLY => {
            let message_id = cur.take_u16("message id")?;
            let result = cur.take_u8("result")?;
            let ok = match result {
                0 => false,
                1 => true,
                other => return Err(ProtocolError::InvalidReplyResult(other)),
            };
            let ref_id = cur.take_u16("ref id")?;
            let content = Content::new(cur.take_cstr("content")?)?;
            Frame::new(
                message_id,
                ChatMessage::Reply {
                    ok,
                    ref_id,
                    content,
                },
            )
        }
        tag::AUTH => {
            let message_id = cur.take_u16("message id")?;
            let username = Username::new(cur.take_cstr("username")?)?;
            let display_name = DisplayName::new(cur.take_cstr("display name")?)?;
            let secret = Secret::new(cur.take_cstr("secret")?)?;
            Frame::new(
                message_id,
                ChatMessage::Auth {
                    username,
                    display_name,
                    secret,
                },
            )
        }
        tag::JOIN => {
            let message_id = cur.take_u16("message id")?;
            let channel_id = ChannelId::new(cur.take_cstr("channel id")?)?;
            let display_name = DisplayName::new(cur.take_cstr("display name")?)?;
            Frame::new(
                message_id,
                ChatMessage::Join {
                    channel_id,
                    display_name,
                },
            )
        }
        tag::MSG | tag::ERR => {
            let message_id = cur.take_u16("message id")?;
            let display_name = DisplayName::new(cur.take_cstr("display name")?)?;
            let content = Content::new(cur.take_cstr("content")?)?;
            let message = if tag_byte == tag::MSG {
                ChatMessage::Msg {
                    display_name,
                    content,
                }
            } else {
                ChatMessage::Err {
                    display_name,
                    content,
                }
            };
            Frame::new(message_id, message)
        }
        tag::BYE => Frame::new(cur.take_u16("message id")?, ChatMessage::Bye),
        other => return Err(ProtocolError::UnknownTag(other)),
    };

    // One frame per datagram; leftovers mean corruption.
    if cur.pos != buf.len() {
        return Err(ProtocolError::TrailingBytes);
    }
    Ok(frame)
}

fn put_cstr(buf: &mut BytesMut, value: &str) {
    buf.put_slice(value.as_bytes());
    buf.put_u8(0);
}

/// Minimal forward-only reader over the datagram payload.
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn take_u8(&mut self, missing: &'static str) -> Result<u8, ProtocolError> {
        let b = *self
            .buf
            .get(self.pos)
            .ok_or(ProtocolError::Truncated { missing })?;
        self.pos += 1;
        Ok(b)
    }

    fn take_u16(&mut self, missing: &'static str) -> Result<u16, ProtocolError> {
        let end = self.pos + 2;
        let bytes = self
            .buf
            .get(self.pos..end)
            .ok_or(ProtocolError::Truncated { missing })?;
        self.pos = end;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn take_cstr(&mut self, field: &'static str) -> Result<&str, ProtocolError> {
        let rest = &self.buf[self.pos.min(self.buf.len())..];
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(ProtocolError::UnterminatedField(field))?;
        let value = std::str::from_utf8(&rest[..nul])
            .map_err(|_| ProtocolError::InvalidField {
                field,
                reason: "must be ASCII",
            })?;
        self.pos += nul + 1;
        Ok(value)
    }
}

// =========================================================================
// Tests
// =========================================================================
