//! Turns parsed user commands into outbound [`ChatMessage`]s.
//!
//! Shared by both orchestrators: field validation and session
//! bookkeeping are identical on TCP and UDP, only the encoding and
//! delivery differ. Each function reports problems through [`ui`] and
//! returns `None`; the session is only mutated when a message comes
//! back.

use parley_protocol::{
    ChannelId, ChatMessage, Content, DisplayName, Secret, Username,
};
use parley_session::{Session, SessionError};

use crate::ui;

/// `/auth`: validates credentials, records them, moves the session to
/// its awaiting-reply state.
pub(crate) fn auth(
    session: &mut Session,
    username: String,
    secret: String,
    display_name: String,
) -> Option<ChatMessage> {
    let fields = Username::new(username).and_then(|username| {
        let display_name = DisplayName::new(display_name)?;
        let secret = Secret::new(secret)?;
        Ok((username, display_name, secret))
    });
    let (username, display_name, secret) = match fields {
        Ok(fields) => fields,
        Err(error) => {
            ui::local_error(&error);
            return None;
        }
    };

    if let Err(error) = session.begin_auth(username, display_name, secret) {
        ui::local_error(&error);
        return None;
    }
    // Built back out of the record so the wire always matches what the
    // session holds.
    match (session.username(), session.display_name(), session.secret()) {
        (Some(username), Some(display_name), Some(secret)) => {
            Some(ChatMessage::Auth {
                username: username.clone(),
                display_name: display_name.clone(),
                secret: secret.clone(),
            })
        }
        _ => None,
    }
}

/// `/join`: validates the channel and records it as pending.
pub(crate) fn join(
    session: &mut Session,
    channel: String,
) -> Option<ChatMessage> {
    let channel = match ChannelId::new(channel) {
        Ok(channel) => channel,
        Err(error) => {
            ui::local_error(&error);
            return None;
        }
    };
    let Some(display_name) = session.display_name().cloned() else {
        ui::local_error(&SessionError::NotAuthenticated);
        return None;
    };
    if let Err(error) = session.begin_join(channel.clone()) {
        ui::local_error(&error);
        return None;
    }
    Some(ChatMessage::Join {
        channel_id: channel,
        display_name,
    })
}

/// `/rename`: local only; nothing goes to the wire.
pub(crate) fn rename(session: &mut Session, display_name: String) {
    match DisplayName::new(display_name) {
        Ok(display_name) => {
            if let Err(error) = session.rename(display_name) {
                ui::local_error(&error);
            }
        }
        Err(error) => ui::local_error(&error),
    }
}

/// A plain chat line, legal only while the session is open.
pub(crate) fn say(session: &Session, content: String) -> Option<ChatMessage> {
    if !session.can_send_msg() {
        ui::local_error(&SessionError::NotAuthenticated);
        return None;
    }
    let Some(display_name) = session.display_name().cloned() else {
        ui::local_error(&SessionError::NotAuthenticated);
        return None;
    };
    match Content::new(content) {
        Ok(content) => Some(ChatMessage::Msg {
            display_name,
            content,
        }),
        Err(error) => {
            ui::local_error(&error);
            None
        }
    }
}

/// The ERR sent to the peer when its traffic broke the protocol.
pub(crate) fn error_notice(session: &Session) -> Option<ChatMessage> {
    let display_name = session
        .display_name()
        .cloned()
        .or_else(|| DisplayName::new("client").ok())?;
    let content = Content::new("Invalid message").ok()?;
    Some(ChatMessage::Err {
        display_name,
        content,
    })
}

// =========================================================================
// Tests
// =========================================================================
