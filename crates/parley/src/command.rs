//! Parsing of the local command surface.
//!
//! Lines starting with `/` are local commands; anything else is chat
//! content. Arity is checked here, before any state is touched, so a
//! malformed command is reported and nothing else happens. Field
//! *values* are validated later by the protocol newtypes.

/// One line of user input, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/auth <username> <secret> <displayName>`
    Auth {
        username: String,
        secret: String,
        display_name: String,
    },
    /// `/join <channelID>`
    Join { channel: String },
    /// `/rename <displayName>`, a purely local change.
    Rename { display_name: String },
    /// `/help`
    Help,
    /// A plain chat line, sent as MSG while the session is open.
    Say(String),
}

/// Errors for command lines that never reach the session.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("invalid number of parameters for /{0} command")]
    WrongArity(&'static str),

    #[error("unknown command '/{0}'")]
    Unknown(String),
}

/// Classifies one non-empty input line.
///
/// # Errors
/// [`CommandError`] for a `/command` with the wrong parameter count or
/// an unrecognized name.
pub fn parse(line: &str) -> Result<Command, CommandError> {
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Command::Say(line.to_string()));
    };

    let mut words = rest.split_whitespace();
    let name = words.next().unwrap_or("");
    let params: Vec<&str> = words.collect();

    match name {
        "auth" => match params.as_slice() {
            [username, secret, display_name] => Ok(Command::Auth {
                username: (*username).to_string(),
                secret: (*secret).to_string(),
                display_name: (*display_name).to_string(),
            }),
            _ => Err(CommandError::WrongArity("auth")),
        },
        "join" => match params.as_slice() {
            [channel] => Ok(Command::Join {
                channel: (*channel).to_string(),
            }),
            _ => Err(CommandError::WrongArity("join")),
        },
        "rename" => match params.as_slice() {
            [display_name] => Ok(Command::Rename {
                display_name: (*display_name).to_string(),
            }),
            _ => Err(CommandError::WrongArity("rename")),
        },
        "help" => {
            if params.is_empty() {
                Ok(Command::Help)
            } else {
                Err(CommandError::WrongArity("help"))
            }
        }
        other => Err(CommandError::Unknown(other.to_string())),
    }
}

// =========================================================================
// Tests
// =========================================================================
