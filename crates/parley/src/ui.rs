//! The console output contract.
//!
//! Ordinary chat goes to stdout. Verdicts and errors go to stderr so
//! piped output stays clean chat. These lines are the user interface
//! mandated by the protocol, not diagnostics; diagnostics use
//! `tracing` and are off by default.

use std::fmt::Display;

/// `"<displayName>: <content>"` for an inbound chat message.
pub fn chat_line(display_name: &impl Display, content: &impl Display) {
    println!("{display_name}: {content}");
}

/// A positive server verdict on AUTH or JOIN.
pub fn success(content: &impl Display) {
    eprintln!("Success: {content}");
}

/// A negative server verdict on AUTH or JOIN.
pub fn failure(content: &impl Display) {
    eprintln!("Failure: {content}");
}

/// A protocol ERR received from the peer.
pub fn peer_error(display_name: &impl Display, content: &impl Display) {
    eprintln!("ERR FROM {display_name}: {content}");
}

/// A local problem: bad command, rejected action, transport fault.
pub fn local_error(message: impl Display) {
    eprintln!("ERR: {message}");
}

/// The `/help` table of local commands.
pub fn help() {
    println!("Supported local commands:");
    println!("/auth\t{{Username}} {{Secret}} {{DisplayName}}\tauthenticate with the server");
    println!("/join\t{{ChannelID}}\t\t\t\tjoin a channel");
    println!("/rename\t{{DisplayName}}\t\t\t\tchange the display name locally");
    println!("/help\t\t\t\t\t\tprint this table");
}
