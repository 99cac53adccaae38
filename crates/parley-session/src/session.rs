//! Session types: the lifecycle state machine and the per-process
//! session record.
//!
//! A [`Session`] is the client's memory of one conversation with the
//! server: who the user claims to be, which channel they are in, and
//! where the protocol lifecycle currently stands. It is pure state —
//! no sockets, no timers. The transport orchestrators feed it user
//! actions and inbound messages and act on what it returns, so both
//! transports share exactly one set of protocol rules.

use parley_protocol::{ChannelId, DisplayName, Secret, Username};

use crate::SessionError;

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// The five-state session lifecycle, shared by both transports.
///
/// ```text
///          auth sent        REPLY OK
/// Start ─────────────→ Auth ─────────→ Open ──────────→ End
///   ↑                    │                │  (BYE / ERR /
///   └────────────────────┘                │   user quit)
///        REPLY NOK                        │
///                                         ▼
///   any state ──(malformed inbound)──→ Error ──(ERR sent)──→ End
/// ```
///
/// - **Start**: connected (or not yet), awaiting credentials.
/// - **Auth**: AUTH is on the wire, awaiting the server's REPLY.
/// - **Open**: authenticated; channel traffic flows.
/// - **Error**: a protocol violation was observed; an ERR must be sent
///   to the peer before shutting down.
/// - **End**: terminal. Nothing observable happens after this except
///   teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Start,
    Auth,
    Open,
    Error,
    End,
}

impl SessionState {
    /// `true` for `Error` and `End`: no further inbound processing has
    /// observable effect.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Error | SessionState::End)
    }
}

// ---------------------------------------------------------------------------
// Outcome types
// ---------------------------------------------------------------------------

/// What an inbound REPLY resolved to.
///
/// The orchestrator renders the corresponding Success/Failure line and,
/// for `Unexpected`, drives the session to `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// AUTH accepted; the session is now `Open`.
    AuthAccepted,
    /// AUTH rejected; credentials were cleared, state is back at
    /// `Start`, and the user may retry.
    AuthRejected,
    /// JOIN accepted; the pending channel became current.
    JoinAccepted,
    /// JOIN rejected; the previous channel membership was restored.
    JoinRejected,
    /// No AUTH or JOIN was awaiting a verdict — a REPLY is illegal in
    /// this state.
    Unexpected,
    /// The session is already terminal; drop silently.
    Ignored,
}

/// What to do with an inbound chat MSG.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgDisposition {
    /// Render `"<displayName>: <content>"` to the user.
    Render,
    /// Swallow without output (not joined to a channel yet).
    Absorb,
    /// Session is terminal; drop.
    Ignore,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One client session. Created at process start in `Start`, destroyed
/// at process exit.
#[derive(Debug)]
pub struct Session {
    state: SessionState,
    username: Option<Username>,
    display_name: Option<DisplayName>,
    secret: Option<Secret>,
    current_channel: Option<ChannelId>,
    pending_channel: Option<ChannelId>,
    joined: bool,
    engaged: bool,
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: SessionState::Start,
            username: None,
            display_name: None,
            secret: None,
            current_channel: None,
            pending_channel: None,
            // No channel traffic is expected before the first JOIN
            // round-trip, so nothing is suppressed either.
            joined: true,
            engaged: false,
        }
    }

    /// A session that attributes pre-JOIN traffic to `channel`, for
    /// clients configured with a default channel.
    pub fn with_default_channel(channel: Option<ChannelId>) -> Self {
        let mut session = Self::new();
        session.current_channel = channel;
        session
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn set_state(&mut self, next: SessionState) {
        if self.state != next {
            tracing::debug!(prev = ?self.state, ?next, "session state transition");
        }
        self.state = next;
    }

    /// The authenticated user name, while credentials are held.
    pub fn username(&self) -> Option<&Username> {
        self.username.as_ref()
    }

    /// The display name presented to other users, once `/auth` or
    /// `/rename` has set one.
    pub fn display_name(&self) -> Option<&DisplayName> {
        self.display_name.as_ref()
    }

    /// The secret presented at authentication, while credentials are
    /// held.
    pub fn secret(&self) -> Option<&Secret> {
        self.secret.as_ref()
    }

    pub fn current_channel(&self) -> Option<&ChannelId> {
        self.current_channel.as_ref()
    }

    /// Whether the client has completed a JOIN round-trip for the
    /// channel it expects traffic from.
    pub fn joined(&self) -> bool {
        self.joined
    }

    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    /// Whether an AUTH was ever sent on this session. A farewell is
    /// owed to the server only after that; quitting a session that
    /// never spoke sends nothing. Stays `true` across a rejected AUTH,
    /// since the server has already heard from us.
    pub fn engaged(&self) -> bool {
        self.engaged
    }

    // -- User actions -----------------------------------------------------

    /// Records credentials and moves `Start → Auth`. The caller sends
    /// the AUTH message.
    ///
    /// # Errors
    /// [`SessionError::AlreadyAuthenticated`] unless the session is in
    /// `Start`.
    pub fn begin_auth(
        &mut self,
        username: Username,
        display_name: DisplayName,
        secret: Secret,
    ) -> Result<(), SessionError> {
        match self.state() {
            SessionState::Start => {
                self.username = Some(username);
                self.display_name = Some(display_name);
                self.secret = Some(secret);
                self.engaged = true;
                self.set_state(SessionState::Auth);
                Ok(())
            }
            SessionState::Error | SessionState::End => {
                Err(SessionError::Terminated)
            }
            _ => Err(SessionError::AlreadyAuthenticated),
        }
    }

    /// Records a pending JOIN and clears the joined flag. The caller
    /// sends the JOIN message.
    ///
    /// # Errors
    /// [`SessionError::NotAuthenticated`] before authentication.
    pub fn begin_join(
        &mut self,
        channel: ChannelId,
    ) -> Result<(), SessionError> {
        match self.state() {
            SessionState::Auth | SessionState::Open => {
                self.pending_channel = Some(channel);
                self.joined = false;
                Ok(())
            }
            SessionState::Error | SessionState::End => {
                Err(SessionError::Terminated)
            }
            _ => Err(SessionError::NotAuthenticated),
        }
    }

    /// `/rename`: local only, never touches the wire.
    pub fn rename(
        &mut self,
        display_name: DisplayName,
    ) -> Result<(), SessionError> {
        match self.state() {
            SessionState::Auth | SessionState::Open => {
                self.display_name = Some(display_name);
                Ok(())
            }
            SessionState::Error | SessionState::End => {
                Err(SessionError::Terminated)
            }
            _ => Err(SessionError::NotAuthenticated),
        }
    }

    /// Ordinary chat lines may only be sent while `Open`.
    pub fn can_send_msg(&self) -> bool {
        self.state() == SessionState::Open
    }

    // -- Inbound messages -------------------------------------------------

    /// Applies an inbound REPLY to whichever request is pending.
    pub fn on_reply(&mut self, ok: bool) -> ReplyOutcome {
        match self.state() {
            SessionState::Auth => {
                if ok {
                    self.set_state(SessionState::Open);
                    ReplyOutcome::AuthAccepted
                } else {
                    // Reset credentials; the user retries from Start.
                    self.username = None;
                    self.display_name = None;
                    self.secret = None;
                    self.set_state(SessionState::Start);
                    ReplyOutcome::AuthRejected
                }
            }
            SessionState::Open => {
                if ok {
                    if let Some(channel) = self.pending_channel.take() {
                        self.current_channel = Some(channel);
                    }
                    self.joined = true;
                    ReplyOutcome::JoinAccepted
                } else {
                    self.pending_channel = None;
                    if self.current_channel.is_some() {
                        // Still a member of the previous channel.
                        self.joined = true;
                    }
                    ReplyOutcome::JoinRejected
                }
            }
            SessionState::Start => ReplyOutcome::Unexpected,
            SessionState::Error | SessionState::End => ReplyOutcome::Ignored,
        }
    }

    /// Decides whether an inbound chat MSG is rendered.
    pub fn on_msg(&self) -> MsgDisposition {
        if self.is_terminal() {
            MsgDisposition::Ignore
        } else if self.joined && self.state() == SessionState::Open {
            MsgDisposition::Render
        } else {
            MsgDisposition::Absorb
        }
    }

    /// Inbound ERR: log it, then the session ends (a BYE is still sent
    /// on the way out). Returns `false` if already terminal.
    pub fn on_err(&mut self) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.set_state(SessionState::End);
        true
    }

    /// Inbound BYE: immediate end, and the outbound BYE is suppressed.
    /// Returns `false` if already terminal.
    pub fn on_bye(&mut self) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.set_state(SessionState::End);
        true
    }

    /// Malformed inbound data or a message type illegal for the state:
    /// any state moves to `Error`.
    pub fn fail(&mut self) {
        if !self.is_terminal() {
            self.set_state(SessionState::Error);
        }
    }

    /// `Error → End` after the protocol ERR has been emitted, and the
    /// transition used by every user-initiated shutdown path.
    pub fn terminate(&mut self) {
        self.set_state(SessionState::End);
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

// =========================================================================
// Tests
// =========================================================================
