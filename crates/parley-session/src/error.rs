//! Error types for the session layer.

/// Errors raised when a user action is illegal in the current state.
///
/// These are always recoverable: the action is rejected, the user is
/// told why, and the session state is left untouched.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// AUTH is only accepted before authentication has started.
    #[error("already connected to the server")]
    AlreadyAuthenticated,

    /// JOIN, MSG, and `/rename` require an authenticated session.
    #[error("you need to authenticate first")]
    NotAuthenticated,

    /// The session has already reached `Error` or `End`.
    #[error("session is shutting down")]
    Terminated,
}
