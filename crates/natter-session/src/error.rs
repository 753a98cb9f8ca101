//! Error types for the session layer.

/// Phase-guard violations raised when a user command is not legal in the
/// session's current phase.
///
/// These never reach the network: the command is rejected locally, the
/// user sees the message, and the session continues unchanged.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The command needs a joined session and there is none yet.
    #[error("{action} requires a successful /auth first")]
    NotAuthenticated { action: &'static str },

    /// An auth request is already in flight; wait for its reply.
    #[error("authentication is already in progress")]
    AuthPending,

    /// The session is already authenticated; a second /auth is rejected.
    #[error("already authenticated as `{display_name}`")]
    AlreadyAuthenticated { display_name: String },

    /// The session is shutting down; no further commands are accepted.
    #[error("session is terminating")]
    Terminating,
}
