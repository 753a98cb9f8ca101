//! The session phase machine and client identity.

use std::fmt;

use crate::SessionError;

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Where the session stands in the authentication and membership
/// lifecycle.
///
/// ```text
/// Unauthenticated ──(auth sent)──→ Authenticating ──(REPLY OK)──→ Joined
///        ↑                               │                          │
///        └──────(REPLY NOK / failed)─────┘                          │
///                                                                   ▼
///              (EOF, BYE, fatal ERR, from any phase) ──→ Terminating
/// ```
///
/// `Terminating` is terminal: no transition leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No auth request has been accepted or sent. Only `/auth` (and
    /// `/help`) are legal.
    Unauthenticated,

    /// An auth request is in flight, awaiting the server's `REPLY`.
    Authenticating,

    /// The server accepted the auth request. The display name is fixed
    /// and chat traffic is legal.
    Joined,

    /// The session is shutting down. Terminal.
    Terminating,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Unauthenticated => "unauthenticated",
            Phase::Authenticating => "authenticating",
            Phase::Joined => "joined",
            Phase::Terminating => "terminating",
        };
        write!(f, "{name}")
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A single client session: phase plus identity.
///
/// Only the dispatcher mutates a `Session`, always as a synchronous
/// reaction to exactly one event (a user command or an inbound message).
/// Every loop may read it. The client keeps it behind one lock together
/// with the reliability state.
#[derive(Debug)]
pub struct Session {
    phase: Phase,
    /// The confirmed display name. Empty until the server accepts an auth
    /// request.
    display_name: String,
    /// The display name requested by the in-flight auth, promoted on
    /// success and discarded on failure.
    pending_display_name: String,
    authenticated: bool,
}

impl Session {
    /// Creates a fresh, unauthenticated session.
    pub fn new() -> Self {
        Self {
            phase: Phase::Unauthenticated,
            display_name: String::new(),
            pending_display_name: String::new(),
            authenticated: false,
        }
    }

    /// The current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The confirmed display name; empty until authenticated.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Whether an auth request has been accepted this session.
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Whether the session has entered its terminal phase.
    pub fn is_terminating(&self) -> bool {
        self.phase == Phase::Terminating
    }

    /// Records that an auth request for `display_name` has been sent.
    ///
    /// Legal only while unauthenticated; in every other phase the command
    /// is rejected locally and nothing changes.
    pub fn begin_auth(&mut self, display_name: &str) -> Result<(), SessionError> {
        match self.phase {
            Phase::Unauthenticated => {
                self.pending_display_name = display_name.to_owned();
                self.phase = Phase::Authenticating;
                tracing::debug!(display_name, "auth request pending");
                Ok(())
            }
            Phase::Authenticating => Err(SessionError::AuthPending),
            Phase::Joined => Err(SessionError::AlreadyAuthenticated {
                display_name: self.display_name.clone(),
            }),
            Phase::Terminating => Err(SessionError::Terminating),
        }
    }

    /// Applies a successful auth reply: the pending display name becomes
    /// the fixed identity and the session is joined.
    ///
    /// Caller must have checked the phase is [`Phase::Authenticating`];
    /// the dispatcher's table guarantees it.
    pub fn auth_succeeded(&mut self) {
        debug_assert_eq!(self.phase, Phase::Authenticating);
        self.display_name = std::mem::take(&mut self.pending_display_name);
        self.authenticated = true;
        self.phase = Phase::Joined;
        tracing::debug!(display_name = %self.display_name, "session joined");
    }

    /// Applies a failed auth reply (or a failed auth delivery): back to
    /// square one, identity cleared.
    pub fn auth_failed(&mut self) {
        debug_assert_eq!(self.phase, Phase::Authenticating);
        self.pending_display_name.clear();
        self.display_name.clear();
        self.authenticated = false;
        self.phase = Phase::Unauthenticated;
        tracing::debug!("auth rejected, session back to unauthenticated");
    }

    /// Changes the display name used for subsequent messages. Local only;
    /// the server is not informed.
    pub fn rename(&mut self, display_name: &str) -> Result<(), SessionError> {
        self.require_joined("/rename")?;
        self.display_name = display_name.to_owned();
        Ok(())
    }

    /// Guard for commands that need a joined session (`/join`, chat
    /// messages, `/rename`).
    pub fn require_joined(&self, action: &'static str) -> Result<(), SessionError> {
        match self.phase {
            Phase::Joined => Ok(()),
            Phase::Unauthenticated => Err(SessionError::NotAuthenticated { action }),
            Phase::Authenticating => Err(SessionError::AuthPending),
            Phase::Terminating => Err(SessionError::Terminating),
        }
    }

    /// Enters the terminal phase. Idempotent; safe from any phase.
    pub fn terminate(&mut self) {
        if self.phase != Phase::Terminating {
            tracing::debug!(from = %self.phase, "session terminating");
            self.phase = Phase::Terminating;
        }
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
