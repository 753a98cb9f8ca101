//! Client-facing surface shared by both transports.

use natter_reliability::RetryConfig;
use tokio::sync::watch;

use crate::NatterError;

// ---------------------------------------------------------------------------
// ExitKind
// ---------------------------------------------------------------------------

/// How the session ended. Decides the process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    /// End of input or a server `BYE`: the conversation simply ended.
    Clean,
    /// A fatal server `ERR` or an unrecoverable transport failure.
    ServerError,
}

impl ExitKind {
    /// The process exit code for this kind of ending.
    pub fn code(self) -> u8 {
        match self {
            ExitKind::Clean => 0,
            ExitKind::ServerError => 1,
        }
    }
}

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// Connection parameters shared by both client variants.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server hostname or IP address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Confirm timeout and retry budget. Used by the datagram client;
    /// the stream transport has no retransmission to configure.
    pub retry: RetryConfig,
}

impl ClientConfig {
    /// Creates a config with the default retry policy.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            retry: RetryConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// ChatClient
// ---------------------------------------------------------------------------

/// The capability both client variants share: connect, run the session,
/// and say goodbye.
///
/// [`StreamClient`](crate::StreamClient) and
/// [`DatagramClient`](crate::DatagramClient) implement this; they share
/// the dispatcher and session logic, and differ only in codec and in the
/// reliability machinery the datagram side needs.
pub trait ChatClient: Sized {
    /// Opens the transport and prepares a fresh session.
    async fn connect(config: ClientConfig) -> Result<Self, NatterError>;

    /// Drives the session (input, receive, and timer loops) until
    /// shutdown, then returns how it ended. Sends the farewell `BYE`
    /// itself; consumes the client.
    async fn run(self) -> Result<ExitKind, NatterError>;

    /// Sends a best-effort `BYE`, not gated on acknowledgment. Skipped
    /// when the session never authenticated (there is no display name to
    /// say goodbye with).
    async fn send_bye(&self) -> Result<(), NatterError>;
}

// ---------------------------------------------------------------------------
// Shutdown
// ---------------------------------------------------------------------------

/// Shutdown signal shared by the client loops.
///
/// Any loop can trigger it (end of input, server `BYE`/`ERR`, transport
/// failure); the first trigger fixes the exit kind and later triggers are
/// ignored. Every loop `select!`s its blocking point against
/// [`subscribe`](Self::subscribe)'s receiver, so no read or sleep can
/// stall shutdown.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: watch::Sender<Option<ExitKind>>,
}

impl Shutdown {
    /// Creates an untriggered shutdown signal.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Requests shutdown with the given exit kind. The first call wins;
    /// returns whether this call was the one that triggered it.
    pub fn trigger(&self, kind: ExitKind) -> bool {
        let fired = self.tx.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(kind);
                true
            } else {
                false
            }
        });
        if fired {
            tracing::debug!(?kind, "shutdown triggered");
        }
        fired
    }

    /// A receiver whose `changed()` future resolves when shutdown is
    /// triggered. Subscribe before spawning the loop that waits on it.
    pub fn subscribe(&self) -> watch::Receiver<Option<ExitKind>> {
        self.tx.subscribe()
    }

    /// The exit kind fixed by the first trigger, if any.
    pub fn exit_kind(&self) -> Option<ExitKind> {
        *self.tx.borrow()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

// =========================================================================
// Tests
// =========================================================================
