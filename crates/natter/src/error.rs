//! Unified error type for the natter client.

use natter_protocol::ProtocolError;
use natter_session::SessionError;
use natter_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// Errors local to one command (phase guards, oversized content) are
/// rendered as user-visible lines and never surface here; what does reach
/// a `NatterError` is something the owning loop cannot recover from, and
/// it escalates into client shutdown. The `#[from]` attributes let `?`
/// convert sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum NatterError {
    /// A transport-level error (connect, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (phase guard violation).
    #[error(transparent)]
    Session(#[from] SessionError),
}
