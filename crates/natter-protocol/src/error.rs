//! Error types for the protocol layer.
//!
//! Decode errors are ordinary values here, never panics: a malformed
//! inbound buffer is a peer problem, and the receive loop decides whether
//! to report it or drop it.

use crate::MessageKind;

/// Errors that can occur while encoding or decoding a message.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The message kind exists only on the datagram transport
    /// (`CONFIRM`, `PING`) and cannot be written as a text line.
    #[error("{0} has no text encoding")]
    NotTextual(MessageKind),

    /// A text line started with a keyword the protocol does not define.
    ///
    /// This is an application-level condition, not a framing failure: the
    /// dispatcher reports it to the user and the session continues.
    #[error("unknown message keyword `{0}`")]
    UnknownKeyword(String),

    /// The message was recognized but one of its fields or literals is
    /// missing or invalid.
    #[error("malformed {kind} message: {detail}")]
    Malformed { kind: MessageKind, detail: String },

    /// The datagram is shorter than the smallest valid encoding of its
    /// kind (or shorter than the fixed 3-byte header).
    #[error("datagram too short: need {need} bytes, got {got}")]
    Truncated { need: usize, got: usize },

    /// The first header byte is not a known kind tag.
    #[error("unknown message tag 0x{0:02x}")]
    UnknownTag(u8),

    /// A string field ran to the end of the datagram without its zero
    /// terminator.
    #[error("string field is missing its zero terminator")]
    UnterminatedField,

    /// Bytes were left over after the last field of the message.
    #[error("{extra} unexpected trailing byte(s) after the last field")]
    TrailingBytes { extra: usize },

    /// The encoded message would exceed the datagram size limit. Oversized
    /// messages are rejected outright rather than silently truncated.
    #[error("encoded message is {len} bytes, over the {max}-byte datagram limit")]
    Oversized { len: usize, max: usize },
}
