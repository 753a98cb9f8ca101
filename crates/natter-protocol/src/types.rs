//! Core protocol types shared by both wire encodings.
//!
//! Everything here is transport-agnostic. A [`Message`] describes WHAT is
//! being said; the [`text`](crate::text) and [`binary`](crate::binary)
//! modules decide HOW it is spelled on each transport.

use std::fmt;

// ---------------------------------------------------------------------------
// MessageId
// ---------------------------------------------------------------------------

/// A 16-bit message identifier used by the datagram transport.
///
/// Newtype wrapper over `u16` so an id can never be confused with a length
/// or a retry count in a signature. Ids are unique per sender for the
/// lifetime of a session and wrap at 65536; assignment lives in the
/// reliability layer, not here.
///
/// On the stream transport ids are meaningless and never appear on the
/// wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId(pub u16);

impl MessageId {
    /// The zero id, used as the header filler for `Confirm` datagrams
    /// (their header id field is unused by the protocol).
    pub const ZERO: MessageId = MessageId(0);
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ReplyStatus
// ---------------------------------------------------------------------------

/// Outcome carried by a server `REPLY`: the request was accepted or it
/// was not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStatus {
    /// The request succeeded (`OK` on the text wire, `1` on the binary
    /// wire).
    Ok,
    /// The request was refused (`NOK` / `0`).
    Nok,
}

impl ReplyStatus {
    /// `true` for [`ReplyStatus::Ok`].
    pub fn is_ok(self) -> bool {
        matches!(self, ReplyStatus::Ok)
    }
}

impl fmt::Display for ReplyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplyStatus::Ok => write!(f, "OK"),
            ReplyStatus::Nok => write!(f, "NOK"),
        }
    }
}

// ---------------------------------------------------------------------------
// MessageKind
// ---------------------------------------------------------------------------

/// The discriminant of a [`Message`], without its payload.
///
/// Used wherever only the kind matters: log lines, error text, and the
/// reliability layer's record of what a pending datagram was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Auth,
    Join,
    Msg,
    Reply,
    Err,
    Bye,
    Confirm,
    Ping,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageKind::Auth => "AUTH",
            MessageKind::Join => "JOIN",
            MessageKind::Msg => "MSG",
            MessageKind::Reply => "REPLY",
            MessageKind::Err => "ERR",
            MessageKind::Bye => "BYE",
            MessageKind::Confirm => "CONFIRM",
            MessageKind::Ping => "PING",
        };
        write!(f, "{name}")
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A protocol message, independent of transport encoding.
///
/// Client-originated kinds are `Auth`, `Join`, `Msg`, `Bye` (and `Err` for
/// reporting a broken peer); server-originated kinds are `Reply`, `Msg`,
/// `Err`, `Bye`, `Ping`. `Confirm` flows both ways on the datagram
/// transport and never appears on the stream transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Authentication request: who the user is, how they want to be shown,
    /// and the shared secret proving it.
    Auth {
        username: String,
        display_name: String,
        secret: String,
    },

    /// Request to join a channel under the given display name.
    Join {
        channel: String,
        display_name: String,
    },

    /// A chat message from `sender`.
    Msg { sender: String, content: String },

    /// Server verdict on the most recent `Auth` or `Join` request.
    Reply {
        status: ReplyStatus,
        content: String,
    },

    /// Fatal protocol error reported by the peer. Terminal for the
    /// session.
    Err { sender: String, content: String },

    /// Session termination notice. No reply is expected.
    Bye { display_name: String },

    /// Datagram-transport acknowledgment of the message with id `ref_id`.
    /// A `Confirm` is never itself confirmed.
    Confirm { ref_id: MessageId },

    /// Datagram-transport keep-alive probe from the server. Carries no
    /// payload; the only required reaction is a `Confirm`.
    Ping,
}

impl Message {
    /// The kind discriminant of this message.
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Auth { .. } => MessageKind::Auth,
            Message::Join { .. } => MessageKind::Join,
            Message::Msg { .. } => MessageKind::Msg,
            Message::Reply { .. } => MessageKind::Reply,
            Message::Err { .. } => MessageKind::Err,
            Message::Bye { .. } => MessageKind::Bye,
            Message::Confirm { .. } => MessageKind::Confirm,
            Message::Ping => MessageKind::Ping,
        }
    }

    /// Whether this message must be acknowledged with a `Confirm` when
    /// carried over the datagram transport.
    ///
    /// Every kind requires one except `Confirm` itself; acknowledging an
    /// acknowledgment would never converge.
    pub fn requires_confirm(&self) -> bool {
        !matches!(self, Message::Confirm { .. })
    }
}

// =========================================================================
// Tests
// =========================================================================
