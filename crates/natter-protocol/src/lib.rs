//! Wire protocol for the natter chat client.
//!
//! This crate defines the "language" the client and server speak:
//!
//! - **Types** ([`Message`], [`MessageId`], [`ReplyStatus`]) describe the
//!   message structures that travel on the wire.
//! - **Codecs** ([`text`], [`binary`]) convert those messages to and from
//!   each transport's byte encoding.
//! - **Errors** ([`ProtocolError`]) describe what can go wrong during
//!   encoding and decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and the
//! dispatcher (session context). It knows nothing about sockets,
//! retransmission, or phases. It only knows how to turn a [`Message`] into
//! bytes and back.
//!
//! ```text
//! Transport (bytes) → Protocol (Message) → Dispatcher (session context)
//! ```
//!
//! The same [`Message`] has two encodings: a CRLF-terminated text line for
//! the stream transport and a tagged binary datagram for the datagram
//! transport. Both are lossless within their grammar, so
//! `decode(encode(m)) == m` holds on either side.

pub mod binary;
pub mod text;

mod error;
mod types;

pub use error::ProtocolError;
pub use types::{Message, MessageId, MessageKind, ReplyStatus};
