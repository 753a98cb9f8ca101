//! Transport layer for the natter chat client.
//!
//! Thin wrappers over the raw sockets, one per supported transport:
//!
//! - [`StreamTransport`] wraps a TCP connection and handles the one piece
//!   of framing the stream side needs: buffering partial reads into
//!   complete CRLF-terminated lines before they reach the codec.
//! - [`DatagramTransport`] wraps a UDP socket bound to an ephemeral local
//!   port and locked to the server address, so sends and receives are
//!   plain calls with no per-packet addressing.
//!
//! Nothing here understands the protocol. Bytes in, bytes out; the codecs
//! in `natter-protocol` give them meaning.

mod datagram;
mod error;
mod stream;

pub use datagram::DatagramTransport;
pub use error::TransportError;
pub use stream::{LineReader, LineWriter, StreamTransport};
