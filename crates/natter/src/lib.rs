//! # natter
//!
//! A chat client that speaks one protocol over two interchangeable
//! transports: a reliable TCP byte stream carrying text lines, and an
//! unreliable UDP datagram flow carrying a compact binary encoding with
//! an acknowledgment/retransmission layer on top.
//!
//! The layers, leaves first:
//!
//! ```text
//! natter-protocol      message model, text and binary codecs
//! natter-transport     TCP line framing, UDP socket wrapper
//! natter-session       authentication/membership phase machine
//! natter-reliability   pending sends, confirms, duplicate suppression
//! natter (this crate)  command parsing, dispatcher, client loops
//! ```
//!
//! Both client variants implement [`ChatClient`] and share the dispatcher
//! and session logic; transport-specific code is confined to the codecs
//! and the reliability machinery.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use natter::{ChatClient, ClientConfig, DatagramClient};
//!
//! # async fn demo() -> Result<(), natter::NatterError> {
//! let client = DatagramClient::connect(ClientConfig::new("chat.example.org", 4567)).await?;
//! let exit = client.run().await?;
//! std::process::exit(exit.code().into())
//! # }
//! ```

#![allow(async_fn_in_trait)]

pub mod command;
pub mod dispatch;

mod client;
mod datagram;
mod error;
mod output;
mod stream;

pub use client::{ChatClient, ClientConfig, ExitKind, Shutdown};
pub use command::{CommandError, UserCommand};
pub use datagram::DatagramClient;
pub use error::NatterError;
pub use output::UserLine;
pub use stream::StreamClient;
