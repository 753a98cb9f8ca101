//! Session state for the natter chat client.
//!
//! This crate owns the answer to "where are we in the conversation":
//!
//! 1. **Phase** ([`Phase`]) tracks the authentication and membership
//!    lifecycle.
//! 2. **Identity** ([`Session::display_name`]) holds the display name,
//!    empty until the server accepts an auth request.
//! 3. **Guards** ([`SessionError`]) reject user commands issued in the
//!    wrong phase before they cause any network traffic.
//!
//! # How it fits in the stack
//!
//! ```text
//! Dispatcher (above)  ← the only writer; reacts to protocol events
//!     ↕
//! Session (this crate)  ← phase machine and identity
//!     ↕
//! Protocol (below)  ← messages that trigger the transitions
//! ```

mod error;
mod session;

pub use error::SessionError;
pub use session::{Phase, Session};
