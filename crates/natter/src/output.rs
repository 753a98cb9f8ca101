//! User-facing output lines.
//!
//! The dispatcher describes output as values; only [`UserLine::emit`]
//! actually prints. Chat traffic and action verdicts go to stdout, error
//! reports to stderr, and none of it goes through the tracing logger
//! (logs are diagnostics, these lines are the product).

use std::fmt;

/// One line of user-visible output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserLine {
    /// An incoming chat message: `<sender>: <content>`.
    Chat { sender: String, content: String },

    /// A request the server accepted: `Action Success: <content>`.
    ActionSuccess(String),

    /// A request the server refused (or that was never confirmed):
    /// `Action Failure: <content>`.
    ActionFailure(String),

    /// A fatal `ERR` from the peer: `ERROR FROM <sender>: <content>`.
    ServerError { sender: String, content: String },

    /// A local error (bad command, wrong phase, invalid peer message):
    /// `ERROR: <content>`.
    Error(String),

    /// Informational text (help, rename notice), printed as-is.
    Info(String),
}

impl fmt::Display for UserLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserLine::Chat { sender, content } => write!(f, "{sender}: {content}"),
            UserLine::ActionSuccess(content) => write!(f, "Action Success: {content}"),
            UserLine::ActionFailure(content) => write!(f, "Action Failure: {content}"),
            UserLine::ServerError { sender, content } => {
                write!(f, "ERROR FROM {sender}: {content}")
            }
            UserLine::Error(content) => write!(f, "ERROR: {content}"),
            UserLine::Info(content) => write!(f, "{content}"),
        }
    }
}

impl UserLine {
    /// Prints the line to its stream: errors to stderr, the rest to
    /// stdout.
    pub fn emit(&self) {
        match self {
            UserLine::ServerError { .. } | UserLine::Error(_) => eprintln!("{self}"),
            _ => println!("{self}"),
        }
    }
}
