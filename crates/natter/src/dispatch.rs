//! The dispatcher: protocol events in, decisions out.
//!
//! Every inbound message and every user command flows through one of the
//! functions here, under the client's shared-state lock. The dispatcher
//! mutates the [`Session`], consults the reliability state on the
//! datagram path, and returns an [`Outcome`] describing what the calling
//! loop should do: which lines to show the user, whether to send a
//! `CONFIRM`, whether to shut down. The loops do all I/O; keeping this
//! layer free of sockets is what makes the protocol table testable
//! line-for-line.
//!
//! The inbound table:
//!
//! | Inbound        | Precondition   | Effect                                    |
//! |----------------|----------------|-------------------------------------------|
//! | `REPLY OK`     | authenticating | joined, name fixed, `Action Success:` line |
//! | `REPLY NOK`    | authenticating | back to unauthenticated, `Action Failure:` |
//! | `REPLY`        | joined         | `Action Success/Failure:` line only        |
//! | `MSG`          | joined         | `<sender>: <content>` line                 |
//! | `ERR`          | any            | error line, terminate, non-zero exit       |
//! | `BYE`          | any            | terminate, clean exit, no reply            |
//! | `PING`         | any (datagram) | confirm only                               |
//! | anything else  | any            | local invalid-message line                 |

use natter_protocol::{Message, MessageId, MessageKind, ProtocolError};
use natter_reliability::ReliabilityManager;
use natter_session::{Phase, Session, SessionError};

use crate::client::ExitKind;
use crate::command::{HELP_TEXT, UserCommand};
use crate::output::UserLine;

// ---------------------------------------------------------------------------
// Outcome types
// ---------------------------------------------------------------------------

/// What the receive loop should do after one inbound message.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Outcome {
    /// Lines to show the user, in order.
    pub lines: Vec<UserLine>,
    /// Id to acknowledge with a `CONFIRM` (datagram transport only).
    pub confirm: Option<MessageId>,
    /// When set, the session is over and shutdown starts with this exit.
    pub exit: Option<ExitKind>,
}

impl Outcome {
    fn none() -> Self {
        Self::default()
    }

    fn line(line: UserLine) -> Self {
        Self {
            lines: vec![line],
            ..Self::default()
        }
    }
}

/// What the input loop should do after one user command.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Lines to show the user (help text, local errors).
    pub lines: Vec<UserLine>,
    /// Message to transmit, if the command survived its phase guard.
    pub send: Option<Message>,
    /// When set, the input loop blocks until the auth verdict arrives
    /// before reading the next line.
    pub await_reply: bool,
}

impl CommandOutcome {
    fn line(line: UserLine) -> Self {
        Self {
            lines: vec![line],
            ..Self::default()
        }
    }

    fn send(msg: Message) -> Self {
        Self {
            send: Some(msg),
            ..Self::default()
        }
    }

    fn reject(err: SessionError) -> Self {
        Self::line(UserLine::Error(err.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Inbound messages
// ---------------------------------------------------------------------------

/// Routes one decoded inbound message (stream semantics: the transport
/// already guarantees ordered, exactly-once delivery, so there is no
/// dedup and no confirm).
pub fn dispatch_inbound(session: &mut Session, msg: Message) -> Outcome {
    match msg {
        Message::Reply { status, content } => {
            let verdict = if status.is_ok() {
                UserLine::ActionSuccess(content)
            } else {
                UserLine::ActionFailure(content)
            };
            match session.phase() {
                Phase::Authenticating => {
                    if status.is_ok() {
                        session.auth_succeeded();
                    } else {
                        session.auth_failed();
                    }
                    Outcome::line(verdict)
                }
                // A reply while joined is the verdict on a /join request;
                // membership does not change on failure.
                Phase::Joined => Outcome::line(verdict),
                phase => Outcome::line(UserLine::Error(format!(
                    "unexpected REPLY from server while {phase}"
                ))),
            }
        }

        Message::Msg { sender, content } => match session.phase() {
            Phase::Joined => Outcome::line(UserLine::Chat { sender, content }),
            phase => Outcome::line(UserLine::Error(format!(
                "unexpected MSG from server while {phase}"
            ))),
        },

        Message::Err { sender, content } => {
            session.terminate();
            Outcome {
                lines: vec![UserLine::ServerError { sender, content }],
                confirm: None,
                exit: Some(ExitKind::ServerError),
            }
        }

        Message::Bye { display_name } => {
            tracing::info!(peer = %display_name, "server ended the session");
            session.terminate();
            Outcome {
                exit: Some(ExitKind::Clean),
                ..Outcome::default()
            }
        }

        // Nothing to do beyond the confirm the datagram wrapper adds.
        Message::Ping => Outcome::none(),

        // The server has no business sending these.
        other => Outcome::line(UserLine::Error(format!(
            "unexpected {} message from server",
            other.kind()
        ))),
    }
}

/// Routes one decoded inbound datagram: confirm bookkeeping and duplicate
/// suppression wrapped around the shared table above.
///
/// Every kind except `CONFIRM` is acknowledged, duplicates included (the
/// peer may have lost the first confirm); a duplicate's side effects are
/// suppressed so a redelivered chat line prints once and a redelivered
/// `BYE` cannot re-trigger shutdown.
pub fn dispatch_datagram(
    session: &mut Session,
    reliability: &mut ReliabilityManager,
    id: MessageId,
    msg: Message,
) -> Outcome {
    if let Message::Confirm { ref_id } = msg {
        reliability.on_confirm(ref_id);
        return Outcome::none();
    }

    let fresh = reliability.on_inbound(id);
    let mut outcome = if fresh {
        dispatch_inbound(session, msg)
    } else {
        Outcome::none()
    };
    outcome.confirm = Some(id);
    outcome
}

/// Reports a decode failure on the receive path.
///
/// An unknown keyword is an application-level condition the user should
/// see; anything else (truncated datagram, bad literal) is dropped with a
/// debug log. Neither is fatal and, on the datagram transport, neither is
/// confirmed: there is nothing trustworthy to confirm.
pub fn dispatch_decode_failure(err: &ProtocolError) -> Outcome {
    match err {
        ProtocolError::UnknownKeyword(keyword) => Outcome::line(UserLine::Error(format!(
            "invalid message from server (unknown keyword `{keyword}`)"
        ))),
        other => {
            tracing::debug!(error = %other, "dropping undecodable inbound message");
            Outcome::none()
        }
    }
}

/// Surfaces a delivery failure from the retransmission sweep.
///
/// Failure of one send never terminates the session. A failed `AUTH` also
/// rolls the phase back so the input loop stops waiting for a verdict
/// that will never come.
pub fn on_delivery_failure(session: &mut Session, kind: MessageKind, id: MessageId) -> Outcome {
    if kind == MessageKind::Auth && session.phase() == Phase::Authenticating {
        session.auth_failed();
        return Outcome::line(UserLine::ActionFailure(
            "authentication was not confirmed by the server".into(),
        ));
    }
    Outcome::line(UserLine::Error(format!(
        "{kind} message {id} was not confirmed by the server"
    )))
}

// ---------------------------------------------------------------------------
// User commands
// ---------------------------------------------------------------------------

/// Routes one parsed user command through the session's phase guards.
///
/// A rejected command produces a local error line and no traffic; an
/// accepted one produces the message to transmit. Transport-specific
/// concerns (ids, registration, actual sending) stay with the caller.
pub fn dispatch_command(session: &mut Session, cmd: UserCommand) -> CommandOutcome {
    match cmd {
        UserCommand::Auth {
            username,
            secret,
            display_name,
        } => match session.begin_auth(&display_name) {
            Ok(()) => CommandOutcome {
                await_reply: true,
                ..CommandOutcome::send(Message::Auth {
                    username,
                    display_name,
                    secret,
                })
            },
            Err(err) => CommandOutcome::reject(err),
        },

        UserCommand::Join { channel } => match session.require_joined("/join") {
            Ok(()) => CommandOutcome::send(Message::Join {
                channel,
                display_name: session.display_name().to_owned(),
            }),
            Err(err) => CommandOutcome::reject(err),
        },

        UserCommand::Rename { display_name } => match session.rename(&display_name) {
            Ok(()) => CommandOutcome::line(UserLine::Info(format!(
                "display name changed to {display_name}"
            ))),
            Err(err) => CommandOutcome::reject(err),
        },

        UserCommand::Help => CommandOutcome::line(UserLine::Info(HELP_TEXT.to_owned())),

        UserCommand::Chat(content) => match session.require_joined("sending messages") {
            Ok(()) => CommandOutcome::send(Message::Msg {
                sender: session.display_name().to_owned(),
                content,
            }),
            Err(err) => CommandOutcome::reject(err),
        },
    }
}

// =========================================================================
// Tests
// =========================================================================
