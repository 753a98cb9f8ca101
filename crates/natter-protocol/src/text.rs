//! Text codec for the stream transport.
//!
//! Each message is one UTF-8 line terminated by CRLF. The grammar is
//! keyword-driven and case-sensitive:
//!
//! ```text
//! AUTH <username> AS <displayName> USING <secret>
//! JOIN <channel> AS <displayName>
//! MSG FROM <displayName> IS <content>
//! REPLY <OK|NOK> IS <content>
//! ERR FROM <displayName> IS <content>
//! BYE FROM <displayName>
//! ```
//!
//! Name and channel fields are single words; `<content>` runs to the end
//! of the line and may contain spaces. Line buffering across partial
//! stream reads is the transport's job: [`decode`] is always handed one
//! complete line (with or without its terminator already stripped).

use crate::{Message, MessageKind, ProtocolError, ReplyStatus};

/// The two-byte end marker of every text-encoded message.
pub const LINE_TERMINATOR: &str = "\r\n";

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encodes a message as a text line, including the trailing CRLF.
///
/// # Errors
///
/// Returns [`ProtocolError::NotTextual`] for `Confirm` and `Ping`, which
/// exist only on the datagram transport.
pub fn encode(msg: &Message) -> Result<String, ProtocolError> {
    let line = match msg {
        Message::Auth {
            username,
            display_name,
            secret,
        } => format!("AUTH {username} AS {display_name} USING {secret}"),
        Message::Join {
            channel,
            display_name,
        } => format!("JOIN {channel} AS {display_name}"),
        Message::Msg { sender, content } => format!("MSG FROM {sender} IS {content}"),
        Message::Reply { status, content } => format!("REPLY {status} IS {content}"),
        Message::Err { sender, content } => format!("ERR FROM {sender} IS {content}"),
        Message::Bye { display_name } => format!("BYE FROM {display_name}"),
        Message::Confirm { .. } | Message::Ping => {
            return Err(ProtocolError::NotTextual(msg.kind()));
        }
    };
    Ok(line + LINE_TERMINATOR)
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decodes one complete text line into a message.
///
/// Tolerates a present or absent line terminator so the caller does not
/// have to strip it first.
///
/// # Errors
///
/// - [`ProtocolError::UnknownKeyword`] when the first word is not a
///   protocol keyword. The caller treats this as an invalid peer message,
///   not a fatal condition.
/// - [`ProtocolError::Malformed`] when a known message is missing a field
///   or literal.
pub fn decode(line: &str) -> Result<Message, ProtocolError> {
    let line = line
        .strip_suffix(LINE_TERMINATOR)
        .or_else(|| line.strip_suffix('\n'))
        .unwrap_or(line);

    let (keyword, rest) = split_word(line);
    match keyword {
        "AUTH" => {
            let (username, rest) = take_word(rest, MessageKind::Auth, "username")?;
            let rest = take_literal(rest, "AS", MessageKind::Auth)?;
            let (display_name, rest) = take_word(rest, MessageKind::Auth, "display name")?;
            let rest = take_literal(rest, "USING", MessageKind::Auth)?;
            let (secret, rest) = take_word(rest, MessageKind::Auth, "secret")?;
            finish(rest, MessageKind::Auth)?;
            Ok(Message::Auth {
                username: username.to_owned(),
                display_name: display_name.to_owned(),
                secret: secret.to_owned(),
            })
        }
        "JOIN" => {
            let (channel, rest) = take_word(rest, MessageKind::Join, "channel")?;
            let rest = take_literal(rest, "AS", MessageKind::Join)?;
            let (display_name, rest) = take_word(rest, MessageKind::Join, "display name")?;
            finish(rest, MessageKind::Join)?;
            Ok(Message::Join {
                channel: channel.to_owned(),
                display_name: display_name.to_owned(),
            })
        }
        "MSG" => {
            let rest = take_literal(rest, "FROM", MessageKind::Msg)?;
            let (sender, rest) = take_word(rest, MessageKind::Msg, "sender")?;
            let content = take_literal(rest, "IS", MessageKind::Msg)?;
            Ok(Message::Msg {
                sender: sender.to_owned(),
                content: content.to_owned(),
            })
        }
        "REPLY" => {
            let (status, rest) = take_word(rest, MessageKind::Reply, "status")?;
            let status = match status {
                "OK" => ReplyStatus::Ok,
                "NOK" => ReplyStatus::Nok,
                other => {
                    return Err(ProtocolError::Malformed {
                        kind: MessageKind::Reply,
                        detail: format!("status must be OK or NOK, found `{other}`"),
                    });
                }
            };
            let content = take_literal(rest, "IS", MessageKind::Reply)?;
            Ok(Message::Reply {
                status,
                content: content.to_owned(),
            })
        }
        "ERR" => {
            let rest = take_literal(rest, "FROM", MessageKind::Err)?;
            let (sender, rest) = take_word(rest, MessageKind::Err, "sender")?;
            let content = take_literal(rest, "IS", MessageKind::Err)?;
            Ok(Message::Err {
                sender: sender.to_owned(),
                content: content.to_owned(),
            })
        }
        "BYE" => {
            let rest = take_literal(rest, "FROM", MessageKind::Bye)?;
            let (display_name, rest) = take_word(rest, MessageKind::Bye, "display name")?;
            finish(rest, MessageKind::Bye)?;
            Ok(Message::Bye {
                display_name: display_name.to_owned(),
            })
        }
        other => Err(ProtocolError::UnknownKeyword(other.to_owned())),
    }
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Splits off the next space-delimited word. Returns `("", s)` shapes as
/// empty words when the line is exhausted; callers decide whether that is
/// an error.
fn split_word(s: &str) -> (&str, &str) {
    match s.split_once(' ') {
        Some((word, rest)) => (word, rest),
        None => (s, ""),
    }
}

/// Takes one required single-word field.
fn take_word<'a>(
    s: &'a str,
    kind: MessageKind,
    field: &str,
) -> Result<(&'a str, &'a str), ProtocolError> {
    let (word, rest) = split_word(s);
    if word.is_empty() {
        return Err(ProtocolError::Malformed {
            kind,
            detail: format!("missing {field}"),
        });
    }
    Ok((word, rest))
}

/// Consumes a required grammar literal (`AS`, `USING`, `FROM`, `IS`) and
/// returns the remainder of the line.
fn take_literal<'a>(s: &'a str, literal: &str, kind: MessageKind) -> Result<&'a str, ProtocolError> {
    let (word, rest) = split_word(s);
    if word != literal {
        return Err(ProtocolError::Malformed {
            kind,
            detail: format!("expected `{literal}`, found `{word}`"),
        });
    }
    Ok(rest)
}

/// Rejects trailing input after the last single-word field of a message.
fn finish(rest: &str, kind: MessageKind) -> Result<(), ProtocolError> {
    if rest.is_empty() {
        Ok(())
    } else {
        Err(ProtocolError::Malformed {
            kind,
            detail: format!("unexpected trailing input `{rest}`"),
        })
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(msg: Message) {
        let line = encode(&msg).unwrap();
        assert!(line.ends_with(LINE_TERMINATOR), "missing terminator: {line:?}");
        assert_eq!(decode(&line).unwrap(), msg);
    }

    #[test]
    fn test_auth_round_trip() {
        round_trip(Message::Auth {
            username: "alice".into(),
            display_name: "Alice".into(),
            secret: "s3cret".into(),
        });
    }

    #[test]
    fn test_auth_exact_wire_form() {
        let msg = Message::Auth {
            username: "alice".into(),
            display_name: "Alice".into(),
            secret: "s3cret".into(),
        };
        assert_eq!(encode(&msg).unwrap(), "AUTH alice AS Alice USING s3cret\r\n");
    }

    #[test]
    fn test_join_round_trip() {
        round_trip(Message::Join {
            channel: "general".into(),
            display_name: "Alice".into(),
        });
    }

    #[test]
    fn test_msg_round_trip_with_spaces_in_content() {
        round_trip(Message::Msg {
            sender: "Bob".into(),
            content: "hello there, spaces  and   runs".into(),
        });
    }

    #[test]
    fn test_msg_round_trip_with_empty_content() {
        round_trip(Message::Msg {
            sender: "Bob".into(),
            content: String::new(),
        });
    }

    #[test]
    fn test_reply_ok_and_nok_round_trip() {
        round_trip(Message::Reply {
            status: ReplyStatus::Ok,
            content: "Joined default.".into(),
        });
        round_trip(Message::Reply {
            status: ReplyStatus::Nok,
            content: "Auth failed.".into(),
        });
    }

    #[test]
    fn test_err_round_trip() {
        round_trip(Message::Err {
            sender: "Server".into(),
            content: "bad state".into(),
        });
    }

    #[test]
    fn test_bye_round_trip() {
        round_trip(Message::Bye {
            display_name: "Alice".into(),
        });
    }

    #[test]
    fn test_decode_tolerates_missing_terminator() {
        let msg = decode("BYE FROM Alice").unwrap();
        assert_eq!(
            msg,
            Message::Bye {
                display_name: "Alice".into()
            }
        );
    }

    #[test]
    fn test_decode_tolerates_bare_newline() {
        let msg = decode("REPLY OK IS done\n").unwrap();
        assert!(matches!(msg, Message::Reply { status: ReplyStatus::Ok, .. }));
    }

    #[test]
    fn test_confirm_and_ping_have_no_text_form() {
        let confirm = Message::Confirm {
            ref_id: crate::MessageId(1),
        };
        assert!(matches!(
            encode(&confirm),
            Err(ProtocolError::NotTextual(MessageKind::Confirm))
        ));
        assert!(matches!(
            encode(&Message::Ping),
            Err(ProtocolError::NotTextual(MessageKind::Ping))
        ));
    }

    #[test]
    fn test_unknown_keyword_is_reported_not_guessed() {
        let err = decode("HELLO world\r\n").unwrap_err();
        match err {
            ProtocolError::UnknownKeyword(word) => assert_eq!(word, "HELLO"),
            other => panic!("expected UnknownKeyword, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_literal_is_malformed() {
        // `AS` misspelled.
        let err = decode("JOIN general WITH Alice\r\n").unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Malformed {
                kind: MessageKind::Join,
                ..
            }
        ));
    }

    #[test]
    fn test_missing_field_is_malformed() {
        let err = decode("AUTH alice AS\r\n").unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Malformed {
                kind: MessageKind::Auth,
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_reply_status_is_malformed() {
        let err = decode("REPLY MAYBE IS who knows\r\n").unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Malformed {
                kind: MessageKind::Reply,
                ..
            }
        ));
    }

    #[test]
    fn test_trailing_input_after_bye_is_malformed() {
        let err = decode("BYE FROM Alice extra\r\n").unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Malformed {
                kind: MessageKind::Bye,
                ..
            }
        ));
    }

    #[test]
    fn test_keywords_are_case_sensitive() {
        assert!(matches!(
            decode("auth alice AS Alice USING s\r\n"),
            Err(ProtocolError::UnknownKeyword(_))
        ));
    }
}
