//! Binary codec for the datagram transport.
//!
//! Every datagram starts with a fixed 3-byte header:
//!
//! ```text
//! ┌──────────┬─────────────────────┬──────────────────────┐
//! │ kind tag │ message id (u16 BE) │ kind-specific payload │
//! │  1 byte  │       2 bytes       │      0..n bytes       │
//! └──────────┴─────────────────────┴──────────────────────┘
//! ```
//!
//! String fields are raw bytes followed by one terminating zero byte,
//! concatenated in field order. A `CONFIRM` payload is exactly the 2-byte
//! big-endian id being acknowledged; the header id of the `CONFIRM` itself
//! is unused and always written as zero. The 3-byte header is present on
//! every kind, `CONFIRM` included.

use crate::{Message, MessageId, MessageKind, ProtocolError, ReplyStatus};

/// Fixed header size: kind tag plus message id.
pub const HEADER_LEN: usize = 3;

/// Upper bound on an encoded datagram. Large enough for any sane chat
/// payload, small enough to stay under a typical path MTU. Messages that
/// would encode longer are rejected, never truncated.
pub const MAX_DATAGRAM: usize = 1400;

/// Wire tags for each message kind.
mod tag {
    pub const CONFIRM: u8 = 0x00;
    pub const REPLY: u8 = 0x01;
    pub const AUTH: u8 = 0x02;
    pub const JOIN: u8 = 0x03;
    pub const MSG: u8 = 0x04;
    pub const PING: u8 = 0xFD;
    pub const ERR: u8 = 0xFE;
    pub const BYE: u8 = 0xFF;
}

/// Reply status bytes.
const STATUS_OK: u8 = 1;
const STATUS_NOK: u8 = 0;

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encodes a message with the given id into a datagram.
///
/// For `Confirm` the `id` argument is ignored and the header id is written
/// as zero; the acknowledged id travels in the payload.
///
/// # Errors
///
/// - [`ProtocolError::Oversized`] when the encoding would exceed
///   [`MAX_DATAGRAM`].
/// - [`ProtocolError::Malformed`] when a string field contains an interior
///   NUL byte, which the zero-terminated framing cannot carry.
pub fn encode(msg: &Message, id: MessageId) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = Vec::with_capacity(64);

    let header_id = match msg {
        Message::Confirm { .. } => MessageId::ZERO,
        _ => id,
    };
    buf.push(tag_for(msg.kind()));
    buf.extend_from_slice(&header_id.0.to_be_bytes());

    match msg {
        Message::Auth {
            username,
            display_name,
            secret,
        } => {
            put_str(&mut buf, username, MessageKind::Auth)?;
            put_str(&mut buf, display_name, MessageKind::Auth)?;
            put_str(&mut buf, secret, MessageKind::Auth)?;
        }
        Message::Join {
            channel,
            display_name,
        } => {
            put_str(&mut buf, channel, MessageKind::Join)?;
            put_str(&mut buf, display_name, MessageKind::Join)?;
        }
        Message::Msg { sender, content } => {
            put_str(&mut buf, sender, MessageKind::Msg)?;
            put_str(&mut buf, content, MessageKind::Msg)?;
        }
        Message::Reply { status, content } => {
            buf.push(if status.is_ok() { STATUS_OK } else { STATUS_NOK });
            put_str(&mut buf, content, MessageKind::Reply)?;
        }
        Message::Err { sender, content } => {
            put_str(&mut buf, sender, MessageKind::Err)?;
            put_str(&mut buf, content, MessageKind::Err)?;
        }
        Message::Bye { display_name } => {
            put_str(&mut buf, display_name, MessageKind::Bye)?;
        }
        Message::Confirm { ref_id } => {
            buf.extend_from_slice(&ref_id.0.to_be_bytes());
        }
        Message::Ping => {}
    }

    if buf.len() > MAX_DATAGRAM {
        return Err(ProtocolError::Oversized {
            len: buf.len(),
            max: MAX_DATAGRAM,
        });
    }
    Ok(buf)
}

fn tag_for(kind: MessageKind) -> u8 {
    match kind {
        MessageKind::Confirm => tag::CONFIRM,
        MessageKind::Reply => tag::REPLY,
        MessageKind::Auth => tag::AUTH,
        MessageKind::Join => tag::JOIN,
        MessageKind::Msg => tag::MSG,
        MessageKind::Ping => tag::PING,
        MessageKind::Err => tag::ERR,
        MessageKind::Bye => tag::BYE,
    }
}

/// Appends one zero-terminated string field.
fn put_str(buf: &mut Vec<u8>, field: &str, kind: MessageKind) -> Result<(), ProtocolError> {
    if field.bytes().any(|b| b == 0) {
        return Err(ProtocolError::Malformed {
            kind,
            detail: "string field contains a NUL byte".into(),
        });
    }
    buf.extend_from_slice(field.as_bytes());
    buf.push(0);
    Ok(())
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decodes a datagram into its header id and message.
///
/// The id is meaningful for every kind except `Confirm`, whose header id
/// is a filler; the acknowledged id is inside [`Message::Confirm`].
///
/// # Errors
///
/// Any structural problem (short buffer, unknown tag, unterminated or
/// non-UTF-8 field, leftover bytes) yields a [`ProtocolError`]; decoding
/// never panics on hostile input.
pub fn decode(buf: &[u8]) -> Result<(MessageId, Message), ProtocolError> {
    if buf.len() < HEADER_LEN {
        return Err(ProtocolError::Truncated {
            need: HEADER_LEN,
            got: buf.len(),
        });
    }

    let tag = buf[0];
    let id = MessageId(u16::from_be_bytes([buf[1], buf[2]]));
    let mut fields = Fields {
        rest: &buf[HEADER_LEN..],
    };

    let msg = match tag {
        tag::CONFIRM => {
            let ref_id = fields.take_u16(buf.len())?;
            fields.finish()?;
            Message::Confirm {
                ref_id: MessageId(ref_id),
            }
        }
        tag::REPLY => {
            let status = match fields.take_u8(buf.len())? {
                STATUS_OK => ReplyStatus::Ok,
                STATUS_NOK => ReplyStatus::Nok,
                other => {
                    return Err(ProtocolError::Malformed {
                        kind: MessageKind::Reply,
                        detail: format!("invalid status byte 0x{other:02x}"),
                    });
                }
            };
            let content = fields.take_str(MessageKind::Reply)?;
            fields.finish()?;
            Message::Reply { status, content }
        }
        tag::AUTH => {
            let username = fields.take_str(MessageKind::Auth)?;
            let display_name = fields.take_str(MessageKind::Auth)?;
            let secret = fields.take_str(MessageKind::Auth)?;
            fields.finish()?;
            Message::Auth {
                username,
                display_name,
                secret,
            }
        }
        tag::JOIN => {
            let channel = fields.take_str(MessageKind::Join)?;
            let display_name = fields.take_str(MessageKind::Join)?;
            fields.finish()?;
            Message::Join {
                channel,
                display_name,
            }
        }
        tag::MSG => {
            let sender = fields.take_str(MessageKind::Msg)?;
            let content = fields.take_str(MessageKind::Msg)?;
            fields.finish()?;
            Message::Msg { sender, content }
        }
        tag::PING => {
            fields.finish()?;
            Message::Ping
        }
        tag::ERR => {
            let sender = fields.take_str(MessageKind::Err)?;
            let content = fields.take_str(MessageKind::Err)?;
            fields.finish()?;
            Message::Err { sender, content }
        }
        tag::BYE => {
            let display_name = fields.take_str(MessageKind::Bye)?;
            fields.finish()?;
            Message::Bye { display_name }
        }
        other => return Err(ProtocolError::UnknownTag(other)),
    };

    Ok((id, msg))
}

/// Cursor over the payload bytes after the fixed header.
struct Fields<'a> {
    rest: &'a [u8],
}

impl Fields<'_> {
    /// Reads one zero-terminated UTF-8 string field.
    fn take_str(&mut self, kind: MessageKind) -> Result<String, ProtocolError> {
        let end = self
            .rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(ProtocolError::UnterminatedField)?;
        let field = std::str::from_utf8(&self.rest[..end])
            .map_err(|_| ProtocolError::Malformed {
                kind,
                detail: "string field is not valid UTF-8".into(),
            })?
            .to_owned();
        self.rest = &self.rest[end + 1..];
        Ok(field)
    }

    fn take_u8(&mut self, datagram_len: usize) -> Result<u8, ProtocolError> {
        match self.rest.split_first() {
            Some((&byte, rest)) => {
                self.rest = rest;
                Ok(byte)
            }
            None => Err(ProtocolError::Truncated {
                need: datagram_len + 1,
                got: datagram_len,
            }),
        }
    }

    fn take_u16(&mut self, datagram_len: usize) -> Result<u16, ProtocolError> {
        match self.rest {
            [hi, lo, rest @ ..] => {
                let value = u16::from_be_bytes([*hi, *lo]);
                self.rest = rest;
                Ok(value)
            }
            _ => Err(ProtocolError::Truncated {
                need: HEADER_LEN + 2,
                got: datagram_len,
            }),
        }
    }

    /// Asserts the payload is fully consumed.
    fn finish(self) -> Result<(), ProtocolError> {
        if self.rest.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::TrailingBytes {
                extra: self.rest.len(),
            })
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(msg: Message, id: MessageId) {
        let buf = encode(&msg, id).unwrap();
        let (decoded_id, decoded) = decode(&buf).unwrap();
        assert_eq!(decoded, msg);
        if !matches!(msg, Message::Confirm { .. }) {
            assert_eq!(decoded_id, id);
        }
    }

    #[test]
    fn test_auth_round_trip() {
        round_trip(
            Message::Auth {
                username: "alice".into(),
                display_name: "Alice".into(),
                secret: "s3cret".into(),
            },
            MessageId(0),
        );
    }

    #[test]
    fn test_auth_exact_wire_form() {
        let msg = Message::Auth {
            username: "a".into(),
            display_name: "A".into(),
            secret: "s".into(),
        };
        let buf = encode(&msg, MessageId(0x0102)).unwrap();
        assert_eq!(buf, [0x02, 0x01, 0x02, b'a', 0, b'A', 0, b's', 0]);
    }

    #[test]
    fn test_round_trip_all_kinds_with_empty_strings() {
        // The binary framing carries empty fields losslessly; each is just
        // a lone zero terminator.
        let id = MessageId(42);
        round_trip(
            Message::Auth {
                username: String::new(),
                display_name: String::new(),
                secret: String::new(),
            },
            id,
        );
        round_trip(
            Message::Join {
                channel: String::new(),
                display_name: String::new(),
            },
            id,
        );
        round_trip(
            Message::Msg {
                sender: String::new(),
                content: String::new(),
            },
            id,
        );
        round_trip(
            Message::Reply {
                status: ReplyStatus::Nok,
                content: String::new(),
            },
            id,
        );
        round_trip(
            Message::Err {
                sender: String::new(),
                content: String::new(),
            },
            id,
        );
        round_trip(
            Message::Bye {
                display_name: String::new(),
            },
            id,
        );
        round_trip(Message::Ping, id);
        round_trip(Message::Confirm { ref_id: id }, id);
    }

    #[test]
    fn test_round_trip_maximum_length_content() {
        // Header (3) + sender "B\0" (2) + content + terminator (1).
        let content = "x".repeat(MAX_DATAGRAM - 6);
        round_trip(
            Message::Msg {
                sender: "B".into(),
                content,
            },
            MessageId(u16::MAX),
        );
    }

    #[test]
    fn test_oversized_message_is_rejected_not_truncated() {
        let msg = Message::Msg {
            sender: "B".into(),
            content: "x".repeat(MAX_DATAGRAM),
        };
        assert!(matches!(
            encode(&msg, MessageId(1)),
            Err(ProtocolError::Oversized { .. })
        ));
    }

    #[test]
    fn test_confirm_wire_form() {
        // Header id is zero, acknowledged id rides in the payload.
        let buf = encode(
            &Message::Confirm {
                ref_id: MessageId(0xABCD),
            },
            MessageId(0x9999),
        )
        .unwrap();
        assert_eq!(buf, [0x00, 0x00, 0x00, 0xAB, 0xCD]);
    }

    #[test]
    fn test_ping_is_header_only() {
        let buf = encode(&Message::Ping, MessageId(7)).unwrap();
        assert_eq!(buf, [0xFD, 0x00, 0x07]);
    }

    #[test]
    fn test_reply_status_byte() {
        let ok = encode(
            &Message::Reply {
                status: ReplyStatus::Ok,
                content: "hi".into(),
            },
            MessageId(1),
        )
        .unwrap();
        assert_eq!(ok[3], 1);

        let nok = encode(
            &Message::Reply {
                status: ReplyStatus::Nok,
                content: "no".into(),
            },
            MessageId(1),
        )
        .unwrap();
        assert_eq!(nok[3], 0);
    }

    #[test]
    fn test_decode_short_buffer_is_truncated_error() {
        for len in 0..HEADER_LEN {
            let buf = vec![0u8; len];
            assert!(matches!(
                decode(&buf),
                Err(ProtocolError::Truncated { .. })
            ));
        }
    }

    #[test]
    fn test_decode_unknown_tag() {
        let err = decode(&[0x42, 0, 1]).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownTag(0x42)));
    }

    #[test]
    fn test_decode_unterminated_field() {
        // MSG with a sender that never hits its zero terminator.
        let err = decode(&[0x04, 0, 1, b'B', b'o', b'b']).unwrap_err();
        assert!(matches!(err, ProtocolError::UnterminatedField));
    }

    #[test]
    fn test_decode_trailing_bytes() {
        let mut buf = encode(
            &Message::Bye {
                display_name: "Alice".into(),
            },
            MessageId(5),
        )
        .unwrap();
        buf.push(0x7F);
        assert!(matches!(
            decode(&buf),
            Err(ProtocolError::TrailingBytes { extra: 1 })
        ));
    }

    #[test]
    fn test_decode_invalid_reply_status() {
        let buf = [0x01, 0, 1, 9, b'x', 0];
        assert!(matches!(
            decode(&buf),
            Err(ProtocolError::Malformed {
                kind: MessageKind::Reply,
                ..
            })
        ));
    }

    #[test]
    fn test_decode_invalid_utf8_field() {
        let buf = [0x04, 0, 1, 0xFF, 0xFE, 0, b'h', 0];
        assert!(matches!(
            decode(&buf),
            Err(ProtocolError::Malformed {
                kind: MessageKind::Msg,
                ..
            })
        ));
    }

    #[test]
    fn test_encode_rejects_interior_nul() {
        let msg = Message::Msg {
            sender: "B".into(),
            content: "a\0b".into(),
        };
        assert!(matches!(
            encode(&msg, MessageId(1)),
            Err(ProtocolError::Malformed {
                kind: MessageKind::Msg,
                ..
            })
        ));
    }

    #[test]
    fn test_confirm_payload_too_short() {
        let err = decode(&[0x00, 0, 0, 0xAB]).unwrap_err();
        assert!(matches!(err, ProtocolError::Truncated { .. }));
    }
}
