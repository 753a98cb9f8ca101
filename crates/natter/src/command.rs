//! User command parsing.
//!
//! One line of user input becomes one [`UserCommand`]. Lines starting with
//! `/` are commands; anything else non-empty is a chat message sent
//! verbatim. Parsing is purely lexical: phase rules (may I `/join` yet?)
//! are the dispatcher's business, not this module's.

/// Help text printed by `/help` and on malformed commands.
pub const HELP_TEXT: &str = "\
/auth {username} {secret} {displayName}   authenticate with the server
/join {channel}                           join a channel
/rename {displayName}                     change the local display name
/help                                     show this help
anything else                             send a chat message";

/// A parsed line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    /// `/auth <username> <secret> <displayName>`
    Auth {
        username: String,
        secret: String,
        display_name: String,
    },

    /// `/join <channel>`
    Join { channel: String },

    /// `/rename <displayName>`, local only.
    Rename { display_name: String },

    /// `/help`
    Help,

    /// A plain chat message.
    Chat(String),
}

/// Errors for lines that look like commands but are not valid ones.
///
/// These are reported locally and cause no network traffic.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CommandError {
    /// The line starts with `/` but the command name is not known.
    #[error("unknown command `/{0}`, see /help")]
    Unknown(String),

    /// A known command with the wrong number of arguments.
    #[error("usage: {0}")]
    Usage(&'static str),
}

/// Parses one input line.
///
/// Returns `Ok(None)` for blank lines, which are silently ignored.
pub fn parse(line: &str) -> Result<Option<UserCommand>, CommandError> {
    if line.trim().is_empty() {
        return Ok(None);
    }

    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Some(UserCommand::Chat(line.to_owned())));
    };

    let mut words = rest.split_whitespace();
    let name = words.next().unwrap_or("");
    let args: Vec<&str> = words.collect();

    let cmd = match name {
        "auth" => match args.as_slice() {
            [username, secret, display_name] => UserCommand::Auth {
                username: (*username).to_owned(),
                secret: (*secret).to_owned(),
                display_name: (*display_name).to_owned(),
            },
            _ => {
                return Err(CommandError::Usage(
                    "/auth {username} {secret} {displayName}",
                ));
            }
        },
        "join" => match args.as_slice() {
            [channel] => UserCommand::Join {
                channel: (*channel).to_owned(),
            },
            _ => return Err(CommandError::Usage("/join {channel}")),
        },
        "rename" => match args.as_slice() {
            [display_name] => UserCommand::Rename {
                display_name: (*display_name).to_owned(),
            },
            _ => return Err(CommandError::Usage("/rename {displayName}")),
        },
        "help" => UserCommand::Help,
        other => return Err(CommandError::Unknown(other.to_owned())),
    };
    Ok(Some(cmd))
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_command() {
        let cmd = parse("/auth alice s3cret Alice").unwrap().unwrap();
        assert_eq!(
            cmd,
            UserCommand::Auth {
                username: "alice".into(),
                secret: "s3cret".into(),
                display_name: "Alice".into(),
            }
        );
    }

    #[test]
    fn test_auth_with_wrong_arity_is_usage_error() {
        assert!(matches!(
            parse("/auth alice"),
            Err(CommandError::Usage(_))
        ));
        assert!(matches!(
            parse("/auth a b c d"),
            Err(CommandError::Usage(_))
        ));
    }

    #[test]
    fn test_join_command() {
        let cmd = parse("/join general").unwrap().unwrap();
        assert_eq!(
            cmd,
            UserCommand::Join {
                channel: "general".into()
            }
        );
    }

    #[test]
    fn test_rename_command() {
        let cmd = parse("/rename Alicia").unwrap().unwrap();
        assert_eq!(
            cmd,
            UserCommand::Rename {
                display_name: "Alicia".into()
            }
        );
    }

    #[test]
    fn test_help_command() {
        assert_eq!(parse("/help").unwrap().unwrap(), UserCommand::Help);
    }

    #[test]
    fn test_unknown_command_is_rejected_not_sent_as_chat() {
        let err = parse("/quit").unwrap_err();
        assert_eq!(err, CommandError::Unknown("quit".into()));
    }

    #[test]
    fn test_plain_line_is_chat() {
        let cmd = parse("hello there").unwrap().unwrap();
        assert_eq!(cmd, UserCommand::Chat("hello there".into()));
    }

    #[test]
    fn test_blank_lines_are_ignored() {
        assert_eq!(parse("").unwrap(), None);
        assert_eq!(parse("   ").unwrap(), None);
    }
}
