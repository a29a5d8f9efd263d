//! Wire protocol definitions
//!
//! Plain-text, newline-delimited protocol. Inbound lines are classified
//! into `ClientMessage` by [`ClientMessage::parse`]; outbound replies are
//! `ServerMessage` values rendered through `Display` (the line codec adds
//! the trailing newline).

use std::fmt;

use crate::error::AppError;

/// Client → Server message
///
/// The result of classifying one trimmed, non-empty input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// `/nick <name>` - set or replace the nickname
    Nick(String),
    /// `/join <room>` - join a room, leaving any current one
    Join(String),
    /// `/leave` - leave the current room
    Leave,
    /// `/bye` - disconnect
    Bye,
    /// `/priv <nick> <text>` - private message to one registered client
    Priv { to: String, text: String },
    /// Plain chat line (including `//`-escaped literals)
    Chat(String),
    /// Unknown slash command or structurally malformed argument
    Invalid,
}

impl ClientMessage {
    /// Classify a trimmed, non-empty line.
    ///
    /// `//...` is the escape form: exactly one leading `/` is stripped and
    /// the remainder is a chat message. Any other `/`-prefixed line is
    /// split on the first space into command and argument; commands outside
    /// the protocol yield `Invalid` and never fall through to chat.
    pub fn parse(line: &str) -> Self {
        if let Some(escaped) = line.strip_prefix("//") {
            return Self::Chat(format!("/{escaped}"));
        }
        if line.starts_with('/') {
            let (command, argument) = match line.split_once(' ') {
                Some((cmd, arg)) => (cmd, arg.trim()),
                None => (line, ""),
            };
            return match command {
                "/nick" => Self::Nick(argument.to_string()),
                "/join" => Self::Join(argument.to_string()),
                "/leave" => Self::Leave,
                "/bye" => Self::Bye,
                // /priv needs both a recipient and a message text
                "/priv" => match argument.split_once(' ') {
                    Some((to, text)) => Self::Priv {
                        to: to.trim().to_string(),
                        text: text.trim().to_string(),
                    },
                    None => Self::Invalid,
                },
                _ => Self::Invalid,
            };
        }
        Self::Chat(line.to_string())
    }
}

/// Server → Client message
///
/// Every variant renders as a single protocol line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Command accepted
    Ok,
    /// Protocol error (unknown command, conflict, malformed argument, ...)
    Error,
    /// Global chat broadcast
    Message { from: String, text: String },
    /// A client replaced its existing nickname
    NewNick { old: String, new: String },
    /// A client joined the recipient's room
    Joined { nick: String },
    /// A client left the recipient's room
    Left { nick: String },
    /// Private message delivery
    Private { from: String, text: String },
    /// Goodbye; the last line before the server closes the connection
    Bye,
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Error => write!(f, "ERROR"),
            Self::Message { from, text } => write!(f, "MESSAGE {from} {text}"),
            Self::NewNick { old, new } => write!(f, "NEWNICK {old} {new}"),
            Self::Joined { nick } => write!(f, "JOINED {nick}"),
            Self::Left { nick } => write!(f, "LEFT {nick}"),
            Self::Private { from, text } => write!(f, "PRIVATE {from} {text}"),
            Self::Bye => write!(f, "BYE"),
        }
    }
}

/// Convert AppError to ServerMessage for client notification
///
/// All protocol failures collapse to the single `ERROR` token on the wire;
/// the distinction lives in logs. Fatal errors never reach this conversion
/// (the connection closes without a reply).
impl From<AppError> for ServerMessage {
    fn from(_err: AppError) -> Self {
        ServerMessage::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            ClientMessage::parse("/nick alice"),
            ClientMessage::Nick("alice".to_string())
        );
        assert_eq!(
            ClientMessage::parse("/join lobby"),
            ClientMessage::Join("lobby".to_string())
        );
        assert_eq!(ClientMessage::parse("/leave"), ClientMessage::Leave);
        assert_eq!(ClientMessage::parse("/bye"), ClientMessage::Bye);
    }

    #[test]
    fn test_parse_command_without_argument() {
        assert_eq!(ClientMessage::parse("/nick"), ClientMessage::Nick(String::new()));
        assert_eq!(ClientMessage::parse("/join"), ClientMessage::Join(String::new()));
    }

    #[test]
    fn test_parse_priv() {
        assert_eq!(
            ClientMessage::parse("/priv bob hello there"),
            ClientMessage::Priv {
                to: "bob".to_string(),
                text: "hello there".to_string()
            }
        );
        // Missing message text is malformed
        assert_eq!(ClientMessage::parse("/priv bob"), ClientMessage::Invalid);
        assert_eq!(ClientMessage::parse("/priv"), ClientMessage::Invalid);
    }

    #[test]
    fn test_parse_unknown_command() {
        assert_eq!(ClientMessage::parse("/quit"), ClientMessage::Invalid);
        assert_eq!(ClientMessage::parse("/nickname alice"), ClientMessage::Invalid);
    }

    #[test]
    fn test_parse_escape() {
        // "//x" says "/x" - exactly one slash is stripped
        assert_eq!(
            ClientMessage::parse("//nick is a command"),
            ClientMessage::Chat("/nick is a command".to_string())
        );
        assert_eq!(
            ClientMessage::parse("///triple"),
            ClientMessage::Chat("//triple".to_string())
        );
    }

    #[test]
    fn test_parse_plain_chat() {
        assert_eq!(
            ClientMessage::parse("hello world"),
            ClientMessage::Chat("hello world".to_string())
        );
    }

    #[test]
    fn test_server_message_display() {
        assert_eq!(ServerMessage::Ok.to_string(), "OK");
        assert_eq!(ServerMessage::Error.to_string(), "ERROR");
        assert_eq!(ServerMessage::Bye.to_string(), "BYE");
        assert_eq!(
            ServerMessage::Message {
                from: "alice".to_string(),
                text: "hi all".to_string()
            }
            .to_string(),
            "MESSAGE alice hi all"
        );
        assert_eq!(
            ServerMessage::NewNick {
                old: "alice".to_string(),
                new: "alicia".to_string()
            }
            .to_string(),
            "NEWNICK alice alicia"
        );
        assert_eq!(
            ServerMessage::Private {
                from: "bob".to_string(),
                text: "psst".to_string()
            }
            .to_string(),
            "PRIVATE bob psst"
        );
    }

    #[test]
    fn test_app_error_renders_as_error_line() {
        let msg: ServerMessage = AppError::UnknownCommand.into();
        assert_eq!(msg, ServerMessage::Error);
    }
}
