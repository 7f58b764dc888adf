//! Structured events produced from inbound protocol lines.

use std::fmt;

use tracing::debug;

use crate::error::{MessageParseError, OriginError};

use super::nom_parser::SplitLine;

/// Marker bytes around a CTCP ACTION body.
const ACTION_PREFIX: &str = "\x01ACTION ";
const ACTION_SUFFIX: char = '\x01';

/// What kind of line an event came from.
///
/// Unknown commands are kept verbatim in [`EventKind::Other`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum EventKind {
    /// `PRIVMSG`
    Privmsg,
    /// `PRIVMSG` carrying a `\x01ACTION ...\x01` envelope.
    Action,
    /// `NOTICE` from a user.
    Notice,
    /// `JOIN`
    Join,
    /// `PART`
    Part,
    /// `KICK`
    Kick,
    /// `TOPIC`
    Topic,
    /// `PING` that reached the parser.
    Ping,
    /// Three-digit numeric reply.
    Numeric(u16),
    /// `NOTICE` from the server.
    ServerNotice,
    /// Any other command.
    Other(String),
}

impl EventKind {
    fn classify(command: &str, origin: &Origin) -> Self {
        match command.to_ascii_uppercase().as_str() {
            "PRIVMSG" => Self::Privmsg,
            "NOTICE" if origin.is_server() => Self::ServerNotice,
            "NOTICE" => Self::Notice,
            "JOIN" => Self::Join,
            "PART" => Self::Part,
            "KICK" => Self::Kick,
            "TOPIC" => Self::Topic,
            "PING" => Self::Ping,
            _ => match numeric_code(command) {
                Some(code) => Self::Numeric(code),
                None => Self::Other(command.to_owned()),
            },
        }
    }

    /// Returns the wire name of this kind (`"ACTION"` for actions).
    pub fn as_str(&self) -> &str {
        match self {
            Self::Privmsg => "PRIVMSG",
            Self::Action => "ACTION",
            Self::Notice | Self::ServerNotice => "NOTICE",
            Self::Join => "JOIN",
            Self::Part => "PART",
            Self::Kick => "KICK",
            Self::Topic => "TOPIC",
            Self::Ping => "PING",
            Self::Numeric(_) => "NUMERIC",
            Self::Other(command) => command,
        }
    }
}

fn numeric_code(command: &str) -> Option<u16> {
    if command.len() == 3 && command.bytes().all(|b| b.is_ascii_digit()) {
        command.parse().ok()
    } else {
        None
    }
}

/// The sender of a line: a user or the server itself.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Origin {
    /// A user, identified by nick and `user@host`.
    User {
        /// Nickname.
        nick: String,
        /// Everything after the `!` in the sender token.
        userhost: String,
    },
    /// A server. The hostname is empty when the server omitted its prefix.
    Server {
        /// Server hostname.
        hostname: String,
    },
}

impl Origin {
    /// Build an origin from optional parts.
    ///
    /// Exactly one shape must be populated: both `nick` and `userhost`, or
    /// `hostname` alone.
    pub fn from_parts(
        nick: Option<String>,
        userhost: Option<String>,
        hostname: Option<String>,
    ) -> Result<Self, OriginError> {
        match (nick, userhost, hostname) {
            (Some(nick), Some(userhost), None) => Ok(Self::User { nick, userhost }),
            (None, None, Some(hostname)) => Ok(Self::Server { hostname }),
            (None, None, None) => Err(OriginError::Missing),
            (Some(_), Some(_), Some(_)) => Err(OriginError::Ambiguous),
            (Some(_), None, Some(_)) | (None, Some(_), Some(_)) => Err(OriginError::Ambiguous),
            (Some(_), None, None) | (None, Some(_), None) => Err(OriginError::IncompleteUser),
        }
    }

    /// Interpret a sender token (without the leading `:`).
    pub fn from_token(token: &str) -> Result<Self, OriginError> {
        match token.split_once('!') {
            Some((nick, userhost)) => {
                Self::from_parts(Some(nick.to_owned()), Some(userhost.to_owned()), None)
            }
            None => Self::from_parts(None, None, Some(token.to_owned())),
        }
    }

    /// Returns `true` for server-originated lines.
    pub fn is_server(&self) -> bool {
        matches!(self, Self::Server { .. })
    }

    /// Returns `true` for user-originated lines.
    pub fn is_user(&self) -> bool {
        matches!(self, Self::User { .. })
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User { nick, userhost } => write!(f, "{}!{}", nick, userhost),
            Self::Server { hostname } => f.write_str(hostname),
        }
    }
}

/// One parsed inbound line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedEvent {
    /// Classified command.
    pub kind: EventKind,
    /// Header tokens before the body, sender token included when present.
    pub raw_headers: Vec<String>,
    /// Text after the body delimiter, with any ACTION envelope removed.
    pub body: String,
    /// Who sent the line.
    pub origin: Origin,
    /// Command token as received.
    pub command: String,
    /// First header token after the command, usually a channel or nick.
    pub target: Option<String>,
}

impl ParsedEvent {
    /// Parse a line (without its CRLF) into an event.
    pub fn parse(line: &str) -> Result<Self, MessageParseError> {
        parse_line(line)
    }

    /// Sender nickname for user-originated events.
    pub fn nick(&self) -> Option<&str> {
        match &self.origin {
            Origin::User { nick, .. } => Some(nick),
            Origin::Server { .. } => None,
        }
    }

    /// Sender `user@host` for user-originated events.
    pub fn userhost(&self) -> Option<&str> {
        match &self.origin {
            Origin::User { userhost, .. } => Some(userhost),
            Origin::Server { .. } => None,
        }
    }

    /// Server hostname for server-originated events.
    pub fn server_hostname(&self) -> Option<&str> {
        match &self.origin {
            Origin::Server { hostname } => Some(hostname),
            Origin::User { .. } => None,
        }
    }

    /// Returns `true` if this is the `001` welcome reply.
    pub fn is_welcome(&self) -> bool {
        self.kind == EventKind::Numeric(1)
    }
}

impl fmt::Display for ParsedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.command, self.origin)?;
        if let Some(target) = &self.target {
            write!(f, " -> {}", target)?;
        }
        if !self.body.is_empty() {
            write!(f, ": {}", self.body)?;
        }
        Ok(())
    }
}

/// Parse one protocol line into a [`ParsedEvent`].
///
/// Lines with fewer than two header tokens are logged at debug level. A line
/// without a sender marker is parsed best-effort with a server origin and an
/// empty hostname.
pub fn parse_line(line: &str) -> Result<ParsedEvent, MessageParseError> {
    if line.trim().is_empty() {
        return Err(MessageParseError::EmptyMessage);
    }

    let split = SplitLine::parse(line);
    let raw_headers: Vec<String> = split.tokens().map(str::to_owned).collect();
    if raw_headers.len() < 2 {
        debug!(line, tokens = raw_headers.len(), "short header");
    }

    let (origin, command_index) = if split.prefixed {
        if raw_headers.len() < 2 {
            return Err(MessageParseError::MissingCommand(line.to_owned()));
        }
        (Origin::from_token(&raw_headers[0])?, 1)
    } else {
        if raw_headers.is_empty() {
            return Err(MessageParseError::MissingCommand(line.to_owned()));
        }
        (Origin::from_parts(None, None, Some(String::new()))?, 0)
    };

    let command = raw_headers[command_index].clone();
    let target = raw_headers.get(command_index + 1).cloned();
    let mut kind = EventKind::classify(&command, &origin);
    let mut body = split.body.unwrap_or_default();

    if kind == EventKind::Privmsg {
        if let Some(text) = action_text(body) {
            kind = EventKind::Action;
            body = text;
        }
    }

    Ok(ParsedEvent {
        kind,
        raw_headers,
        body: body.to_owned(),
        origin,
        command,
        target,
    })
}

fn action_text(body: &str) -> Option<&str> {
    body.strip_prefix(ACTION_PREFIX)?.strip_suffix(ACTION_SUFFIX)
}
