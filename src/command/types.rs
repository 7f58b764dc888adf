//! Outbound command types.
//!
//! Each variant renders to exactly one protocol line through `Display`.
//!
//! # Reference
//! - RFC 2812: Internet Relay Chat: Client Protocol

/// An outbound IRC command with its parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Command {
    // === Connection Registration ===
    /// `PASS password`
    PASS(String),
    /// `NICK nickname`
    NICK(String),
    /// `USER username 0 * :realname`
    USER(String, String),
    /// `QUIT [:message]`
    QUIT(Option<String>),
    /// `PONG argument`
    PONG(String),

    // === Channel Operations ===
    /// `JOIN channel`
    JOIN(String),
    /// `PART channel [:message]`
    PART(String, Option<String>),
    /// `TOPIC channel :topic`
    TOPIC(String, String),
    /// `MODE channel modestring [args...]`
    ChannelMODE(String, Vec<String>),
    /// `KICK channel nick [:reason]`
    KICK(String, String, Option<String>),

    // === Messaging ===
    /// `PRIVMSG target :text`
    PRIVMSG(String, String),
    /// `PRIVMSG target :\x01ACTION text\x01`
    ACTION(String, String),
    /// `NOTICE target :text`
    NOTICE(String, String),

    /// A pre-formatted line sent as is.
    Raw(String),
}

impl Command {
    /// `JOIN` a channel.
    pub fn join(channel: impl Into<String>) -> Self {
        Self::JOIN(channel.into())
    }

    /// Set a ban (`+b`) on `mask`.
    pub fn ban(channel: impl Into<String>, mask: impl Into<String>) -> Self {
        Self::ChannelMODE(channel.into(), vec!["+b".to_owned(), mask.into()])
    }

    /// Lift a ban (`-b`) on `mask`.
    pub fn unban(channel: impl Into<String>, mask: impl Into<String>) -> Self {
        Self::ChannelMODE(channel.into(), vec!["-b".to_owned(), mask.into()])
    }

    /// Send `text` to a channel or nick.
    pub fn privmsg(target: impl Into<String>, text: impl Into<String>) -> Self {
        Self::PRIVMSG(target.into(), text.into())
    }

    /// Send `text` as a `/me` action.
    pub fn action(target: impl Into<String>, text: impl Into<String>) -> Self {
        Self::ACTION(target.into(), text.into())
    }

    /// Send a notice.
    pub fn notice(target: impl Into<String>, text: impl Into<String>) -> Self {
        Self::NOTICE(target.into(), text.into())
    }

    /// The wire command name.
    pub fn name(&self) -> &str {
        match self {
            Self::PASS(..) => "PASS",
            Self::NICK(..) => "NICK",
            Self::USER(..) => "USER",
            Self::QUIT(..) => "QUIT",
            Self::PONG(..) => "PONG",
            Self::JOIN(..) => "JOIN",
            Self::PART(..) => "PART",
            Self::TOPIC(..) => "TOPIC",
            Self::ChannelMODE(..) => "MODE",
            Self::KICK(..) => "KICK",
            Self::PRIVMSG(..) | Self::ACTION(..) => "PRIVMSG",
            Self::NOTICE(..) => "NOTICE",
            Self::Raw(line) => line.split(' ').next().unwrap_or_default(),
        }
    }
}
