//! Error types for the IRC client engine.
//!
//! Each concern gets its own error enum: transport failures, message
//! parsing, event construction, configuration, roster records and the
//! admin command grammar. [`ClientError`] wraps the ones that can escape
//! the connection supervisor.

use std::sync::Arc;

use thiserror::Error;

/// Convenience type alias for Results using [`ClientError`].
pub type Result<T, E = ClientError> = std::result::Result<T, E>;

/// Read or write failure at the socket/TLS layer.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// I/O error while connecting or reading.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The server closed the connection.
    #[error("connection closed by peer")]
    Closed,

    /// The server sent more than `limit` bytes without a line ending.
    #[error("line too long: {actual} bytes (limit {limit})")]
    LineTooLong {
        /// Bytes buffered without a delimiter.
        actual: usize,
        /// Configured maximum.
        limit: usize,
    },

    /// The hostname could not be used as a TLS server name.
    #[error("invalid server name: {0}")]
    InvalidServerName(String),

    /// A write on the output path failed.
    #[error("write failed: {0}")]
    Write(#[source] Arc<std::io::Error>),
}

/// Errors encountered when parsing a protocol line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum MessageParseError {
    /// Line was empty.
    #[error("empty message")]
    EmptyMessage,

    /// The line carried a sender token but no command token.
    #[error("missing command in line: {0:?}")]
    MissingCommand(String),

    /// The origin could not be constructed.
    #[error("invalid origin: {0}")]
    InvalidOrigin(#[from] OriginError),
}

/// Contract violations when building an event origin.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum OriginError {
    /// Neither a user nor a server origin was supplied.
    #[error("origin has neither a user nor a server shape")]
    Missing,

    /// Both a user and a server origin were supplied.
    #[error("origin has both a user and a server shape")]
    Ambiguous,

    /// Only one of nick and userhost was supplied.
    #[error("user origin requires both nick and userhost")]
    IncompleteUser,
}

/// Configuration errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// Flood policy values must both be positive.
    #[error("invalid flood policy: {max_messages} messages per {per_seconds}s")]
    InvalidFloodPolicy {
        /// Requested message cap.
        max_messages: u32,
        /// Requested window length in seconds.
        per_seconds: u32,
    },

    /// The configuration file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid TOML for [`Config`](crate::Config).
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Errors when manipulating channel and user records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum RosterError {
    /// The mode is not set on the channel.
    #[error("mode {0:?} is not set")]
    UnknownMode(char),

    /// No user with that userhost is in the channel.
    #[error("no such user: {0}")]
    UnknownUser(String),
}

/// Errors when parsing an admin command line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum AdminParseError {
    /// The verb is not one the engine exposes.
    #[error("unknown admin verb: {0}")]
    UnknownVerb(String),

    /// The verb needs more arguments.
    #[error("{verb} expects {expected}")]
    MissingArgument {
        /// The verb being parsed.
        verb: &'static str,
        /// Human-readable argument synopsis.
        expected: &'static str,
    },
}

/// Top-level client errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// Transport-level failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The client was stopped and cannot connect again.
    #[error("client has been stopped")]
    Stopped,
}
