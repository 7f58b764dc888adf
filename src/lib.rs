//! # slirc-client
//!
//! A client-side IRC protocol engine built on tokio.
//!
//! ## Features
//!
//! - Line framing over any async byte stream, tolerant of bad UTF-8
//! - Event parsing with user/server origins and CTCP ACTION unwrapping
//! - Flood-controlled output with an urgent lane for keepalives and QUIT
//! - A connection supervisor that reconnects after failures
//! - Optional TLS via rustls
//!
//! ## Quick Start
//!
//! ### Parsing lines
//!
//! ```rust
//! use slirc_client::{parse_line, EventKind, Origin};
//!
//! let event = parse_line(":nick!user@host PRIVMSG #rust :hello there").unwrap();
//! assert_eq!(event.kind, EventKind::Privmsg);
//! assert_eq!(event.nick(), Some("nick"));
//! assert_eq!(event.target.as_deref(), Some("#rust"));
//! assert_eq!(event.body, "hello there");
//! ```
//!
//! ### Rendering commands
//!
//! ```rust
//! use slirc_client::Command;
//!
//! assert_eq!(Command::join("#test").to_string(), "JOIN #test");
//! assert_eq!(Command::privmsg("#test", "hi").to_string(), "PRIVMSG #test :hi");
//! ```
//!
//! ### Running a client
//!
//! ```no_run
//! use slirc_client::{Client, Config};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let config = Config::load("slirc-client.toml")?;
//! let client = Client::new(config)?;
//! client.set_callback(|event| println!("{}", event));
//! client.run().await?;
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod admin;
pub mod client;
pub mod command;
pub mod config;
pub mod error;
pub mod flood;
pub mod line;
pub mod logging;
pub mod message;
pub mod roster;
pub mod transport;

pub use self::admin::AdminCommand;
pub use self::client::{Client, ConnectionState};
pub use self::command::Command;
pub use self::config::{Config, ServerConfig};
pub use self::error::{
    AdminParseError, ClientError, ConfigError, MessageParseError, OriginError, RosterError,
    TransportError,
};
pub use self::flood::{DrainTask, FloodPolicy, OutputScheduler};
pub use self::line::{LineFramer, LineReader, MAX_LINE_LEN};
pub use self::message::{parse_line, EventKind, Origin, ParsedEvent};
pub use self::roster::{Channel, Rank, User};
pub use self::transport::{Connector, TcpConnector, Transport};
