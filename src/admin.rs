//! Admin command grammar.
//!
//! Admin lines look like `<marker><verb> args...`, e.g. `!kick #chan troll
//! spamming`. Parsing is purely syntactic: whether the sender may run the
//! command is for the caller to decide. [`Client::execute`] maps each
//! command onto the matching client method.
//!
//! [`Client::execute`]: crate::Client::execute

use crate::error::AdminParseError;

/// A parsed admin command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdminCommand {
    /// `quit [message]`
    Quit(Option<String>),
    /// `reconnect`
    Reconnect,
    /// `join <channel>`
    Join(String),
    /// `part <channel> [message]`
    Part(String, Option<String>),
    /// `kick <channel> <nick> [reason]`
    Kick {
        channel: String,
        nick: String,
        reason: Option<String>,
    },
    /// `ban <channel> <mask>`
    Ban { channel: String, mask: String },
    /// `unban <channel> <mask>`
    Unban { channel: String, mask: String },
    /// `kickban <channel> <nick> [reason]`
    KickBan {
        channel: String,
        nick: String,
        reason: Option<String>,
    },
    /// `say <target> <text>`
    Say { target: String, text: String },
    /// `do <target> <text>`, sent as an ACTION.
    Do { target: String, text: String },
}

impl AdminCommand {
    /// Parse `text` if it starts with `marker`.
    ///
    /// Returns `Ok(None)` for lines that are not admin commands at all.
    pub fn parse(marker: &str, text: &str) -> Result<Option<Self>, AdminParseError> {
        let Some(line) = text.strip_prefix(marker) else {
            return Ok(None);
        };
        let mut args = Args::new(line);
        let Some(verb) = args.word() else {
            return Ok(None);
        };

        let cmd = match verb {
            "quit" => Self::Quit(args.rest()),
            "reconnect" => Self::Reconnect,
            "join" => Self::Join(args.required("join", "<channel>")?),
            "part" => Self::Part(args.required("part", "<channel> [message]")?, args.rest()),
            "kick" => Self::Kick {
                channel: args.required("kick", "<channel> <nick> [reason]")?,
                nick: args.required("kick", "<channel> <nick> [reason]")?,
                reason: args.rest(),
            },
            "ban" => Self::Ban {
                channel: args.required("ban", "<channel> <mask>")?,
                mask: args.required("ban", "<channel> <mask>")?,
            },
            "unban" => Self::Unban {
                channel: args.required("unban", "<channel> <mask>")?,
                mask: args.required("unban", "<channel> <mask>")?,
            },
            "kickban" => Self::KickBan {
                channel: args.required("kickban", "<channel> <nick> [reason]")?,
                nick: args.required("kickban", "<channel> <nick> [reason]")?,
                reason: args.rest(),
            },
            "say" => Self::Say {
                target: args.required("say", "<target> <text>")?,
                text: args.rest().ok_or(AdminParseError::MissingArgument {
                    verb: "say",
                    expected: "<target> <text>",
                })?,
            },
            "do" => Self::Do {
                target: args.required("do", "<target> <text>")?,
                text: args.rest().ok_or(AdminParseError::MissingArgument {
                    verb: "do",
                    expected: "<target> <text>",
                })?,
            },
            other => return Err(AdminParseError::UnknownVerb(other.to_owned())),
        };
        Ok(Some(cmd))
    }
}

struct Args<'a> {
    remaining: &'a str,
}

impl<'a> Args<'a> {
    fn new(line: &'a str) -> Self {
        Self {
            remaining: line.trim(),
        }
    }

    fn word(&mut self) -> Option<&'a str> {
        if self.remaining.is_empty() {
            return None;
        }
        let (word, rest) = self
            .remaining
            .split_once(' ')
            .unwrap_or((self.remaining, ""));
        self.remaining = rest.trim_start();
        Some(word)
    }

    fn required(
        &mut self,
        verb: &'static str,
        expected: &'static str,
    ) -> Result<String, AdminParseError> {
        self.word()
            .map(str::to_owned)
            .ok_or(AdminParseError::MissingArgument { verb, expected })
    }

    fn rest(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.remaining);
        (!rest.is_empty()).then(|| rest.to_owned())
    }
}
