use std::fmt::{self, Write};

use super::types::Command;

/// Write a command with middle arguments only.
fn write_cmd(f: &mut fmt::Formatter<'_>, cmd: &str, args: &[&str]) -> fmt::Result {
    f.write_str(cmd)?;
    for arg in args {
        f.write_char(' ')?;
        f.write_str(arg)?;
    }
    Ok(())
}

/// Write a command with a freeform (always colon-prefixed) trailing argument.
fn write_cmd_freeform(f: &mut fmt::Formatter<'_>, cmd: &str, args: &[&str]) -> fmt::Result {
    match args.split_last() {
        Some((suffix, middle)) => {
            write_cmd(f, cmd, middle)?;
            f.write_str(" :")?;
            f.write_str(suffix)
        }
        None => f.write_str(cmd),
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::PASS(p) => write_cmd(f, "PASS", &[p]),
            Command::NICK(n) => write_cmd(f, "NICK", &[n]),
            Command::USER(u, r) => write_cmd_freeform(f, "USER", &[u, "0", "*", r]),
            Command::QUIT(Some(m)) => write_cmd_freeform(f, "QUIT", &[m]),
            Command::QUIT(None) => f.write_str("QUIT"),
            Command::PONG(arg) if arg.is_empty() => f.write_str("PONG"),
            Command::PONG(arg) => write_cmd(f, "PONG", &[arg]),

            Command::JOIN(c) => write_cmd(f, "JOIN", &[c]),
            Command::PART(c, Some(m)) => write_cmd_freeform(f, "PART", &[c, m]),
            Command::PART(c, None) => write_cmd(f, "PART", &[c]),
            Command::TOPIC(c, t) => write_cmd_freeform(f, "TOPIC", &[c, t]),
            Command::ChannelMODE(c, modes) => {
                write_cmd(f, "MODE", &[c])?;
                for m in modes {
                    f.write_char(' ')?;
                    f.write_str(m)?;
                }
                Ok(())
            }
            Command::KICK(c, n, Some(r)) => write_cmd_freeform(f, "KICK", &[c, n, r]),
            Command::KICK(c, n, None) => write_cmd(f, "KICK", &[c, n]),

            Command::PRIVMSG(t, m) => write_cmd_freeform(f, "PRIVMSG", &[t, m]),
            Command::ACTION(t, m) => {
                write_cmd(f, "PRIVMSG", &[t])?;
                write!(f, " :\x01ACTION {}\x01", m)
            }
            Command::NOTICE(t, m) => write_cmd_freeform(f, "NOTICE", &[t, m]),

            Command::Raw(line) => f.write_str(line),
        }
    }
}

/// Cut a line at its first CR or LF so it cannot smuggle a second command.
pub fn sanitize(line: &str) -> &str {
    match line.find(['\r', '\n']) {
        Some(pos) => &line[..pos],
        None => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration() {
        assert_eq!(Command::PASS("hunter2".into()).to_string(), "PASS hunter2");
        assert_eq!(Command::NICK("bot".into()).to_string(), "NICK bot");
        assert_eq!(
            Command::USER("bot".into(), "A friendly bot".into()).to_string(),
            "USER bot 0 * :A friendly bot"
        );
    }

    #[test]
    fn test_channel_operations() {
        assert_eq!(Command::join("#test").to_string(), "JOIN #test");
        assert_eq!(Command::PART("#test".into(), None).to_string(), "PART #test");
        assert_eq!(
            Command::PART("#test".into(), Some("bye now".into())).to_string(),
            "PART #test :bye now"
        );
        assert_eq!(
            Command::TOPIC("#test".into(), "all about tests".into()).to_string(),
            "TOPIC #test :all about tests"
        );
        assert_eq!(
            Command::ban("#test", "*!*@spam.example").to_string(),
            "MODE #test +b *!*@spam.example"
        );
        assert_eq!(
            Command::unban("#test", "*!*@spam.example").to_string(),
            "MODE #test -b *!*@spam.example"
        );
        assert_eq!(
            Command::KICK("#test".into(), "troll".into(), Some("flooding".into())).to_string(),
            "KICK #test troll :flooding"
        );
    }

    #[test]
    fn test_messaging() {
        assert_eq!(
            Command::privmsg("#test", "hello there").to_string(),
            "PRIVMSG #test :hello there"
        );
        assert_eq!(
            Command::action("#test", "waves").to_string(),
            "PRIVMSG #test :\x01ACTION waves\x01"
        );
        assert_eq!(
            Command::notice("nick", "psst").to_string(),
            "NOTICE nick :psst"
        );
    }

    #[test]
    fn test_keepalive_and_quit() {
        assert_eq!(
            Command::PONG("server.example.com".into()).to_string(),
            "PONG server.example.com"
        );
        assert_eq!(Command::PONG(String::new()).to_string(), "PONG");
        assert_eq!(
            Command::QUIT(Some("Reconnecting".into())).to_string(),
            "QUIT :Reconnecting"
        );
        assert_eq!(Command::QUIT(None).to_string(), "QUIT");
    }

    #[test]
    fn test_name() {
        assert_eq!(Command::action("#c", "x").name(), "PRIVMSG");
        assert_eq!(Command::ban("#c", "m").name(), "MODE");
        assert_eq!(Command::Raw("WHO #c".into()).name(), "WHO");
    }

    #[test]
    fn test_sanitize_truncates_newline() {
        assert_eq!(sanitize("PRIVMSG #test :hello\r\nQUIT"), "PRIVMSG #test :hello");
        assert_eq!(sanitize("PRIVMSG #test :a\nb"), "PRIVMSG #test :a");
        assert_eq!(sanitize("PRIVMSG #test :clean"), "PRIVMSG #test :clean");
    }
}
