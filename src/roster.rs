//! Plain channel and user records.
//!
//! These hold what the bot knows about a channel; they make no permission
//! decisions of their own.

use std::collections::HashMap;
use std::fmt;

use crate::error::RosterError;

/// A user's channel privilege. Ranks are mutually exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Rank {
    /// `+v`
    Voice,
    /// `+h`
    HalfOp,
    /// `+o`
    Op,
    /// `+q`
    Owner,
}

impl Rank {
    /// Map a channel mode letter to a rank.
    pub fn from_mode(mode: char) -> Option<Self> {
        match mode {
            'v' => Some(Self::Voice),
            'h' => Some(Self::HalfOp),
            'o' => Some(Self::Op),
            'q' => Some(Self::Owner),
            _ => None,
        }
    }

    /// The channel mode letter that grants this rank.
    pub fn mode_char(self) -> char {
        match self {
            Self::Voice => 'v',
            Self::HalfOp => 'h',
            Self::Op => 'o',
            Self::Owner => 'q',
        }
    }
}

/// A user seen in a channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub nick: String,
    pub userhost: String,
    pub admin: bool,
    pub rank: Option<Rank>,
}

impl User {
    /// A user with no rank and no admin flag.
    pub fn new(nick: impl Into<String>, userhost: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            userhost: userhost.into(),
            admin: false,
            rank: None,
        }
    }

    /// Mark the user as a bot administrator.
    pub fn with_admin(mut self, admin: bool) -> Self {
        self.admin = admin;
        self
    }

    /// Replace the user's rank; `None` clears it.
    pub fn set_rank(&mut self, rank: Option<Rank>) {
        self.rank = rank;
    }

    /// Channel operator (`+o`).
    pub fn is_op(&self) -> bool {
        self.rank == Some(Rank::Op)
    }

    /// Half-operator (`+h`).
    pub fn is_halfop(&self) -> bool {
        self.rank == Some(Rank::HalfOp)
    }

    /// Channel owner (`+q`).
    pub fn is_owner(&self) -> bool {
        self.rank == Some(Rank::Owner)
    }

    /// Voiced (`+v`). Only true for the voice rank itself.
    pub fn is_voiced(&self) -> bool {
        self.rank == Some(Rank::Voice)
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.userhost)
    }
}

/// A channel with its members (keyed by userhost) and modes.
#[derive(Clone, Debug, Default)]
pub struct Channel {
    pub name: String,
    users: HashMap<String, User>,
    modes: HashMap<char, Option<String>>,
}

impl Channel {
    /// An empty channel with no modes set.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Userhosts of everyone in the channel, unordered.
    pub fn users(&self) -> impl Iterator<Item = &str> {
        self.users.keys().map(String::as_str)
    }

    pub fn has_user(&self, userhost: &str) -> bool {
        self.users.contains_key(userhost)
    }

    /// Add a user, replacing any record with the same userhost.
    pub fn add_user(&mut self, user: User) {
        self.users.insert(user.userhost.clone(), user);
    }

    /// Remove and return a user. Fails if no such user is present.
    pub fn remove_user(&mut self, userhost: &str) -> Result<User, RosterError> {
        self.users
            .remove(userhost)
            .ok_or_else(|| RosterError::UnknownUser(userhost.to_owned()))
    }

    /// Look a user up by userhost.
    pub fn get_user(&self, userhost: &str) -> Option<&User> {
        self.users.get(userhost)
    }

    pub fn get_user_mut(&mut self, userhost: &str) -> Option<&mut User> {
        self.users.get_mut(userhost)
    }

    /// Set a mode, with an optional argument (a limit, a key).
    pub fn set_mode(&mut self, mode: char, value: Option<String>) {
        self.modes.insert(mode, value);
    }

    /// Clear a mode. Clearing a mode that is not set is an error.
    pub fn clear_mode(&mut self, mode: char) -> Result<(), RosterError> {
        self.modes
            .remove(&mode)
            .map(|_| ())
            .ok_or(RosterError::UnknownMode(mode))
    }

    /// Whether `mode` is set, with or without an argument.
    pub fn has_mode(&self, mode: char) -> bool {
        self.modes.contains_key(&mode)
    }

    /// The argument stored with a mode, if the mode is set and has one.
    pub fn mode_value(&self, mode: char) -> Option<&str> {
        self.modes.get(&mode).and_then(|v| v.as_deref())
    }

    /// `+m`
    pub fn is_moderated(&self) -> bool {
        self.has_mode('m')
    }

    /// `+s`
    pub fn is_secret(&self) -> bool {
        self.has_mode('s')
    }

    /// `+p`
    pub fn is_private(&self) -> bool {
        self.has_mode('p')
    }

    /// `+t`: only operators may change the topic.
    pub fn has_topic_lock(&self) -> bool {
        self.has_mode('t')
    }

    /// `+i`
    pub fn is_invite_only(&self) -> bool {
        self.has_mode('i')
    }

    /// `+n`: members only may send to the channel.
    pub fn has_no_external_messages(&self) -> bool {
        self.has_mode('n')
    }

    /// `+l`
    pub fn has_limit(&self) -> bool {
        self.has_mode('l')
    }

    /// The `+l` member limit, if set and numeric.
    pub fn limit(&self) -> Option<u32> {
        self.mode_value('l').and_then(|v| v.parse().ok())
    }

    /// `+k`
    pub fn has_key(&self) -> bool {
        self.has_mode('k')
    }

    /// The `+k` channel key, if set.
    pub fn key(&self) -> Option<&str> {
        self.mode_value('k')
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_is_exclusive() {
        let mut user = User::new("alice", "alice@host.example");
        user.set_rank(Some(Rank::Op));
        assert!(user.is_op());

        user.set_rank(Some(Rank::Voice));
        assert!(user.is_voiced());
        assert!(!user.is_op());

        user.set_rank(None);
        assert!(!user.is_voiced());
    }

    #[test]
    fn test_rank_mode_chars() {
        for rank in [Rank::Voice, Rank::HalfOp, Rank::Op, Rank::Owner] {
            assert_eq!(Rank::from_mode(rank.mode_char()), Some(rank));
        }
        assert_eq!(Rank::from_mode('b'), None);
    }

    #[test]
    fn test_channel_users() {
        let mut chan = Channel::new("#test");
        chan.add_user(User::new("alice", "alice@a.example").with_admin(true));
        chan.add_user(User::new("bob", "bob@b.example"));

        assert!(chan.has_user("alice@a.example"));
        assert!(chan.get_user("alice@a.example").unwrap().admin);
        assert_eq!(chan.users().count(), 2);

        let bob = chan.remove_user("bob@b.example").unwrap();
        assert_eq!(bob.nick, "bob");
        assert!(!chan.has_user("bob@b.example"));
        assert_eq!(
            chan.remove_user("bob@b.example"),
            Err(RosterError::UnknownUser("bob@b.example".into()))
        );
    }

    #[test]
    fn test_channel_modes() {
        let mut chan = Channel::new("#test");
        chan.set_mode('m', None);
        chan.set_mode('l', Some("25".into()));
        chan.set_mode('k', Some("sekrit".into()));

        assert!(chan.is_moderated());
        assert!(!chan.is_secret());
        assert!(chan.has_limit());
        assert_eq!(chan.limit(), Some(25));
        assert_eq!(chan.key(), Some("sekrit"));

        chan.clear_mode('m').unwrap();
        assert!(!chan.is_moderated());
        assert_eq!(chan.clear_mode('m'), Err(RosterError::UnknownMode('m')));
        assert_eq!(chan.to_string(), "#test");
    }
}
