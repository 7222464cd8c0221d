//! Message sources, also known as prefixes.

use crate::error::ParseError;

/// The sender of a message, also known as a message's "prefix".
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde_derive::Serialize, serde_derive::Deserialize))]
pub struct Source {
    /// The name of the source, usually a nickname but also sometimes a server name.
    pub nick: String,
    /// The user@host of the sender, if the sender is NOT a server.
    pub userhost: Option<UserHost>,
}

/// The `username@hostname` fragment of a [`Source`].
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde_derive::Serialize, serde_derive::Deserialize))]
pub struct UserHost {
    /// The hostname (or vhost) of the sender.
    pub host: String,
    /// The username of the sender.
    pub user: Option<String>,
}

impl Source {
    /// Creates a new source representing a server.
    pub fn new_server(server_name: impl Into<String>) -> Self {
        Source { nick: server_name.into(), userhost: None }
    }
    /// Creates a new source representing a user.
    pub fn new_user(
        nick: impl Into<String>,
        user: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        let userhost = UserHost { user: Some(user.into()), host: host.into() };
        Source { nick: nick.into(), userhost: Some(userhost) }
    }
    /// Parses the provided source string.
    ///
    /// The provided word should NOT contain the leading ':'.
    pub fn parse(word: &str) -> Result<Self, ParseError> {
        let (nick, rest) = match word.find(['!', '@']) {
            Some(idx) => (&word[..idx], Some(&word[idx..])),
            None => (word, None),
        };
        if nick.is_empty() {
            return Err(ParseError::NoSource);
        }
        let nick = nick.to_owned();
        let userhost = match rest {
            None => None,
            Some(rest) => {
                if let Some(host) = rest.strip_prefix('@') {
                    Some(UserHost { user: None, host: host.to_owned() })
                } else {
                    let rest = &rest[1..];
                    match rest.split_once('@') {
                        Some((user, host)) => {
                            Some(UserHost { user: Some(user.to_owned()), host: host.to_owned() })
                        }
                        // nick!user with no host. Odd, but keep what we got.
                        None => Some(UserHost { user: Some(rest.to_owned()), host: String::new() }),
                    }
                }
            }
        };
        Ok(Source { nick, userhost })
    }
    /// Returns `nick!user@host`, filling in `*` for missing fragments.
    ///
    /// This is the form hostmask globs are matched against.
    pub fn hostmask(&self) -> String {
        match &self.userhost {
            Some(UserHost { user, host }) => {
                format!("{}!{}@{}", self.nick, user.as_deref().unwrap_or("*"), host)
            }
            None => format!("{}!*@*", self.nick),
        }
    }
}

impl UserHost {
    /// Returns `false` if `self.user` is `Some` and starts with a tilde.
    ///
    /// Many IRC networks use a leading `~` to indicate a lack of ident response.
    pub fn has_ident(&self) -> bool {
        !self.user.as_deref().is_some_and(|user| user.starts_with('~'))
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let nick = &self.nick;
        if let Some(address) = self.userhost.as_ref() {
            let host = &address.host;
            if let Some(user) = &address.user {
                if host.is_empty() {
                    return write!(f, "{nick}!{user}");
                }
                write!(f, "{nick}!{user}@{host}")
            } else {
                write!(f, "{nick}@{host}")
            }
        } else {
            write!(f, "{nick}")
        }
    }
}

impl std::fmt::Display for UserHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let host = &self.host;
        if let Some(user) = self.user.as_ref() {
            write!(f, "{user}@{host}")
        } else {
            write!(f, "{host}")
        }
    }
}
