//! What a session tells the outside world, and the persistence it relies on.

use super::ConnectionState;
use crate::state::{ModeSet, Topic};
use std::time::Duration;

/// The flavor of a chat line.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde_derive::Serialize, serde_derive::Deserialize))]
pub enum MessageKind {
    /// An ordinary PRIVMSG.
    Privmsg,
    /// A NOTICE.
    Notice,
    /// A CTCP ACTION, the `/me` kind of message.
    Action,
}

/// One chat line appended to a channel or conversation.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde_derive::Serialize, serde_derive::Deserialize))]
pub struct Message {
    /// The channel, or the other party for direct messages.
    pub context: String,
    /// Who sent it.
    pub from: String,
    /// The text, with CTCP framing removed.
    pub text: String,
    /// What sort of message this is.
    pub kind: MessageKind,
    /// Whether we sent it.
    pub own: bool,
}

/// One user as the presentation layer should show it in a roster.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde_derive::Serialize, serde_derive::Deserialize))]
pub struct RosterEntry {
    /// The user's nickname.
    pub nick: String,
    /// Rank modes held in the channel.
    pub modes: ModeSet,
    /// The display prefix of the highest rank held, if any.
    pub prefix: Option<char>,
    /// Whether the user is away.
    pub away: bool,
}

/// Events emitted by a session.
///
/// These are the whole contract between a session and whatever presents it.
#[derive(Clone, PartialEq, Eq, Debug)]
#[non_exhaustive]
pub enum Event {
    /// The connection moved to a new lifecycle state.
    State(ConnectionState),
    /// A line was appended to a channel or conversation.
    Message(Message),
    /// As [`Event::Message`], but the line mentions our nickname.
    Mention(Message),
    /// A channel's roster changed. Carries the whole roster, in display order.
    Roster {
        /// The channel.
        channel: String,
        /// Every user, highest rank first.
        users: Vec<RosterEntry>,
    },
    /// A channel's topic changed or was learned.
    Topic {
        /// The channel.
        channel: String,
        /// The new topic, `None` if cleared.
        topic: Option<Topic>,
    },
    /// We are now in a channel.
    Joined(String),
    /// We are no longer in a channel.
    Parted {
        /// The channel.
        channel: String,
        /// Why, if known.
        reason: Option<String>,
    },
    /// Our own nickname changed.
    Nick(String),
    /// Something the user should see that isn't chat.
    Diagnostic {
        /// The channel or conversation this relates to, or `None` for the server view.
        context: Option<String>,
        /// The text to show.
        text: String,
    },
    /// Round-trip time of a keepalive.
    Lag(Duration),
}

impl Event {
    /// Convenience constructor for diagnostics.
    pub fn diag(context: Option<&str>, text: impl Into<String>) -> Self {
        Event::Diagnostic { context: context.map(str::to_owned), text: text.into() }
    }
}

/// External storage a session calls into.
///
/// Sessions never do file I/O themselves.
/// Implementations must be cheap to call, since calls happen on the read path.
pub trait Persistence: Send + Sync {
    /// Appends a displayed line to the log for `context`.
    fn append_log(&self, context: &str, line: &str) -> std::io::Result<()>;
    /// Loads the saved ignore list.
    fn load_ignores(&self) -> std::io::Result<Vec<String>>;
    /// Saves the ignore list.
    fn save_ignores(&self, masks: &[String]) -> std::io::Result<()>;
}

/// [`Persistence`] that stores nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPersistence;

impl Persistence for NoPersistence {
    fn append_log(&self, _: &str, _: &str) -> std::io::Result<()> {
        Ok(())
    }

    fn load_ignores(&self) -> std::io::Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn save_ignores(&self, _: &[String]) -> std::io::Result<()> {
        Ok(())
    }
}
