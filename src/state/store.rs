//! The channel and user state store.
//!
//! All mutation goes through [`Store`]'s methods. Each one leaves the store consistent
//! before returning, so a snapshot taken between any two calls never shows a half-applied
//! roster update.

use super::{Mode, ModeKind, ModeSet, ServerInfo};
use crate::error::HandlerError;
use std::collections::{BTreeMap, BTreeSet};

/// A channel topic.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde_derive::Serialize, serde_derive::Deserialize))]
pub struct Topic {
    /// The text of the topic.
    pub text: String,
    /// Who set the topic, if known.
    pub setter: Option<String>,
    /// When the topic was set, in seconds since the Unix epoch, if known.
    pub set_at: Option<i64>,
}

/// Whether we are actually in a channel.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde_derive::Serialize, serde_derive::Deserialize))]
pub enum Membership {
    /// We are in the channel, or it is an open conversation with a user.
    Joined,
    /// We asked to join (or were kicked and are rejoining) and the server hasn't confirmed yet.
    #[default]
    Detached,
    /// Kept only for its history. Nothing on the wire refers to it anymore.
    Historical,
}

/// What a [`Channel`] entry represents.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde_derive::Serialize, serde_derive::Deserialize))]
pub enum ChannelKind {
    /// A real channel with a roster.
    Channel,
    /// A direct-message conversation with one user.
    Query,
}

/// A user as seen in one channel's roster.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde_derive::Serialize, serde_derive::Deserialize))]
pub struct Member {
    /// The user's nickname.
    pub nick: String,
    /// The rank modes the user holds in this channel.
    pub modes: ModeSet,
}

/// One channel or conversation.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Channel {
    /// The name as first seen.
    pub name: String,
    /// Channel or direct-message conversation.
    pub kind: ChannelKind,
    /// Whether we are in the channel.
    pub membership: Membership,
    /// The topic, if any.
    pub topic: Option<Topic>,
    /// The roster, ordered by rank then nickname.
    pub users: Vec<Member>,
    /// Parameterless channel modes and parameterized ones currently set.
    pub modes: ModeSet,
    /// Parameters of set channel modes that have them.
    pub mode_args: BTreeMap<char, String>,
    names_buf: Option<Vec<Member>>,
}

impl Channel {
    fn new(name: &str, kind: ChannelKind, membership: Membership) -> Self {
        Channel {
            name: name.to_owned(),
            kind,
            membership,
            topic: None,
            users: Vec::new(),
            modes: ModeSet::new(),
            mode_args: BTreeMap::new(),
            names_buf: None,
        }
    }
    /// Returns the roster entry for `nick`, if present.
    pub fn member(&self, nick: &str) -> Option<&Member> {
        self.users.iter().find(|m| m.nick == nick)
    }
    /// Returns `true` if `nick` is in the roster.
    pub fn has_member(&self, nick: &str) -> bool {
        self.member(nick).is_some()
    }
    fn sort(&mut self, info: &ServerInfo) {
        sort_roster(&mut self.users, info);
    }
}

/// Orders a roster by highest rank first, then case-insensitively by nickname.
///
/// Always a full re-sort; incremental patching drifts when modes change.
pub fn sort_roster(users: &mut [Member], info: &ServerInfo) {
    users.sort_by(|a, b| {
        info.highest_rank(a.modes)
            .cmp(&info.highest_rank(b.modes))
            .then_with(|| a.nick.to_ascii_lowercase().cmp(&b.nick.to_ascii_lowercase()))
            .then_with(|| a.nick.cmp(&b.nick))
    });
}

/// One applied mode change.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct ModeChange {
    /// `true` for `+`, `false` for `-`.
    pub adding: bool,
    /// The mode letter.
    pub mode: Mode,
    /// The argument the mode consumed, if any.
    pub arg: Option<String>,
}

/// The result of [`Store::apply_mode`].
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct ModeOutcome {
    /// Every change, in order.
    pub changes: Vec<ModeChange>,
    /// Whether any rank change touched the roster (which was then re-sorted).
    pub roster_changed: bool,
}

fn key(name: &str) -> String {
    name.to_ascii_lowercase()
}

/// Registry of channels, their rosters, and session-wide away status.
#[derive(Clone, Debug, Default)]
pub struct Store {
    channels: BTreeMap<String, Channel>,
    away: BTreeSet<String>,
}

impl Store {
    /// Creates an empty store.
    pub const fn new() -> Self {
        Store { channels: BTreeMap::new(), away: BTreeSet::new() }
    }
    /// Returns `true` if there are no channels.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
    /// Returns the number of channels and conversations.
    pub fn len(&self) -> usize {
        self.channels.len()
    }
    /// Returns `true` if a channel or conversation named `name` exists.
    pub fn contains(&self, name: &str) -> bool {
        self.channels.contains_key(&key(name))
    }
    /// Iterates over every channel and conversation.
    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }
    /// Returns a read-only copy of a channel.
    pub fn snapshot(&self, name: &str) -> Option<Channel> {
        self.channels.get(&key(name)).cloned()
    }
    /// Returns a shared reference to a channel.
    pub fn get(&self, name: &str) -> Option<&Channel> {
        self.channels.get(&key(name))
    }
    fn get_mut(&mut self, name: &str) -> Result<&mut Channel, HandlerError> {
        self.channels.get_mut(&key(name)).ok_or_else(|| HandlerError::UnknownChannel(name.into()))
    }
    /// Marks a channel as joined, creating it if needed.
    ///
    /// A rejoin starts from an empty roster; the server will send a fresh NAMES list.
    /// Returns `true` if the channel was newly created.
    pub fn join(&mut self, name: &str) -> bool {
        let mut created = false;
        let chan = self.channels.entry(key(name)).or_insert_with(|| {
            created = true;
            Channel::new(name, ChannelKind::Channel, Membership::Joined)
        });
        chan.membership = Membership::Joined;
        chan.users.clear();
        chan.names_buf = None;
        chan.modes = ModeSet::new();
        chan.mode_args.clear();
        created
    }
    /// Creates a channel in the [`Detached`][Membership::Detached] state
    /// for a join that hasn't been confirmed yet.
    ///
    /// Returns `false` and changes nothing if the channel already exists.
    pub fn join_pending(&mut self, name: &str) -> bool {
        if self.contains(name) {
            return false;
        }
        self.channels
            .insert(key(name), Channel::new(name, ChannelKind::Channel, Membership::Detached));
        true
    }
    /// Opens a direct-message conversation, if one isn't open already.
    ///
    /// Returns `true` if a conversation was created or brought back from history.
    pub fn open_query(&mut self, nick: &str) -> bool {
        let mut changed = false;
        let chan = self.channels.entry(key(nick)).or_insert_with(|| {
            changed = true;
            Channel::new(nick, ChannelKind::Query, Membership::Joined)
        });
        changed |= chan.membership != Membership::Joined;
        chan.membership = Membership::Joined;
        changed
    }
    /// Removes a channel after leaving it.
    pub fn part(&mut self, name: &str, reason: Option<&str>) -> Option<Channel> {
        let removed = self.channels.remove(&key(name));
        if removed.is_some() {
            tracing::debug!(target: "ircsession", "left {name}: {}", reason.unwrap_or(""));
        }
        removed
    }
    /// Changes a channel's membership without touching anything else.
    pub fn set_membership(&mut self, name: &str, membership: Membership) -> Result<(), HandlerError> {
        self.get_mut(name)?.membership = membership;
        Ok(())
    }
    /// Adds `nick` to a roster or replaces its modes if already present.
    ///
    /// There is never more than one entry per nickname.
    pub fn upsert_user(
        &mut self,
        channel: &str,
        nick: &str,
        modes: ModeSet,
        info: &ServerInfo,
    ) -> Result<(), HandlerError> {
        let chan = self.get_mut(channel)?;
        match chan.users.iter_mut().find(|m| m.nick == nick) {
            Some(member) => member.modes = modes,
            None => chan.users.push(Member { nick: nick.to_owned(), modes }),
        }
        chan.sort(info);
        Ok(())
    }
    /// Removes `nick` from a roster. Returns `true` if it was present.
    pub fn remove_user(&mut self, channel: &str, nick: &str) -> Result<bool, HandlerError> {
        let chan = self.get_mut(channel)?;
        let before = chan.users.len();
        chan.users.retain(|m| m.nick != nick);
        Ok(before != chan.users.len())
    }
    /// Removes `nick` from every roster, returning the names of the channels it was in.
    pub fn quit_user(&mut self, nick: &str) -> Vec<String> {
        let mut affected = Vec::new();
        for chan in self.channels.values_mut() {
            let before = chan.users.len();
            chan.users.retain(|m| m.nick != nick);
            if before != chan.users.len() {
                affected.push(chan.name.clone());
            }
        }
        self.away.remove(nick);
        affected
    }
    /// Renames a user in every roster it appears in.
    ///
    /// Returns the names of the channels that were patched.
    pub fn rename_user(&mut self, old: &str, new: &str, info: &ServerInfo) -> Vec<String> {
        let mut affected = Vec::new();
        for chan in self.channels.values_mut() {
            let Some(idx) = chan.users.iter().position(|m| m.nick == old) else {
                continue;
            };
            let modes = chan.users[idx].modes;
            // Someone else already had the new nick? Trust the rename and drop the stale one.
            chan.users.retain(|m| m.nick != new && m.nick != old);
            chan.users.push(Member { nick: new.to_owned(), modes });
            chan.sort(info);
            affected.push(chan.name.clone());
        }
        if self.away.remove(old) {
            self.away.insert(new.to_owned());
        }
        affected
    }
    /// Renames a direct-message conversation to follow a nick change.
    ///
    /// Does nothing if there's no such conversation or the new name is taken.
    pub fn rename_query(&mut self, old: &str, new: &str) -> bool {
        let old_key = key(old);
        let new_key = key(new);
        if old_key != new_key && self.channels.contains_key(&new_key) {
            return false;
        }
        match self.channels.remove(&old_key) {
            Some(mut chan) if chan.kind == ChannelKind::Query => {
                chan.name = new.to_owned();
                self.channels.insert(new_key, chan);
                true
            }
            Some(chan) => {
                self.channels.insert(old_key, chan);
                false
            }
            None => false,
        }
    }
    /// Applies a MODE change to a channel.
    ///
    /// `modestr` is consumed left to right. Each `+` or `-` flips whether modes are being added.
    /// Letters that take a parameter (per the server's PREFIX and CHANMODES) consume
    /// the next unconsumed entry of `targets`.
    /// The whole string is checked before anything is applied,
    /// so a bad letter or missing target leaves the channel untouched.
    /// Only rank letters touch the roster, and only then is it re-sorted.
    pub fn apply_mode(
        &mut self,
        channel: &str,
        modestr: &str,
        targets: &[String],
        info: &ServerInfo,
    ) -> Result<ModeOutcome, HandlerError> {
        let chan = self.get_mut(channel)?;
        let mut changes = Vec::new();
        let mut adding = true;
        let mut targets = targets.iter();
        for c in modestr.chars() {
            match c {
                '+' => adding = true,
                '-' => adding = false,
                c => {
                    let Some(mode) = Mode::from_char(c) else {
                        return Err(HandlerError::InvalidArg("modes", modestr.to_owned()));
                    };
                    let kind = info.mode_kind(mode);
                    let arg = if kind.takes_arg(adding) { targets.next().cloned() } else { None };
                    if kind == ModeKind::Rank && arg.is_none() {
                        return Err(HandlerError::MissingArg("mode target"));
                    }
                    changes.push(ModeChange { adding, mode, arg });
                }
            }
        }
        let mut roster_changed = false;
        for change in &changes {
            let ModeChange { adding, mode, ref arg } = *change;
            match info.mode_kind(mode) {
                ModeKind::Rank => {
                    let nick = arg.as_deref().unwrap_or_default();
                    if let Some(member) = chan.users.iter_mut().find(|m| m.nick == nick) {
                        roster_changed |= member.modes.toggle(mode, adding);
                    }
                }
                ModeKind::List => (),
                ModeKind::Param | ModeKind::SetParam | ModeKind::Flag => {
                    chan.modes.toggle(mode, adding);
                    let letter = mode.into_char();
                    match (arg, adding) {
                        (Some(arg), true) => {
                            chan.mode_args.insert(letter, arg.clone());
                        }
                        (_, false) => {
                            chan.mode_args.remove(&letter);
                        }
                        _ => (),
                    }
                }
            }
        }
        if roster_changed {
            chan.sort(info);
        }
        Ok(ModeOutcome { changes, roster_changed })
    }
    /// Accumulates one `RPL_NAMREPLY` (353) worth of entries.
    ///
    /// Entries may carry any number of rank prefixes and may be in `nick!user@host` form.
    /// Nothing becomes visible until [`names_end`][Store::names_end].
    pub fn names_add<'a>(
        &mut self,
        channel: &str,
        entries: impl IntoIterator<Item = &'a str>,
        info: &ServerInfo,
    ) -> Result<(), HandlerError> {
        let chan = self.get_mut(channel)?;
        let buf = chan.names_buf.get_or_insert_with(Vec::new);
        for entry in entries {
            let (modes, rest) = info.split_prefixes(entry);
            let nick = rest.split_once('!').map(|(n, _)| n).unwrap_or(rest);
            if nick.is_empty() {
                continue;
            }
            match buf.iter_mut().find(|m| m.nick == nick) {
                Some(member) => member.modes = modes,
                None => buf.push(Member { nick: nick.to_owned(), modes }),
            }
        }
        Ok(())
    }
    /// Finishes a NAMES listing, replacing the roster with everything accumulated.
    ///
    /// Returns `false` if there was nothing accumulated for this channel.
    pub fn names_end(&mut self, channel: &str, info: &ServerInfo) -> Result<bool, HandlerError> {
        let chan = self.get_mut(channel)?;
        let Some(mut users) = chan.names_buf.take() else {
            return Ok(false);
        };
        sort_roster(&mut users, info);
        chan.users = users;
        Ok(true)
    }
    /// Sets or clears a channel's topic.
    pub fn set_topic(&mut self, channel: &str, topic: Option<Topic>) -> Result<(), HandlerError> {
        self.get_mut(channel)?.topic = topic;
        Ok(())
    }
    /// Fills in who set the topic and when, from `RPL_TOPICWHOTIME` (333).
    pub fn set_topic_meta(
        &mut self,
        channel: &str,
        setter: &str,
        set_at: Option<i64>,
    ) -> Result<(), HandlerError> {
        let chan = self.get_mut(channel)?;
        let topic = chan.topic.get_or_insert_with(|| Topic {
            text: String::new(),
            setter: None,
            set_at: None,
        });
        topic.setter = Some(setter.to_owned());
        topic.set_at = set_at;
        Ok(())
    }
    /// Updates whether a user is away.
    ///
    /// Returns the names of the channels that user is in if anything changed.
    pub fn set_away(&mut self, nick: &str, away: bool) -> Vec<String> {
        let changed =
            if away { self.away.insert(nick.to_owned()) } else { self.away.remove(nick) };
        if !changed {
            return Vec::new();
        }
        self.channels.values().filter(|c| c.has_member(nick)).map(|c| c.name.clone()).collect()
    }
    /// Returns `true` if `nick` is known to be away.
    pub fn is_away(&self, nick: &str) -> bool {
        self.away.contains(nick)
    }
}
