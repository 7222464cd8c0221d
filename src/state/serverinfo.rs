//! Structured server information, AKA the capability table.
//!
//! This holds the facts a server advertises in `RPL_ISUPPORT` (005).
//! Servers may split ISUPPORT across many lines, and some keys must stay stable for the
//! life of a session, so the first value learned for a key wins and later ones are ignored.

use super::{Mode, ModeSet};
use crate::ircmsg::Args;
use std::collections::BTreeMap;
use std::num::NonZeroU16;
use std::sync::OnceLock;

#[cfg(test)]
mod tests;

/// Values that can be parsed out of an ISUPPORT token.
pub trait ISupportValue: Sized {
    /// Parses the value part of a token.
    ///
    /// `value` is empty for tokens sent without `=`.
    fn parse_value(value: &str) -> Option<Self>;
}

impl ISupportValue for NonZeroU16 {
    fn parse_value(value: &str) -> Option<Self> {
        value.parse().ok()
    }
}

impl ISupportValue for String {
    fn parse_value(value: &str) -> Option<Self> {
        Some(value.to_owned())
    }
}

/// The ordered map of rank modes to display prefixes from the `PREFIX` token.
///
/// Order matters: the first entry is the highest rank.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct PrefixMap(pub Vec<(Mode, char)>);

impl ISupportValue for PrefixMap {
    fn parse_value(value: &str) -> Option<Self> {
        if value.is_empty() {
            return Some(PrefixMap::default());
        }
        let (modes, prefixes) = value.strip_prefix('(')?.split_once(')')?;
        if modes.chars().count() != prefixes.chars().count() {
            return None;
        }
        let mut pairs = Vec::with_capacity(modes.len());
        for (mode, prefix) in modes.chars().zip(prefixes.chars()) {
            pairs.push((Mode::from_char(mode)?, prefix));
        }
        Some(PrefixMap(pairs))
    }
}

/// The channel mode categories from the `CHANMODES` token.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct ChanModes {
    /// Type A: list modes. Always take a parameter.
    pub list: ModeSet,
    /// Type B: always take a parameter.
    pub param: ModeSet,
    /// Type C: take a parameter only when being set.
    pub set_param: ModeSet,
    /// Type D: never take a parameter.
    pub flag: ModeSet,
}

impl ISupportValue for ChanModes {
    fn parse_value(value: &str) -> Option<Self> {
        let mut groups = value.split(',');
        let mut next = || -> ModeSet {
            groups.next().unwrap_or_default().chars().filter_map(Mode::from_char).collect()
        };
        // Categories past the fourth are ignored; their modes fall back to `flag`.
        Some(ChanModes { list: next(), param: next(), set_param: next(), flag: next() })
    }
}

/// How a channel mode letter consumes MODE arguments.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ModeKind {
    /// A rank mode from `PREFIX`. Always takes a nickname.
    Rank,
    /// A list mode (bans and friends). Always takes a parameter.
    List,
    /// Always takes a parameter.
    Param,
    /// Takes a parameter only when being set.
    SetParam,
    /// Never takes a parameter.
    Flag,
}

impl ModeKind {
    /// Returns `true` if a mode of this kind consumes an argument when set (or unset).
    pub const fn takes_arg(self, adding: bool) -> bool {
        match self {
            ModeKind::Rank | ModeKind::List | ModeKind::Param => true,
            ModeKind::SetParam => adding,
            ModeKind::Flag => false,
        }
    }
}

/// The result of feeding one ISUPPORT token to a [`ServerInfo`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Update {
    /// The value was stored.
    Learned,
    /// A value for this key was already known. The new one was ignored.
    Kept,
    /// The value could not be parsed.
    Invalid,
    /// The token was a `-KEY` negation, which is ignored.
    Negated,
}

static DEFAULT_PREFIX: OnceLock<PrefixMap> = OnceLock::new();
static DEFAULT_CHANMODES: OnceLock<ChanModes> = OnceLock::new();

fn default_prefix() -> &'static PrefixMap {
    DEFAULT_PREFIX.get_or_init(|| PrefixMap::parse_value("(ov)@+").unwrap_or_default())
}

fn default_chanmodes() -> &'static ChanModes {
    DEFAULT_CHANMODES.get_or_init(|| ChanModes::parse_value("beI,k,l,imnpst").unwrap_or_default())
}

macro_rules! make_serverinfo {
    ($($field:ident: $assoctype:ty = $key:literal;)+) => {
        #[doc="A collection of information about a server."]
        #[derive(Clone, Debug, Default)]
        pub struct ServerInfo {
            version: Option<String>,
            other: BTreeMap<String, String>,
            $($field: Option<$assoctype>),+
        }

        impl ServerInfo {
            #[doc = "Creates a new empty `ServerInfo`."]
            pub const fn new() -> ServerInfo {
                ServerInfo {
                    version: None,
                    other: BTreeMap::new(),
                    $($field: None),+
                }
            }
            #[doc = "Feeds one ISUPPORT key and value into `self`."]
            #[doc = ""]
            #[doc = "The first value learned for a key wins."]
            pub fn update(&mut self, key: &str, value: &str) -> Update {
                if key.starts_with('-') {
                    return Update::Negated;
                }
                match key {
                    $($key => {
                        if self.$field.is_some() {
                            return Update::Kept;
                        }
                        match <$assoctype as ISupportValue>::parse_value(value) {
                            Some(v) => {
                                self.$field = Some(v);
                                Update::Learned
                            }
                            None => Update::Invalid,
                        }
                    })+
                    _ => {
                        if self.other.contains_key(key) {
                            return Update::Kept;
                        }
                        self.other.insert(key.to_owned(), value.to_owned());
                        Update::Learned
                    }
                }
            }
        }
    };
}

make_serverinfo! {
    awaylen: NonZeroU16 = "AWAYLEN";
    casemapping: String = "CASEMAPPING";
    chanmodes: ChanModes = "CHANMODES";
    channellen: NonZeroU16 = "CHANNELLEN";
    chantypes: String = "CHANTYPES";
    kicklen: NonZeroU16 = "KICKLEN";
    modes: NonZeroU16 = "MODES";
    network: String = "NETWORK";
    nicklen: NonZeroU16 = "NICKLEN";
    prefix: PrefixMap = "PREFIX";
    topiclen: NonZeroU16 = "TOPICLEN";
}

impl ServerInfo {
    /// Feeds every token of an `RPL_ISUPPORT` message into `self`.
    ///
    /// Returns the tokens that were rejected as unparseable.
    pub fn update_from_args(&mut self, args: &Args) -> Vec<String> {
        let mut invalid = Vec::new();
        let all = args.all();
        // First argument is our nick. The last is human-readable text if sent as trailing.
        let end = if args.is_last_long() { all.len().saturating_sub(1) } else { all.len() };
        for token in all.iter().take(end).skip(1) {
            let (key, value) = token.split_once('=').unwrap_or((token.as_str(), ""));
            if key.is_empty() {
                continue;
            }
            let update = self.update(key, value);
            tracing::trace!(target: "ircsession", "ISUPPORT {key}={value}: {update:?}");
            if update == Update::Invalid {
                invalid.push(token.clone());
            }
        }
        invalid
    }
    /// Returns the server version string, if known.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }
    /// Updates from a `RPL_MYINFO` (004) message.
    pub fn parse_myinfo(&mut self, args: &Args) {
        // client, servername, version
        if let Some(version) = args.get(2) {
            self.version.get_or_insert_with(|| version.to_owned());
        }
    }
    /// Returns the raw value of a token this type has no dedicated field for.
    pub fn get_other(&self, key: &str) -> Option<&str> {
        self.other.get(key).map(String::as_str)
    }
    /// Returns the rank mode to prefix map, or the RFC default of `(ov)@+`.
    pub fn prefix_map(&self) -> &[(Mode, char)] {
        match &self.prefix {
            Some(prefix) => &prefix.0,
            None => &default_prefix().0,
        }
    }
    /// Returns the channel mode categories, or the RFC defaults.
    pub fn chanmodes(&self) -> &ChanModes {
        match &self.chanmodes {
            Some(chanmodes) => chanmodes,
            None => default_chanmodes(),
        }
    }
    /// Returns the set of characters that begin channel names.
    pub fn chantypes(&self) -> &str {
        self.chantypes.as_deref().unwrap_or("#&")
    }
    /// Returns the network name, if advertised.
    pub fn network(&self) -> Option<&str> {
        self.network.as_deref()
    }
    /// Returns the advertised casemapping, if any.
    pub fn casemapping(&self) -> Option<&str> {
        self.casemapping.as_deref()
    }
    /// Returns the maximum nickname length, if advertised.
    pub fn nicklen(&self) -> Option<u16> {
        self.nicklen.map(NonZeroU16::get)
    }
    /// Returns the maximum channel name length, if advertised.
    pub fn channellen(&self) -> Option<u16> {
        self.channellen.map(NonZeroU16::get)
    }
    /// Returns the maximum topic length, if advertised.
    pub fn topiclen(&self) -> Option<u16> {
        self.topiclen.map(NonZeroU16::get)
    }
    /// Returns the maximum away message length, if advertised.
    pub fn awaylen(&self) -> Option<u16> {
        self.awaylen.map(NonZeroU16::get)
    }
    /// Returns the maximum kick reason length, if advertised.
    pub fn kicklen(&self) -> Option<u16> {
        self.kicklen.map(NonZeroU16::get)
    }
    /// Returns the maximum number of parameterized modes per MODE, if advertised.
    pub fn modes_per_line(&self) -> Option<u16> {
        self.modes.map(NonZeroU16::get)
    }
    /// Returns `true` if `target` names a channel rather than a nickname.
    pub fn is_channel(&self, target: &str) -> bool {
        target.chars().next().is_some_and(|c| self.chantypes().contains(c))
    }
    /// Returns the priority of a rank mode. Lower is more important.
    pub fn rank_of(&self, mode: Mode) -> Option<usize> {
        self.prefix_map().iter().position(|(m, _)| *m == mode)
    }
    /// Returns the rank mode for a display prefix, e.g. `o` for `@`.
    pub fn mode_for_prefix(&self, prefix: char) -> Option<Mode> {
        self.prefix_map().iter().find(|(_, p)| *p == prefix).map(|(m, _)| *m)
    }
    /// Returns the display prefix for a rank mode, e.g. `@` for `o`.
    pub fn prefix_for_mode(&self, mode: Mode) -> Option<char> {
        self.prefix_map().iter().find(|(m, _)| *m == mode).map(|(_, p)| *p)
    }
    /// Returns the highest-ranked display prefix in `modes`, if any.
    pub fn highest_prefix(&self, modes: ModeSet) -> Option<char> {
        self.prefix_map().iter().find(|(m, _)| modes.contains(*m)).map(|(_, p)| *p)
    }
    /// Returns the priority of the highest rank in `modes`, or `usize::MAX` for none.
    pub fn highest_rank(&self, modes: ModeSet) -> usize {
        self.prefix_map().iter().position(|(m, _)| modes.contains(*m)).unwrap_or(usize::MAX)
    }
    /// Strips every leading rank prefix this server uses off of `entry`.
    ///
    /// Returns the rank modes those prefixes stood for and the rest of the string.
    /// Handles both one prefix and `multi-prefix` style stacks like `@+nick`.
    pub fn split_prefixes<'a>(&self, entry: &'a str) -> (ModeSet, &'a str) {
        let mut modes = ModeSet::new();
        let mut rest = entry;
        while let Some(c) = rest.chars().next() {
            let Some(mode) = self.mode_for_prefix(c) else {
                break;
            };
            modes.set(mode);
            rest = &rest[c.len_utf8()..];
        }
        (modes, rest)
    }
    /// Classifies a channel mode letter.
    ///
    /// Letters the server never mentioned are assumed to take no parameter.
    pub fn mode_kind(&self, mode: Mode) -> ModeKind {
        if self.rank_of(mode).is_some() {
            return ModeKind::Rank;
        }
        let cm = self.chanmodes();
        if cm.list.contains(mode) {
            ModeKind::List
        } else if cm.param.contains(mode) {
            ModeKind::Param
        } else if cm.set_param.contains(mode) {
            ModeKind::SetParam
        } else {
            ModeKind::Flag
        }
    }
}
