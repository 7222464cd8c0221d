//! Tokenized IRC messages.

mod args;
mod codec;
mod ctcp;
mod kind;
mod source;
pub mod tags;
#[cfg(test)]
mod tests;

pub use self::{args::*, codec::*, ctcp::*, kind::*, source::*, tags::Tags};

use crate::error::ParseError;

/// A message sent by the server.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct ServerMsg {
    /// This message's tags, if any.
    pub tags: Tags,
    /// The sender of this message.
    pub source: Option<Source>,
    /// What kind of message this is, usually a command or numeric reply.
    pub kind: Kind,
    /// This message's arguments.
    pub args: Args,
}

impl ServerMsg {
    /// The maximum length of a server message in bytes, including tags and CRLF.
    pub const MAX_LEN: usize = 8191 + 512;

    /// Creates a new `ServerMsg` with no tags, source, or arguments.
    pub const fn new(kind: Kind) -> Self {
        ServerMsg { tags: Tags::new(), source: None, kind, args: Args::new() }
    }
    /// Tokenizes one line, which may or may not include the trailing CRLF.
    pub fn parse(line: &str) -> Result<ServerMsg, ParseError> {
        let (tags, source, kind, args) = parse(line)?;
        Ok(ServerMsg { tags, source, kind, args })
    }
    /// Returns the nickname of the sender, if any.
    pub fn source_nick(&self) -> Option<&str> {
        self.source.as_ref().map(|src| src.nick.as_str())
    }
}

impl std::fmt::Display for ServerMsg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.tags.is_empty() {
            // Tags' Display impl includes the leading @.
            write!(f, "{} ", self.tags)?;
        }
        if let Some(ref src) = self.source {
            write!(f, ":{src} ")?;
        }
        write!(f, "{}", self.kind)?;
        if !self.args.is_empty() {
            write!(f, " {}", self.args)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for ServerMsg {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ServerMsg::parse(s)
    }
}

/// A message sent by this client.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct ClientMsg {
    /// This message's tags, if any.
    pub tags: Tags,
    /// The command.
    pub cmd: Kind,
    /// This message's arguments.
    pub args: Args,
}

impl ClientMsg {
    /// The maximum length of a client message in bytes, excluding tags but including CRLF.
    pub const MAX_LEN: usize = 512;

    /// Creates a new `ClientMsg` with no arguments.
    pub const fn new(cmd: Kind) -> Self {
        ClientMsg { tags: Tags::new(), cmd, args: Args::new() }
    }
    /// Adds a single-word argument, builder-style.
    pub fn arg(mut self, word: impl Into<String>) -> Self {
        self.args.add(word);
        self
    }
    /// Adds a trailing (possibly multi-word) argument, builder-style.
    pub fn long(mut self, text: impl Into<String>) -> Self {
        self.args.add_long(text);
        self
    }
    /// Creates a `PRIVMSG`.
    pub fn privmsg(target: impl Into<String>, text: impl Into<String>) -> Self {
        ClientMsg::new(Kind::Privmsg).arg(target).long(text)
    }
    /// Creates a `NOTICE`.
    pub fn notice(target: impl Into<String>, text: impl Into<String>) -> Self {
        ClientMsg::new(Kind::Notice).arg(target).long(text)
    }
    /// Creates a `JOIN` for one channel.
    pub fn join(channel: impl Into<String>) -> Self {
        ClientMsg::new(Kind::Join).arg(channel)
    }
    /// Creates a `NICK`.
    pub fn nick(nick: impl Into<String>) -> Self {
        ClientMsg::new(Kind::Nick).arg(nick)
    }
    /// Returns the number of bytes this message takes up on the wire, excluding tags.
    pub fn wire_len(&self) -> usize {
        // Kind, optional space + args, CRLF.
        let kind = self.cmd.to_string().len();
        let args = if self.args.is_empty() { 0 } else { self.args.to_string().len() + 1 };
        kind + args + 2
    }
}

impl std::fmt::Display for ClientMsg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.tags.is_empty() {
            write!(f, "{} ", self.tags)?;
        }
        write!(f, "{}", self.cmd)?;
        if !self.args.is_empty() {
            write!(f, " {}", self.args)?;
        }
        Ok(())
    }
}

fn split_word(s: &str) -> (&str, &str) {
    match s.find(' ') {
        Some(idx) => (&s[..idx], &s[idx + 1..]),
        None => (s, ""),
    }
}

pub(crate) fn parse(line: &str) -> Result<(Tags, Option<Source>, Kind, Args), ParseError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if let Some(b) = line.bytes().find(|b| matches!(b, b'\0' | b'\r' | b'\n')) {
        return Err(ParseError::InvalidByte(b));
    }
    let mut rest = line.trim_start_matches(' ');
    if rest.is_empty() {
        return Err(ParseError::Empty);
    }
    let mut tags = Tags::new();
    if let Some(tagged) = rest.strip_prefix('@') {
        let (word, after) = split_word(tagged);
        if word.is_empty() {
            return Err(ParseError::NoTags);
        }
        tags = Tags::parse(word);
        rest = after.trim_start_matches(' ');
    }
    let mut source = None;
    if let Some(sourced) = rest.strip_prefix(':') {
        let (word, after) = split_word(sourced);
        if word.is_empty() {
            return Err(ParseError::NoSource);
        }
        source = Some(Source::parse(word)?);
        rest = after.trim_start_matches(' ');
    }
    let (kind, after) = split_word(rest);
    if kind.is_empty() {
        return Err(ParseError::NoKind);
    }
    let kind = Kind::parse(kind)?;
    Ok((tags, source, kind, Args::parse(after)))
}
