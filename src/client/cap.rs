//! Utilities for working with capability negotiation.

use super::ClientMsgSink;
use crate::{
    error::HandlerError,
    ircmsg::{Args, ClientMsg, Kind},
};
use std::collections::BTreeMap;

/// Capabilities this engine knows how to use.
pub const AWAY_NOTIFY: &str = "away-notify";
/// See [`AWAY_NOTIFY`].
pub const SASL: &str = "sasl";
/// See [`AWAY_NOTIFY`].
pub const MULTI_PREFIX: &str = "multi-prefix";
/// See [`AWAY_NOTIFY`].
pub const USERHOST_IN_NAMES: &str = "userhost-in-names";

/// Returns the message that starts capability negotiation.
pub fn msg_ls() -> ClientMsg {
    ClientMsg::new(Kind::Cap).arg("LS").arg("302")
}

/// Returns the message that ends capability negotiation.
pub fn msg_end() -> ClientMsg {
    ClientMsg::new(Kind::Cap).arg("END")
}

/// Requests capabilities to be enabled.
///
/// Splits the request across several messages if it won't fit in one line.
pub fn req<'a>(caps: impl IntoIterator<Item = &'a str>, sink: &mut impl ClientMsgSink) {
    // "CAP REQ :" plus CRLF, and some slack for the server prepending our nick.
    let base_len = ClientMsg::MAX_LEN - 11 - 64;
    let mut cap_string = String::new();
    for cap in caps {
        if !cap_string.is_empty() && cap_string.len() + cap.len() + 1 > base_len {
            let full = std::mem::take(&mut cap_string);
            sink.send(ClientMsg::new(Kind::Cap).arg("REQ").long(full));
        }
        if !cap_string.is_empty() {
            cap_string.push(' ');
        }
        cap_string.push_str(cap);
    }
    if !cap_string.is_empty() {
        sink.send(ClientMsg::new(Kind::Cap).arg("REQ").long(cap_string));
    }
}

/// The CAP subcommand type.
#[allow(missing_docs)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum SubCmd {
    Ls,
    List,
    Ack,
    Nak,
    New,
    Del,
}

impl SubCmd {
    /// Case-insensitively matches `word`.
    pub fn parse(word: &str) -> Option<SubCmd> {
        match word.to_ascii_uppercase().as_str() {
            "LS" => Some(Self::Ls),
            "LIST" => Some(Self::List),
            "ACK" => Some(Self::Ack),
            "NAK" => Some(Self::Nak),
            "NEW" => Some(Self::New),
            "DEL" => Some(Self::Del),
            _ => None,
        }
    }
}

/// The arguments of a server-originated CAP message.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ServerMsgArgs {
    /// The nick of the user this message was sent to.
    pub nick: String,
    /// This message's subcommand.
    pub subcmd: SubCmd,
    /// Whether this is the last message in a multiline reply.
    pub is_last: bool,
    /// The map of capabilities to values.
    pub caps: BTreeMap<String, String>,
}

impl ServerMsgArgs {
    /// Parses the argument list of a server-originated CAP message.
    pub fn parse(args: &Args) -> Result<Self, HandlerError> {
        let (args, Some(last)) = args.split_last() else {
            return Err(HandlerError::MissingArg("caps"));
        };
        let (nick, args) = args.split_first().ok_or(HandlerError::MissingArg("nick"))?;
        let (subcmd, args) = args.split_first().ok_or(HandlerError::MissingArg("subcmd"))?;
        let subcmd = SubCmd::parse(subcmd)
            .ok_or_else(|| HandlerError::InvalidArg("subcmd", subcmd.clone()))?;
        let is_last = match args.first() {
            Some(star) if star == "*" => false,
            Some(other) => return Err(HandlerError::InvalidArg("is_last", other.clone())),
            None => true,
        };
        let mut caps = BTreeMap::new();
        for word in last.split_ascii_whitespace() {
            // ACK/NAK may carry modifiers like `-cap` for disabled ones.
            let (key, value) = word.split_once('=').unwrap_or((word, ""));
            if key.is_empty() {
                continue;
            }
            caps.insert(key.to_owned(), value.to_owned());
        }
        Ok(Self { nick: nick.clone(), subcmd, is_last, caps })
    }
    /// Combines a newer [`ServerMsgArgs`] into `self`.
    /// Returns `Some(newer)` if it cannot be combined into `self`.
    ///
    /// This can be used for processing multi-line replies as a single reply.
    #[must_use]
    pub fn combine(&mut self, newer: ServerMsgArgs) -> Option<ServerMsgArgs> {
        if self.is_last || self.subcmd != newer.subcmd || self.nick != newer.nick {
            return Some(newer);
        }
        self.is_last = newer.is_last;
        self.caps.extend(newer.caps);
        None
    }
    /// Returns `true` if `self.caps` contains a capability.
    pub fn contains(&self, cap: &str) -> bool {
        self.caps.contains_key(cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ircmsg::ServerMsg;

    #[test]
    fn ls_reply() {
        let msg = ServerMsg::parse("CAP * LS * :foo=bar").unwrap();
        let mut args1 = ServerMsgArgs::parse(&msg.args).unwrap();
        assert!(!args1.is_last);
        assert_eq!(args1.caps["foo"], "bar");
        assert!(!args1.contains("bar"));
        let msg = ServerMsg::parse("CAP * LS :bar baz").unwrap();
        let args2 = ServerMsgArgs::parse(&msg.args).unwrap();
        assert!(args2.is_last);
        assert_eq!(args2.caps["bar"], "");
        assert!(args1.combine(args2).is_none());
        assert_eq!(args1.caps.len(), 3);
        assert!(args1.is_last);
    }

    #[test]
    fn ack_and_bad_replies() {
        let msg = ServerMsg::parse(":s CAP me ack :sasl away-notify").unwrap();
        let args = ServerMsgArgs::parse(&msg.args).unwrap();
        assert_eq!(args.subcmd, SubCmd::Ack);
        assert!(args.contains(SASL));
        assert!(args.contains(AWAY_NOTIFY));
        let msg = ServerMsg::parse(":s CAP me FROB :x").unwrap();
        assert!(ServerMsgArgs::parse(&msg.args).is_err());
        let msg = ServerMsg::parse(":s CAP me").unwrap();
        assert!(ServerMsgArgs::parse(&msg.args).is_err());
    }

    #[test]
    fn req_splits_long_requests() {
        let mut sent = Vec::new();
        req([AWAY_NOTIFY, SASL], &mut sent);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to_string(), "CAP REQ :away-notify sasl");
        let many: Vec<String> = (0..100).map(|n| format!("vendor.example/cap-{n}")).collect();
        let mut sent = Vec::new();
        req(many.iter().map(String::as_str), &mut sent);
        assert!(sent.len() > 1);
        assert!(sent.iter().all(|m| m.wire_len() <= ClientMsg::MAX_LEN));
    }
}
