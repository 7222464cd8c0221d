//! The message dispatcher.
//!
//! Routes each server message by kind to a handler that mutates the state store
//! and queues events and replies.
//! A handler failing only ever costs the one message it was handling.

use super::{
    ctcp,
    event::{Event, Message, MessageKind, Persistence, RosterEntry},
    ignore::IgnoreList,
    ClientMsgSink,
};
use crate::{
    config::Config,
    error::HandlerError,
    ircmsg::{ClientMsg, Kind, MaybeCtcp, ServerMsg},
    state::{ChannelKind, Membership, ModeSet, ServerInfo, Store, Topic},
};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Numerics that refuse a JOIN.
const JOIN_REFUSALS: [u16; 8] = [403, 405, 471, 473, 474, 475, 476, 479];

/// Returns `true` if `c` is a word character for mention matching.
fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Returns `true` if `text` mentions `nick` as a whole word, ignoring case.
pub fn is_mention(text: &str, nick: &str) -> bool {
    if nick.is_empty() {
        return false;
    }
    let lower = text.to_ascii_lowercase();
    let nick = nick.to_ascii_lowercase();
    let mut from = 0;
    while let Some(idx) = lower[from..].find(&nick) {
        let start = from + idx;
        let end = start + nick.len();
        let before_ok = !lower[..start].chars().next_back().is_some_and(is_word_char);
        let after_ok = !lower[end..].chars().next().is_some_and(is_word_char);
        if before_ok && after_ok {
            return true;
        }
        from = start + lower[start..].chars().next().map_or(1, char::len_utf8);
    }
    false
}

/// Per-session state touched by message handlers, and the handlers themselves.
pub struct Dispatcher {
    pub(super) config: Arc<Config>,
    pub(super) nick: String,
    pub(super) info: ServerInfo,
    pub(super) store: Store,
    pub(super) ignores: IgnoreList,
    /// Lowercased names of channels we sent JOIN for that haven't been confirmed.
    pub(super) pending_joins: BTreeSet<String>,
    pub(super) account: Option<String>,
    events: Vec<Event>,
    persistence: Arc<dyn Persistence>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("nick", &self.nick)
            .field("store", &self.store)
            .field("pending_joins", &self.pending_joins)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Creates a dispatcher with empty state.
    pub fn new(config: Arc<Config>, persistence: Arc<dyn Persistence>) -> Self {
        let ignores = match persistence.load_ignores() {
            Ok(masks) => masks.into_iter().collect(),
            Err(e) => {
                tracing::warn!(target: "ircsession", "could not load ignore list: {e}");
                IgnoreList::new()
            }
        };
        Dispatcher {
            nick: config.nick.clone(),
            config,
            info: ServerInfo::new(),
            store: Store::new(),
            ignores,
            pending_joins: BTreeSet::new(),
            account: None,
            events: Vec::new(),
            persistence,
        }
    }
    /// Queues an event.
    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }
    /// Takes every queued event.
    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }
    /// Returns `true` if `nick` is us.
    pub fn is_me(&self, nick: &str) -> bool {
        nick.eq_ignore_ascii_case(&self.nick)
    }
    /// Returns the roster of `channel` in display form.
    pub fn roster(&self, channel: &str) -> Vec<RosterEntry> {
        let Some(chan) = self.store.get(channel) else {
            return Vec::new();
        };
        chan.users
            .iter()
            .map(|m| RosterEntry {
                nick: m.nick.clone(),
                modes: m.modes,
                prefix: self.info.highest_prefix(m.modes),
                away: self.store.is_away(&m.nick),
            })
            .collect()
    }
    fn emit_roster(&mut self, channel: &str) {
        let Some(name) = self.store.get(channel).map(|c| c.name.clone()) else {
            return;
        };
        let users = self.roster(&name);
        self.emit(Event::Roster { channel: name, users });
    }
    fn emit_topic(&mut self, channel: &str) {
        if let Some(chan) = self.store.get(channel) {
            let event = Event::Topic { channel: chan.name.clone(), topic: chan.topic.clone() };
            self.emit(event);
        }
    }
    /// Emits a chat line and appends it to the log.
    pub fn emit_message(&mut self, msg: Message, mention: bool) {
        let line = match msg.kind {
            MessageKind::Privmsg => format!("<{}> {}", msg.from, msg.text),
            MessageKind::Notice => format!("-{}- {}", msg.from, msg.text),
            MessageKind::Action => format!("* {} {}", msg.from, msg.text),
        };
        if let Err(e) = self.persistence.append_log(&msg.context, &line) {
            tracing::warn!(target: "ircsession", "could not log to {}: {e}", msg.context);
        }
        self.emit(if mention { Event::Mention(msg) } else { Event::Message(msg) });
    }
    /// Saves the ignore list through the persistence sink.
    pub fn save_ignores(&self) {
        if let Err(e) = self.persistence.save_ignores(self.ignores.masks()) {
            tracing::warn!(target: "ircsession", "could not save ignore list: {e}");
        }
    }
    /// Sends a JOIN and records it as pending until the server echoes it.
    pub fn join(&mut self, channel: &str, sink: &mut impl ClientMsgSink) {
        self.store.join_pending(channel);
        self.pending_joins.insert(channel.to_ascii_lowercase());
        sink.send(ClientMsg::join(channel));
    }

    /// Handles one message. Errors are for logging only.
    pub fn dispatch(
        &mut self,
        msg: &ServerMsg,
        sink: &mut impl ClientMsgSink,
    ) -> Result<(), HandlerError> {
        match &msg.kind {
            Kind::Privmsg | Kind::Notice => self.on_message(msg, sink),
            Kind::Join => self.on_join(msg),
            Kind::Part => self.on_part(msg),
            Kind::Kick => self.on_kick(msg, sink),
            Kind::Quit => self.on_quit(msg),
            Kind::Nick => self.on_nick(msg),
            Kind::Mode => self.on_mode(msg),
            Kind::Topic => self.on_topic(msg),
            Kind::Away => self.on_away(msg),
            Kind::Invite => {
                let from = msg.source_nick().ok_or(HandlerError::MissingSource)?;
                let channel = msg.args.get(1).ok_or(HandlerError::MissingArg("channel"))?;
                self.emit(Event::diag(None, format!("{from} invited you to {channel}")));
                Ok(())
            }
            Kind::Cap => {
                let caps = super::cap::ServerMsgArgs::parse(&msg.args)?;
                let names: Vec<&str> = caps.caps.keys().map(String::as_str).collect();
                tracing::debug!(target: "ircsession", "CAP {:?}: {}", caps.subcmd, names.join(" "));
                Ok(())
            }
            Kind::Numeric(num) => self.on_numeric(num.code(), msg),
            other => {
                tracing::trace!(target: "ircsession", "unhandled {other}");
                Ok(())
            }
        }
    }

    fn on_message(
        &mut self,
        msg: &ServerMsg,
        sink: &mut impl ClientMsgSink,
    ) -> Result<(), HandlerError> {
        let notice = msg.kind == Kind::Notice;
        let target = msg.args.get(0).ok_or(HandlerError::MissingArg("target"))?;
        let text = msg.args.get(1).ok_or(HandlerError::MissingArg("text"))?;
        let Some(source) = &msg.source else {
            // Sourceless notices happen before registration.
            self.emit(Event::diag(None, text));
            return Ok(());
        };
        if source.userhost.is_none() && source.nick.contains('.') {
            // From a server, not a user.
            self.emit(Event::diag(None, text));
            return Ok(());
        }
        if self.ignores.matches(&source.hostmask()) {
            tracing::trace!(target: "ircsession", "ignoring message from {}", source.hostmask());
            return Ok(());
        }
        let from = source.nick.as_str();
        // STATUSMSG targets like @#chan go to the channel.
        let (_, bare) = self.info.split_prefixes(target);
        let is_channel = self.info.is_channel(bare);
        let context = if is_channel { bare } else { from };
        let ctcp = MaybeCtcp::parse(text);
        if ctcp.is_ctcp() && ctcp.cmd != "ACTION" {
            if notice {
                let text = format!("CTCP {} reply from {from}: {}", ctcp.cmd, ctcp.body);
                self.emit(Event::diag(None, text));
            } else {
                self.emit(Event::diag(None, format!("CTCP {} from {from}", ctcp.cmd)));
                if let Some(reply) = ctcp::reply(&ctcp, &self.config, chrono::Local::now()) {
                    sink.send(ClientMsg::notice(from, reply.into_line()));
                }
            }
            return Ok(());
        }
        let kind = match (notice, ctcp.is_ctcp()) {
            (_, true) => MessageKind::Action,
            (true, false) => MessageKind::Notice,
            (false, false) => MessageKind::Privmsg,
        };
        if !is_channel && !notice && self.store.open_query(from) {
            self.emit(Event::Joined(from.to_owned()));
        }
        let mention = !notice && is_mention(&ctcp.body, &self.nick);
        let message = Message {
            context: context.to_owned(),
            from: from.to_owned(),
            text: ctcp.body,
            kind,
            own: self.is_me(from),
        };
        self.emit_message(message, mention);
        Ok(())
    }

    fn on_join(&mut self, msg: &ServerMsg) -> Result<(), HandlerError> {
        let nick = msg.source_nick().ok_or(HandlerError::MissingSource)?.to_owned();
        let channel = msg.args.get(0).ok_or(HandlerError::MissingArg("channel"))?;
        if self.is_me(&nick) {
            self.pending_joins.remove(&channel.to_ascii_lowercase());
            self.store.join(channel);
            self.emit(Event::Joined(channel.to_owned()));
            return Ok(());
        }
        self.store.upsert_user(channel, &nick, ModeSet::new(), &self.info)?;
        self.emit_roster(channel);
        Ok(())
    }

    fn on_part(&mut self, msg: &ServerMsg) -> Result<(), HandlerError> {
        let nick = msg.source_nick().ok_or(HandlerError::MissingSource)?.to_owned();
        let channel = msg.args.get(0).ok_or(HandlerError::MissingArg("channel"))?;
        let reason = msg.args.get(1).map(str::to_owned);
        if self.is_me(&nick) {
            if let Some(chan) = self.store.part(channel, reason.as_deref()) {
                self.emit(Event::Parted { channel: chan.name, reason });
            }
            return Ok(());
        }
        self.store.remove_user(channel, &nick)?;
        self.emit_roster(channel);
        Ok(())
    }

    fn on_kick(
        &mut self,
        msg: &ServerMsg,
        sink: &mut impl ClientMsgSink,
    ) -> Result<(), HandlerError> {
        let by = msg.source_nick().ok_or(HandlerError::MissingSource)?.to_owned();
        let channel = msg.args.get(0).ok_or(HandlerError::MissingArg("channel"))?.to_owned();
        let victim = msg.args.get(1).ok_or(HandlerError::MissingArg("user"))?;
        let reason = msg.args.get(2).unwrap_or_default();
        if !self.is_me(victim) {
            self.store.remove_user(&channel, victim)?;
            self.emit_roster(&channel);
            return Ok(());
        }
        if let Some(chan) = self.store.part(&channel, Some(reason)) {
            let reason = format!("kicked by {by}: {reason}");
            self.emit(Event::Parted { channel: chan.name, reason: Some(reason) });
        }
        if self.config.rejoin_on_kick {
            tracing::info!(target: "ircsession", "rejoining {channel} after kick");
            self.join(&channel, sink);
        }
        Ok(())
    }

    fn on_quit(&mut self, msg: &ServerMsg) -> Result<(), HandlerError> {
        let nick = msg.source_nick().ok_or(HandlerError::MissingSource)?;
        for channel in self.store.quit_user(nick) {
            self.emit_roster(&channel);
        }
        Ok(())
    }

    fn on_nick(&mut self, msg: &ServerMsg) -> Result<(), HandlerError> {
        let old = msg.source_nick().ok_or(HandlerError::MissingSource)?.to_owned();
        let new = msg.args.get(0).ok_or(HandlerError::MissingArg("nick"))?.to_owned();
        if self.is_me(&old) {
            self.nick.clone_from(&new);
            self.emit(Event::Nick(new.clone()));
        }
        if self.store.rename_query(&old, &new) {
            self.emit(Event::diag(Some(&new), format!("{old} is now known as {new}")));
        }
        for channel in self.store.rename_user(&old, &new, &self.info) {
            self.emit_roster(&channel);
        }
        Ok(())
    }

    fn on_mode(&mut self, msg: &ServerMsg) -> Result<(), HandlerError> {
        let target = msg.args.get(0).ok_or(HandlerError::MissingArg("target"))?;
        let modes = msg.args.get(1).ok_or(HandlerError::MissingArg("modes"))?;
        if !self.info.is_channel(target) {
            tracing::debug!(target: "ircsession", "user modes for {target}: {modes}");
            return Ok(());
        }
        let targets = msg.args.all().get(2..).unwrap_or_default();
        let outcome = self.store.apply_mode(target, modes, targets, &self.info)?;
        if outcome.roster_changed {
            self.emit_roster(target);
        }
        Ok(())
    }

    fn on_topic(&mut self, msg: &ServerMsg) -> Result<(), HandlerError> {
        let setter = msg.source_nick().ok_or(HandlerError::MissingSource)?.to_owned();
        let channel = msg.args.get(0).ok_or(HandlerError::MissingArg("channel"))?;
        let text = msg.args.get(1).unwrap_or_default();
        let topic = (!text.is_empty()).then(|| Topic {
            text: text.to_owned(),
            setter: Some(setter),
            set_at: Some(chrono::Utc::now().timestamp()),
        });
        self.store.set_topic(channel, topic)?;
        self.emit_topic(channel);
        Ok(())
    }

    fn on_away(&mut self, msg: &ServerMsg) -> Result<(), HandlerError> {
        let nick = msg.source_nick().ok_or(HandlerError::MissingSource)?;
        let away = msg.args.get(0).is_some_and(|m| !m.is_empty());
        for channel in self.store.set_away(nick, away) {
            self.emit_roster(&channel);
        }
        Ok(())
    }

    fn on_numeric(&mut self, code: u16, msg: &ServerMsg) -> Result<(), HandlerError> {
        let arg = |idx: usize, name: &'static str| {
            msg.args.get(idx).ok_or(HandlerError::MissingArg(name))
        };
        match code {
            4 => self.info.parse_myinfo(&msg.args),
            5 => {
                for token in self.info.update_from_args(&msg.args) {
                    tracing::warn!(target: "ircsession", "invalid ISUPPORT token {token}");
                }
            }
            305 | 306 => self.emit(Event::diag(None, msg.args.last().unwrap_or_default())),
            324 => {
                let channel = arg(1, "channel")?;
                let targets = msg.args.all().get(3..).unwrap_or_default();
                self.store.apply_mode(channel, arg(2, "modes")?, targets, &self.info)?;
            }
            331 => {
                let channel = arg(1, "channel")?;
                self.store.set_topic(channel, None)?;
                self.emit_topic(channel);
            }
            332 => {
                let channel = arg(1, "channel")?;
                let topic = Topic { text: arg(2, "topic")?.to_owned(), setter: None, set_at: None };
                self.store.set_topic(channel, Some(topic))?;
                self.emit_topic(channel);
            }
            333 => {
                let channel = arg(1, "channel")?;
                let setter = arg(2, "setter")?;
                // Some servers send a full hostmask here.
                let setter = setter.split_once('!').map_or(setter, |(n, _)| n);
                let set_at = msg.args.get(3).and_then(|t| t.parse().ok());
                self.store.set_topic_meta(channel, setter, set_at)?;
                self.emit_topic(channel);
            }
            353 => {
                let channel = arg(2, "channel")?;
                let names = arg(3, "names")?;
                self.store.names_add(channel, names.split_ascii_whitespace(), &self.info)?;
            }
            366 => {
                let channel = arg(1, "channel")?;
                if self.store.names_end(channel, &self.info)? {
                    self.emit_roster(channel);
                }
            }
            900 => {
                self.account = msg.args.get(2).map(str::to_owned);
                self.emit(Event::diag(None, msg.args.last().unwrap_or_default()));
            }
            901 => {
                self.account = None;
                self.emit(Event::diag(None, msg.args.last().unwrap_or_default()));
            }
            401 => {
                let target = arg(1, "target")?;
                let is_query =
                    self.store.get(target).is_some_and(|c| c.kind == ChannelKind::Query);
                if is_query {
                    self.store.set_membership(target, Membership::Historical)?;
                }
                let context = is_query.then_some(target);
                let text = format!("{target}: {}", msg.args.last().unwrap_or_default());
                self.emit(Event::diag(context, text));
            }
            code if JOIN_REFUSALS.contains(&code) => {
                let channel = arg(1, "channel")?;
                let pending = self.pending_joins.remove(&channel.to_ascii_lowercase());
                if pending {
                    let detached = self
                        .store
                        .get(channel)
                        .is_some_and(|c| c.membership == Membership::Detached);
                    if detached {
                        self.store.part(channel, None);
                    }
                }
                let reason = msg.args.last().unwrap_or_default();
                // 403 and 405 also answer things other than JOIN.
                let text = if pending || code > 405 {
                    format!("cannot join {channel}: {reason}")
                } else {
                    format!("{channel}: {reason}")
                };
                self.emit(Event::diag(None, text));
            }
            code if msg.kind.is_error() => {
                let (words, last) = msg.args.split_last();
                let subject = words.get(1).map(String::as_str);
                let context = subject.filter(|s| self.store.contains(s));
                let text = match subject {
                    Some(subject) => format!("{subject}: {}", last.unwrap_or_default()),
                    None => last.unwrap_or_default().to_owned(),
                };
                tracing::debug!(target: "ircsession", "error numeric {code:03}: {text}");
                self.emit(Event::diag(context, text));
            }
            _ => tracing::trace!(target: "ircsession", "unhandled numeric {code:03}"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
