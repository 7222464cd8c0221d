//! The sans-I/O core of one connection.

use super::{
    dispatch::Dispatcher,
    event::{Event, Message, MessageKind, Persistence},
    handshake::{ConnectionState, Handled, Handshake},
    liveness::Liveness,
    nick::NickGen,
    ClientMsgSink,
};
use crate::{
    config::Config,
    error::SessionError,
    ircmsg::{ClientMsg, Kind, MaybeCtcp, ServerMsg},
    state::{Channel, ChannelKind, Membership, ServerInfo, Store},
};
use std::sync::Arc;
use tokio::{sync::oneshot, time::Instant};

/// Requests from the presentation layer.
#[derive(Debug)]
#[non_exhaustive]
pub enum Command {
    /// Sends a raw line, as typed.
    Raw(String),
    /// Joins a channel.
    Join(String),
    /// Leaves a channel.
    Part {
        /// The channel.
        channel: String,
        /// The part message, if any.
        reason: Option<String>,
    },
    /// Sends a PRIVMSG.
    Privmsg {
        /// A channel or nickname.
        target: String,
        /// The text.
        text: String,
    },
    /// Sends a CTCP ACTION.
    Action {
        /// A channel or nickname.
        target: String,
        /// The text, without CTCP framing.
        text: String,
    },
    /// Sends a NOTICE.
    Notice {
        /// A channel or nickname.
        target: String,
        /// The text.
        text: String,
    },
    /// Changes nickname.
    ///
    /// Before registration completes this restarts nickname selection from the given nick.
    Nick(String),
    /// Marks us away with a message, or back with `None`.
    Away(Option<String>),
    /// Adds a mask to the ignore list.
    Ignore(String),
    /// Removes a mask from the ignore list.
    Unignore(String),
    /// Closes a channel or conversation, parting if still joined.
    Close(String),
    /// Requests a read-only copy of a channel.
    Snapshot {
        /// The channel or conversation.
        channel: String,
        /// Where the copy goes. Gets `None` if there is no such channel or no connection.
        reply: oneshot::Sender<Option<Channel>>,
    },
    /// Disconnects, sending QUIT with an optional message, and stops reconnecting.
    Quit(Option<String>),
}

/// What to do after a command.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Flow {
    /// Keep going.
    Continue,
    /// Tear the connection down for good.
    Quit,
}

/// State for one connection, and the logic that drives it.
///
/// A `Session` does no I/O of its own.
/// Inputs come in through [`handle`][Session::handle], [`command`][Session::command],
/// and [`on_deadline`][Session::on_deadline]; outputs go to a [`ClientMsgSink`]
/// and to the event queue drained by [`take_events`][Session::take_events].
/// A new one is created for every connection attempt, so nothing carries over.
#[derive(Debug)]
pub struct Session {
    core: Dispatcher,
    handshake: Handshake,
    liveness: Liveness,
}

impl Session {
    /// Creates a session for a connection being opened at `now`.
    pub fn new(config: Arc<Config>, persistence: Arc<dyn Persistence>, now: Instant) -> Self {
        let core = Dispatcher::new(config, persistence);
        let handshake = Handshake::new(&core);
        Session { core, handshake, liveness: Liveness::new(now) }
    }
    /// Replaces the nickname generator, mostly to fix its random seed.
    pub fn with_nick_gen(mut self, nicks: NickGen) -> Self {
        self.handshake.set_nick_gen(nicks);
        self
    }
    /// Returns the config this session was created with.
    pub fn config(&self) -> &Arc<Config> {
        &self.core.config
    }
    /// Returns the lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.handshake.state()
    }
    /// Returns our current (or currently attempted) nickname.
    pub fn nick(&self) -> &str {
        &self.core.nick
    }
    /// Returns the account we're logged into, if known.
    pub fn account(&self) -> Option<&str> {
        self.core.account.as_deref()
    }
    /// Returns what the server has told us about itself.
    pub fn server_info(&self) -> &ServerInfo {
        &self.core.info
    }
    /// Returns the channel and user state.
    pub fn store(&self) -> &Store {
        &self.core.store
    }
    /// Returns a read-only copy of a channel.
    pub fn snapshot(&self, channel: &str) -> Option<Channel> {
        self.core.store.snapshot(channel)
    }
    /// Returns the liveness tracker shared with the supervisor.
    pub fn liveness(&self) -> &Liveness {
        &self.liveness
    }
    /// Takes every event queued since the last call.
    pub fn take_events(&mut self) -> Vec<Event> {
        self.core.take_events()
    }

    /// Starts registration.
    pub fn start(&mut self, sink: &mut impl ClientMsgSink) {
        self.handshake.start(&mut self.core, sink);
    }

    /// Handles one message from the server.
    ///
    /// Errors are fatal to the connection.
    /// Malformed or unexpected messages are logged and otherwise ignored.
    pub fn handle(
        &mut self,
        msg: ServerMsg,
        now: Instant,
        sink: &mut impl ClientMsgSink,
    ) -> Result<(), SessionError> {
        self.liveness.touch(now);
        match msg.kind {
            Kind::Ping => {
                let mut pong = ClientMsg::new(Kind::Pong);
                pong.args = msg.args;
                sink.send(pong);
                return Ok(());
            }
            Kind::Pong => {
                let token = msg.args.last().unwrap_or_default();
                if let Some(rtt) = self.liveness.pong(token, now) {
                    tracing::trace!(target: "ircsession", "lag {rtt:?}");
                    self.core.emit(Event::Lag(rtt));
                }
                return Ok(());
            }
            Kind::Error => {
                let reason = msg.args.last().unwrap_or_default().to_owned();
                tracing::warn!(target: "ircsession", "server closed the link: {reason}");
                self.core.emit(Event::diag(None, format!("closing link: {reason}")));
                return Err(SessionError::Closed(reason));
            }
            _ => (),
        }
        if self.handshake.handle(&msg, now, &mut self.core, sink) == Handled::Consumed {
            return Ok(());
        }
        if let Err(e) = self.core.dispatch(&msg, sink) {
            tracing::warn!(target: "ircsession", "bad {}: {e}", msg.kind);
        }
        Ok(())
    }

    /// Returns when [`on_deadline`][Session::on_deadline] next needs to be called.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.handshake.next_deadline()
    }

    /// Handles every timer that has expired as of `now`.
    pub fn on_deadline(&mut self, now: Instant, sink: &mut impl ClientMsgSink) {
        self.handshake.on_deadline(now, &mut self.core, sink);
    }

    /// Handles a command from the presentation layer.
    pub fn command(&mut self, cmd: Command, sink: &mut impl ClientMsgSink) -> Flow {
        match cmd {
            Command::Raw(line) => match crate::ircmsg::parse(&line) {
                Ok((tags, _, cmd, args)) => sink.send(ClientMsg { tags, cmd, args }),
                Err(e) => self.core.emit(Event::diag(None, format!("not sent: {e}"))),
            },
            Command::Join(channel) => self.core.join(&channel, sink),
            Command::Part { channel, reason } => {
                let mut msg = ClientMsg::new(Kind::Part).arg(channel);
                if let Some(reason) = reason {
                    msg = msg.long(reason);
                }
                sink.send(msg);
            }
            Command::Privmsg { target, text } => {
                sink.send(ClientMsg::privmsg(&target, &text));
                self.echo(target, text, MessageKind::Privmsg);
            }
            Command::Action { target, text } => {
                let line = MaybeCtcp::new("ACTION", &text).into_line();
                sink.send(ClientMsg::privmsg(&target, line));
                self.echo(target, text, MessageKind::Action);
            }
            Command::Notice { target, text } => {
                sink.send(ClientMsg::notice(&target, &text));
                self.echo(target, text, MessageKind::Notice);
            }
            Command::Nick(nick) => self.handshake.change_nick(&nick, &mut self.core, sink),
            Command::Away(Some(reason)) => sink.send(ClientMsg::new(Kind::Away).long(reason)),
            Command::Away(None) => sink.send(ClientMsg::new(Kind::Away)),
            Command::Ignore(mask) => {
                let text = if self.core.ignores.add(&mask) {
                    self.core.save_ignores();
                    format!("now ignoring {mask}")
                } else {
                    format!("already ignoring {mask}")
                };
                self.core.emit(Event::diag(None, text));
            }
            Command::Unignore(mask) => {
                let text = if self.core.ignores.remove(&mask) {
                    self.core.save_ignores();
                    format!("no longer ignoring {mask}")
                } else {
                    format!("{mask} was not ignored")
                };
                self.core.emit(Event::diag(None, text));
            }
            Command::Close(name) => {
                let Some(chan) = self.core.store.get(&name) else {
                    return Flow::Continue;
                };
                if chan.kind == ChannelKind::Channel && chan.membership == Membership::Joined {
                    sink.send(ClientMsg::new(Kind::Part).arg(chan.name.clone()));
                }
                if let Some(chan) = self.core.store.part(&name, None) {
                    self.core.emit(Event::Parted { channel: chan.name, reason: None });
                }
            }
            Command::Snapshot { channel, reply } => {
                let _ = reply.send(self.snapshot(&channel));
            }
            Command::Quit(reason) => {
                let reason = reason.unwrap_or_else(|| "Leaving".to_owned());
                sink.send(ClientMsg::new(Kind::Quit).long(reason));
                return Flow::Quit;
            }
        }
        Flow::Continue
    }

    fn echo(&mut self, target: String, text: String, kind: MessageKind) {
        if !self.core.info.is_channel(&target) && self.core.store.open_query(&target) {
            self.core.emit(Event::Joined(target.clone()));
        }
        let msg = Message { context: target, from: self.core.nick.clone(), text, kind, own: true };
        self.core.emit_message(msg, false);
    }
}
