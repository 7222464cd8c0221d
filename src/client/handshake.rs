//! The handshake state machine.
//!
//! Drives a fresh connection from the first CAP LS through authentication, the registration
//! burst, and (for bouncers) backlog replay, up to the point where the session is ready.

use super::{
    auth::{SaslAction, SaslPlain},
    cap::{self, ServerMsgArgs, SubCmd},
    dispatch::Dispatcher,
    event::Event,
    nick::NickGen,
    ClientMsgSink,
};
use crate::ircmsg::{ClientMsg, Kind, ServerMsg};
use std::collections::VecDeque;
use tokio::time::Instant;

/// The lifecycle state of a connection.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde_derive::Serialize, serde_derive::Deserialize))]
pub enum ConnectionState {
    /// No connection.
    #[default]
    Disconnected,
    /// Opening the transport.
    Connecting,
    /// Negotiating capabilities and registering.
    Negotiating,
    /// Authenticating, either by SASL or to services.
    Authenticating,
    /// Absorbing a bouncer's backlog replay.
    Syncing,
    /// Fully registered.
    Ready,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Negotiating => "negotiating",
            ConnectionState::Authenticating => "authenticating",
            ConnectionState::Syncing => "syncing",
            ConnectionState::Ready => "ready",
        };
        f.write_str(s)
    }
}

/// Whether the handshake took ownership of a message.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Handled {
    /// The message was fully handled (or buffered) by the handshake.
    Consumed,
    /// The message should go to the dispatcher.
    Pass,
}

#[derive(Debug)]
enum Phase {
    Cap { ls: Option<ServerMsgArgs>, pending_reqs: usize, sasl_acked: bool },
    Sasl(SaslPlain),
    Burst,
    Login { deadline: Instant },
    Sync { idle: Instant, ceiling: Instant, buffer: Vec<ServerMsg> },
    Ready,
}

/// Returns `true` for messages that show a bouncer's replay is still going.
fn still_syncing(msg: &ServerMsg) -> bool {
    match &msg.kind {
        Kind::Join | Kind::Mode | Kind::Topic | Kind::Privmsg | Kind::Notice => true,
        Kind::Numeric(n) => matches!(n.code(), 324 | 329 | 331 | 332 | 333 | 353 | 366),
        _ => false,
    }
}

/// Returns `true` for messages held back until a replay is over.
fn buffered_while_syncing(msg: &ServerMsg) -> bool {
    match &msg.kind {
        Kind::Topic | Kind::Privmsg => true,
        Kind::Numeric(n) => matches!(n.code(), 331 | 332 | 333 | 353 | 366),
        _ => false,
    }
}

/// Handshake state for one connection.
#[derive(Debug)]
pub struct Handshake {
    phase: Phase,
    state: ConnectionState,
    nicks: NickGen,
    registered: bool,
    nicks_exhausted: bool,
    sasl_ok: bool,
    joins: VecDeque<String>,
    next_join: Option<Instant>,
}

impl Handshake {
    /// Creates a handshake for a connection whose transport is being opened.
    pub fn new(core: &Dispatcher) -> Self {
        let config = &core.config;
        Handshake {
            phase: Phase::Cap { ls: None, pending_reqs: 0, sasl_acked: false },
            state: ConnectionState::Connecting,
            nicks: NickGen::new(
                config.nick.clone(),
                config.backup_nicks.iter().cloned(),
                config.nick_suffix_attempts,
                None,
            ),
            registered: false,
            nicks_exhausted: false,
            sasl_ok: false,
            joins: VecDeque::new(),
            next_join: None,
        }
    }
    /// Replaces the nickname generator, mostly to fix its random seed.
    pub fn set_nick_gen(&mut self, nicks: NickGen) {
        self.nicks = nicks;
    }
    /// Returns the current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }
    /// Returns `true` once the server has accepted our registration.
    pub fn is_registered(&self) -> bool {
        self.registered
    }
    /// Advances the lifecycle state. The handshake never moves backwards.
    fn set_state(&mut self, core: &mut Dispatcher, state: ConnectionState) {
        if state > self.state {
            tracing::info!(target: "ircsession", "{} -> {state}", self.state);
            self.state = state;
            core.emit(Event::State(state));
        }
    }
    /// Sends the opening messages of registration.
    pub fn start(&mut self, core: &mut Dispatcher, sink: &mut impl ClientMsgSink) {
        sink.send(cap::msg_ls());
        if let Some(bouncer) = &core.config.bouncer {
            let pass = format!("{}:{}", bouncer.username, bouncer.password.reveal());
            sink.send(ClientMsg::new(Kind::Pass).arg(pass));
        }
        let nick = self.nicks.first();
        core.nick.clone_from(&nick);
        sink.send(ClientMsg::nick(nick));
        sink.send(
            ClientMsg::new(Kind::User)
                .arg(core.config.username())
                .arg("0")
                .arg("*")
                .long(core.config.realname()),
        );
        self.set_state(core, ConnectionState::Negotiating);
    }

    /// Offers a message to the handshake.
    pub fn handle(
        &mut self,
        msg: &ServerMsg,
        now: Instant,
        core: &mut Dispatcher,
        sink: &mut impl ClientMsgSink,
    ) -> Handled {
        let code = msg.kind.numeric();
        if !self.registered {
            match code {
                Some(1) => {
                    self.registered = true;
                    if let Some(nick) = msg.args.get(0) {
                        core.nick = nick.to_owned();
                        core.emit(Event::Nick(nick.to_owned()));
                    }
                    if matches!(self.phase, Phase::Cap { .. } | Phase::Sasl(_)) {
                        tracing::debug!(target: "ircsession", "registered without finishing CAP");
                        self.phase = Phase::Burst;
                    }
                    core.emit(Event::diag(None, msg.args.last().unwrap_or_default()));
                    return Handled::Consumed;
                }
                Some(432 | 433 | 436 | 437) => {
                    self.on_nick_rejected(msg, core, sink);
                    return Handled::Consumed;
                }
                _ => (),
            }
        }
        match &mut self.phase {
            Phase::Cap { .. } if msg.kind == Kind::Cap => {
                self.on_cap(msg, core, sink);
                Handled::Consumed
            }
            Phase::Sasl(sasl) => {
                if msg.kind != Kind::Authenticate && !matches!(code, Some(900..=908)) {
                    return Handled::Pass;
                }
                match sasl.handle(msg) {
                    SaslAction::Send(msgs) => msgs.into_iter().for_each(|m| sink.send(m)),
                    SaslAction::LoggedIn(account) => {
                        tracing::info!(target: "ircsession", "logged in as {account}");
                        core.account = Some(account);
                    }
                    SaslAction::Authed => {
                        self.sasl_ok = true;
                        self.end_cap(sink);
                    }
                    SaslAction::Failed(reason) => {
                        tracing::warn!(target: "ircsession", "SASL failed: {reason}");
                        core.emit(Event::diag(None, format!("SASL authentication failed: {reason}")));
                        if msg.kind == Kind::Authenticate {
                            sink.send(super::auth::msg_abort());
                        }
                        self.end_cap(sink);
                    }
                    SaslAction::Wait => (),
                }
                Handled::Consumed
            }
            Phase::Burst if matches!(code, Some(376 | 422)) => {
                self.after_motd(now, core, sink);
                Handled::Consumed
            }
            Phase::Burst
                if matches!(code, Some(2 | 3 | 251..=266 | 372 | 375)) =>
            {
                core.emit(Event::diag(None, msg.args.last().unwrap_or_default()));
                Handled::Consumed
            }
            Phase::Login { .. } if code == Some(900) => {
                tracing::info!(target: "ircsession", "services confirmed login");
                self.proceed(now, core, sink);
                Handled::Pass
            }
            Phase::Sync { idle, buffer, .. } if still_syncing(msg) => {
                *idle = now + core.config.timing.sync_idle;
                if buffered_while_syncing(msg) {
                    buffer.push(msg.clone());
                    Handled::Consumed
                } else {
                    Handled::Pass
                }
            }
            _ => Handled::Pass,
        }
    }

    fn on_nick_rejected(
        &mut self,
        msg: &ServerMsg,
        core: &mut Dispatcher,
        sink: &mut impl ClientMsgSink,
    ) {
        let rejected = msg.args.get(1).unwrap_or(core.nick.as_str()).to_owned();
        match self.nicks.next(&rejected, core.info.nicklen()) {
            Ok(nick) => {
                tracing::info!(target: "ircsession", "nick {rejected} unavailable, trying {nick}");
                core.nick.clone_from(&nick);
                sink.send(ClientMsg::nick(nick));
            }
            Err(e) => {
                tracing::warn!(target: "ircsession", "nick {rejected} unavailable: {e}");
                self.nicks_exhausted = true;
                let text = format!("nickname {rejected} is unavailable and {e}; choose another");
                core.emit(Event::diag(None, text));
            }
        }
    }

    fn on_cap(&mut self, msg: &ServerMsg, core: &mut Dispatcher, sink: &mut impl ClientMsgSink) {
        let args = match ServerMsgArgs::parse(&msg.args) {
            Ok(args) => args,
            Err(e) => {
                tracing::warn!(target: "ircsession", "bad CAP reply: {e}");
                return;
            }
        };
        let Phase::Cap { ls, pending_reqs, sasl_acked } = &mut self.phase else {
            return;
        };
        match args.subcmd {
            SubCmd::Ls => {
                let complete = match ls {
                    Some(prev) => match prev.combine(args) {
                        None => prev.is_last,
                        Some(_) => {
                            tracing::warn!(target: "ircsession", "mismatched CAP LS continuation");
                            prev.is_last
                        }
                    },
                    None => {
                        let is_last = args.is_last;
                        *ls = Some(args);
                        is_last
                    }
                };
                if !complete {
                    return;
                }
                let Some(offered) = ls.as_ref() else {
                    return;
                };
                let mut wanted = vec![cap::AWAY_NOTIFY];
                for extra in [cap::MULTI_PREFIX, cap::USERHOST_IN_NAMES] {
                    if offered.contains(extra) {
                        wanted.push(extra);
                    }
                }
                if core.config.sasl.is_some() {
                    if offered.contains(cap::SASL) {
                        wanted.push(cap::SASL);
                    } else {
                        core.emit(Event::diag(None, "server does not offer SASL"));
                    }
                }
                let mut reqs = Vec::new();
                cap::req(wanted, &mut reqs);
                *pending_reqs = reqs.len();
                reqs.into_iter().for_each(|m| sink.send(m));
            }
            SubCmd::Ack | SubCmd::Nak => {
                if args.subcmd == SubCmd::Ack {
                    *sasl_acked |= args.contains(cap::SASL);
                } else {
                    let names: Vec<&str> = args.caps.keys().map(String::as_str).collect();
                    tracing::info!(target: "ircsession", "server refused {}", names.join(" "));
                }
                *pending_reqs = pending_reqs.saturating_sub(1);
                if *pending_reqs > 0 {
                    return;
                }
                let sasl_acked = *sasl_acked;
                self.after_caps(sasl_acked, core, sink);
            }
            other => tracing::debug!(target: "ircsession", "ignoring CAP {other:?} during registration"),
        }
    }

    fn after_caps(&mut self, sasl_acked: bool, core: &mut Dispatcher, sink: &mut impl ClientMsgSink) {
        match (sasl_acked, core.config.sasl.clone()) {
            (true, Some(creds)) => {
                let (start, sasl) = SaslPlain::new(creds);
                sink.send(start);
                self.phase = Phase::Sasl(sasl);
                self.set_state(core, ConnectionState::Authenticating);
            }
            _ => self.end_cap(sink),
        }
    }

    fn end_cap(&mut self, sink: &mut impl ClientMsgSink) {
        sink.send(cap::msg_end());
        self.phase = Phase::Burst;
    }

    fn after_motd(&mut self, now: Instant, core: &mut Dispatcher, sink: &mut impl ClientMsgSink) {
        if let (false, Some(password)) = (self.sasl_ok, core.config.nickserv.clone()) {
            let service = core.config.nickserv_service.clone();
            sink.send(ClientMsg::privmsg(service, format!("IDENTIFY {}", password.reveal())));
            if core.config.autojoin_enabled {
                self.phase = Phase::Login { deadline: now + core.config.timing.login_timeout };
                self.set_state(core, ConnectionState::Authenticating);
                return;
            }
        }
        self.proceed(now, core, sink);
    }

    fn proceed(&mut self, now: Instant, core: &mut Dispatcher, sink: &mut impl ClientMsgSink) {
        if core.config.is_bouncer() {
            let timing = &core.config.timing;
            self.phase = Phase::Sync {
                idle: now + timing.sync_idle,
                ceiling: now + timing.sync_ceiling,
                buffer: Vec::new(),
            };
            self.set_state(core, ConnectionState::Syncing);
        } else {
            self.become_ready(now, core, sink);
        }
    }

    fn finish_sync(&mut self, now: Instant, core: &mut Dispatcher, sink: &mut impl ClientMsgSink) {
        let Phase::Sync { buffer, .. } = std::mem::replace(&mut self.phase, Phase::Ready) else {
            return;
        };
        tracing::info!(target: "ircsession", "backlog replay over, {} buffered lines", buffer.len());
        let (messages, state): (Vec<_>, Vec<_>) =
            buffer.into_iter().partition(|m| m.kind == Kind::Privmsg);
        for msg in state.iter().chain(messages.iter()) {
            if let Err(e) = core.dispatch(msg, sink) {
                tracing::warn!(target: "ircsession", "replayed {}: {e}", msg.kind);
            }
        }
        // Bouncers mark us away while detached.
        sink.send(ClientMsg::new(Kind::Away));
        self.become_ready(now, core, sink);
    }

    fn become_ready(&mut self, now: Instant, core: &mut Dispatcher, sink: &mut impl ClientMsgSink) {
        self.phase = Phase::Ready;
        self.set_state(core, ConnectionState::Ready);
        let config = core.config.clone();
        self.joins = config
            .autojoin_channels()
            .iter()
            .filter(|c| !core.store.get(c).is_some_and(|c| c.membership == crate::state::Membership::Joined))
            .cloned()
            .collect();
        self.next_join = Some(now);
        self.pump_joins(now, core, sink);
    }

    fn pump_joins(&mut self, now: Instant, core: &mut Dispatcher, sink: &mut impl ClientMsgSink) {
        while self.next_join.is_some_and(|at| at <= now) {
            let Some(channel) = self.joins.pop_front() else {
                self.next_join = None;
                break;
            };
            core.join(&channel, sink);
            self.next_join = Some(now + core.config.timing.join_delay);
        }
        if self.joins.is_empty() {
            self.next_join = None;
        }
    }

    /// Returns when [`on_deadline`][Handshake::on_deadline] next needs to be called.
    pub fn next_deadline(&self) -> Option<Instant> {
        let phase = match &self.phase {
            Phase::Login { deadline } => Some(*deadline),
            Phase::Sync { idle, ceiling, .. } => Some(std::cmp::min(*idle, *ceiling)),
            _ => None,
        };
        match (phase, self.next_join) {
            (Some(a), Some(b)) => Some(std::cmp::min(a, b)),
            (a, b) => a.or(b),
        }
    }

    /// Handles every timer that has expired as of `now`.
    pub fn on_deadline(&mut self, now: Instant, core: &mut Dispatcher, sink: &mut impl ClientMsgSink) {
        match &self.phase {
            Phase::Login { deadline } if *deadline <= now => {
                tracing::warn!(target: "ircsession", "no login confirmation from services");
                core.emit(Event::diag(None, "services did not confirm login in time"));
                self.proceed(now, core, sink);
            }
            Phase::Sync { idle, ceiling, .. } if *idle <= now || *ceiling <= now => {
                if *ceiling <= now && *idle > now {
                    tracing::warn!(target: "ircsession", "backlog replay hit the time limit");
                }
                self.finish_sync(now, core, sink);
            }
            _ => (),
        }
        self.pump_joins(now, core, sink);
    }

    /// Handles a user request to change nickname.
    pub fn change_nick(&mut self, nick: &str, core: &mut Dispatcher, sink: &mut impl ClientMsgSink) {
        if !self.registered {
            self.nicks.restart(nick);
            self.nicks_exhausted = false;
            core.nick = nick.to_owned();
        }
        sink.send(ClientMsg::nick(nick));
    }
}
