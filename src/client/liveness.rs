//! Keepalive pings and read-timeout detection.

use super::{ClientMsgSink, Outbox};
use crate::{
    config::Timing,
    ircmsg::{ClientMsg, Kind},
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct Inner {
    last_recv: Instant,
    last_ping: Instant,
    outstanding: Option<(String, Instant)>,
    seq: u32,
}

/// Shared record of when the link was last heard from and which PING is outstanding.
///
/// The read loop updates it, the supervisor task reads it.
/// Locks are never held across an await point.
#[derive(Clone, Debug)]
pub struct Liveness(Arc<Mutex<Inner>>);

impl Liveness {
    /// Creates a new tracker for a link that was just opened at `now`.
    pub fn new(now: Instant) -> Self {
        Liveness(Arc::new(Mutex::new(Inner {
            last_recv: now,
            last_ping: now,
            outstanding: None,
            seq: 0,
        })))
    }
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
    /// Records that data arrived at `now`.
    pub fn touch(&self, now: Instant) {
        self.lock().last_recv = now;
    }
    /// Returns how long the link has been silent as of `now`.
    pub fn silent_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.lock().last_recv)
    }
    /// Creates a keepalive PING and records when it was sent.
    pub fn ping(&self, now: Instant) -> ClientMsg {
        let mut inner = self.lock();
        inner.seq = inner.seq.wrapping_add(1);
        let token = format!("ircsession-{}", inner.seq);
        inner.last_ping = now;
        inner.outstanding = Some((token.clone(), now));
        ClientMsg::new(Kind::Ping).arg(token)
    }
    /// Handles a PONG carrying `token`.
    ///
    /// Returns the round-trip time if it answers the outstanding keepalive.
    pub fn pong(&self, token: &str, now: Instant) -> Option<Duration> {
        let mut inner = self.lock();
        match &inner.outstanding {
            Some((expected, sent)) if expected == token => {
                let rtt = now.saturating_duration_since(*sent);
                inner.outstanding = None;
                Some(rtt)
            }
            _ => None,
        }
    }
    /// Returns `true` if a keepalive is waiting for its PONG.
    pub fn is_outstanding(&self) -> bool {
        self.lock().outstanding.is_some()
    }
    /// Returns when the supervisor next needs to look at the link.
    pub fn next_check(&self, timing: &Timing) -> Instant {
        let inner = self.lock();
        std::cmp::min(inner.last_ping + timing.ping_interval, inner.last_recv + timing.read_timeout)
    }
    /// Returns `true` if the next keepalive is due at `now`.
    pub fn ping_due(&self, now: Instant, timing: &Timing) -> bool {
        now >= self.lock().last_ping + timing.ping_interval
    }
}

/// The liveness supervisor.
///
/// Sends a PING every `ping_interval` through `outbox`, and returns `true` once nothing has
/// been received for `read_timeout`. Returns `false` if cancelled first.
pub async fn supervise(
    liveness: Liveness,
    timing: Timing,
    mut outbox: Outbox,
    cancel: CancellationToken,
) -> bool {
    loop {
        let wake = liveness.next_check(&timing);
        tokio::select! {
            _ = cancel.cancelled() => return false,
            _ = tokio::time::sleep_until(wake) => (),
        }
        let now = Instant::now();
        let silent = liveness.silent_for(now);
        if silent >= timing.read_timeout {
            tracing::warn!(target: "ircsession", "nothing received for {silent:?}");
            return true;
        }
        if liveness.ping_due(now, &timing) {
            outbox.send(liveness.ping(now));
        }
    }
}
