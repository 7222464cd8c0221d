//! The session engine: registration, dispatch, liveness, and reconnection.
//!
//! [`Session`] holds all of the per-connection logic and does no I/O.
//! [`run_session`] drives one over a stream, and [`spawn`] wraps that
//! in a reconnect loop running on its own task.

pub mod auth;
pub mod cap;
pub mod conn;
pub mod ctcp;
mod dispatch;
mod event;
mod handshake;
pub mod ignore;
mod liveness;
pub mod nick;
mod reconnect;
mod run;
mod session;
mod sink;
#[cfg(feature = "tls")]
pub mod tls;

pub use self::{
    conn::{ServerAddr, StreamTokio},
    dispatch::{is_mention, Dispatcher},
    event::*,
    handshake::{ConnectionState, Handled, Handshake},
    liveness::{supervise, Liveness},
    reconnect::*,
    run::*,
    session::*,
    sink::*,
};
