//! Connecting, and reconnecting after the connection is lost.

use super::{
    conn::{ServerAddr, StreamTokio},
    event::{Event, Persistence},
    handshake::ConnectionState,
    run::{run_session, EventTx, Exit},
    session::{Command, Session},
};
use crate::{config::Config, error::SessionError, state::Channel};
use std::{future::Future, sync::Arc};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::{mpsc, oneshot, watch},
    task::{JoinError, JoinHandle},
    time::Instant,
};
use tokio_util::sync::CancellationToken;

/// Ways of opening a transport to a server.
pub trait Connector: Send + Sync + 'static {
    /// The stream type this connector yields.
    type Stream: AsyncRead + AsyncWrite + Send + 'static;
    /// Opens a connection to `server`.
    fn connect(&self, server: &ServerAddr)
        -> impl Future<Output = std::io::Result<Self::Stream>> + Send;
}

/// [`Connector`] that opens TCP connections, wrapped in TLS if the server asks for it.
#[derive(Clone, Debug, Default)]
pub struct TcpConnector {
    #[cfg(feature = "tls")]
    tls: Option<super::tls::TlsConfig>,
}

impl TcpConnector {
    /// Creates a connector for `config.server`, building a TLS config if it uses TLS.
    pub fn new(config: &Config) -> std::io::Result<Self> {
        #[cfg(feature = "tls")]
        {
            let tls = if config.server.tls { Some(config.tls.build()?) } else { None };
            Ok(TcpConnector { tls })
        }
        #[cfg(not(feature = "tls"))]
        {
            if config.server.tls {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::Unsupported,
                    "TLS support was not compiled in",
                ));
            }
            Ok(TcpConnector {})
        }
    }
}

impl Connector for TcpConnector {
    type Stream = StreamTokio;

    async fn connect(&self, server: &ServerAddr) -> std::io::Result<StreamTokio> {
        #[cfg(feature = "tls")]
        if let Some(tls) = &self.tls {
            return server.connect(tls.clone()).await;
        }
        server.connect_no_tls().await
    }
}

/// Handle to a session running in the background.
///
/// Dropping it closes the command channel, which shuts the session down.
#[derive(Debug)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    shutdown: CancellationToken,
    state: watch::Receiver<ConnectionState>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Sends a command. Returns `false` if the session is gone.
    pub fn send(&self, cmd: Command) -> bool {
        self.commands.send(cmd).is_ok()
    }
    /// Returns the latest lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }
    /// Returns a receiver that tracks the lifecycle state.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }
    /// Requests a read-only copy of a channel.
    pub async fn snapshot(&self, channel: impl Into<String>) -> Option<Channel> {
        let (reply, rx) = oneshot::channel();
        if !self.send(Command::Snapshot { channel: channel.into(), reply }) {
            return None;
        }
        rx.await.ok().flatten()
    }
    /// Stops the session and any reconnect attempt. Safe to call more than once.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
    /// Waits for the background task to finish.
    pub async fn join(self) -> Result<(), JoinError> {
        self.task.await
    }
}

/// Spawns a session that reconnects until told to stop.
///
/// Returns a handle to control it and the receiver for its events.
pub fn spawn<C: Connector>(
    config: Config,
    connector: C,
    persistence: Arc<dyn Persistence>,
) -> (SessionHandle, mpsc::UnboundedReceiver<Event>) {
    let (commands, commands_rx) = mpsc::unbounded_channel();
    let (events, events_rx, state) = EventTx::new();
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(run_with_reconnect(
        Arc::new(config),
        connector,
        persistence,
        commands_rx,
        events,
        shutdown.clone(),
    ));
    (SessionHandle { commands, shutdown, state, task }, events_rx)
}

/// Connects and runs sessions until the user quits or `shutdown` is cancelled.
///
/// Every attempt starts from a brand new [`Session`].
/// Between attempts it waits [`Config::backoff`], answering commands as best it can.
pub async fn run_with_reconnect<C: Connector>(
    config: Arc<Config>,
    connector: C,
    persistence: Arc<dyn Persistence>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    events: EventTx,
    shutdown: CancellationToken,
) {
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        events.emit(Event::State(ConnectionState::Connecting));
        tracing::info!(target: "ircsession", "connecting to {} (attempt {attempt})", config.server);
        let connect = tokio::time::timeout(
            config.timing.connect_timeout,
            connector.connect(&config.server),
        );
        let stream = tokio::select! {
            _ = shutdown.cancelled() => break,
            res = connect => match res {
                Ok(Ok(stream)) => Ok(stream),
                Ok(Err(e)) => Err(SessionError::Io(e)),
                Err(_) => Err(SessionError::Timeout),
            },
        };
        match stream {
            Ok(stream) => {
                let mut session = Session::new(config.clone(), persistence.clone(), Instant::now());
                match run_session(stream, &mut session, &mut commands, &events, &shutdown).await {
                    Ok(Exit::Quit | Exit::Shutdown) => break,
                    Err(e) => events.emit(Event::diag(None, format!("disconnected: {e}"))),
                }
            }
            Err(e) => {
                tracing::warn!(target: "ircsession", "could not connect to {}: {e}", config.server);
                events.emit(Event::diag(None, format!("could not connect: {e}")));
            }
        }
        events.emit(Event::State(ConnectionState::Disconnected));
        if !backoff(&config, &mut commands, &events, &shutdown).await {
            break;
        }
    }
    events.emit(Event::State(ConnectionState::Disconnected));
}

/// Waits out the reconnect delay. Returns `false` if we should stop instead.
async fn backoff(
    config: &Config,
    commands: &mut mpsc::UnboundedReceiver<Command>,
    events: &EventTx,
    shutdown: &CancellationToken,
) -> bool {
    let delay = config.backoff();
    tracing::info!(target: "ircsession", "reconnecting in {delay:?}");
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return false,
            _ = &mut sleep => return true,
            cmd = commands.recv() => match cmd {
                None | Some(Command::Quit(_)) => return false,
                Some(Command::Snapshot { reply, .. }) => {
                    let _ = reply.send(None);
                }
                Some(other) => {
                    tracing::debug!(target: "ircsession", "dropping {other:?} while disconnected");
                    events.emit(Event::diag(None, "not connected"));
                }
            },
        }
    }
}

#[cfg(test)]
mod tests;
