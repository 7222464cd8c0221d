//! Driving a [`Session`] over a live connection.

use super::{
    event::Event,
    handshake::ConnectionState,
    liveness::supervise,
    session::{Command, Flow, Session},
    sink::{run_writer, Outbox},
    ClientMsgSink,
};
use crate::{
    error::SessionError,
    ircmsg::{ClientCodec, ClientMsg, Kind},
};
use std::time::Duration;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite},
    sync::{mpsc, watch},
    task::{JoinError, JoinHandle},
    time::Instant,
};
use tokio_util::{bytes::BytesMut, codec::Decoder, sync::CancellationToken};

/// How long the writer gets to flush after the read side is done.
const WRITER_GRACE: Duration = Duration::from_secs(5);

/// Why a connection ended without an error.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Exit {
    /// The user asked to quit.
    Quit,
    /// Shutdown was requested, or the command channel closed.
    Shutdown,
}

/// Where a session's events go.
///
/// Also tracks the latest [`ConnectionState`] for anyone watching.
#[derive(Debug)]
pub struct EventTx {
    events: mpsc::UnboundedSender<Event>,
    state: watch::Sender<ConnectionState>,
}

impl EventTx {
    /// Creates a new event sender along with its receivers.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Event>, watch::Receiver<ConnectionState>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let (state, state_rx) = watch::channel(ConnectionState::Disconnected);
        (EventTx { events, state }, events_rx, state_rx)
    }
    /// Emits one event.
    pub fn emit(&self, event: Event) {
        if let Event::State(state) = event {
            self.state.send_replace(state);
        }
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }
    fn forward(&self, session: &mut Session) {
        for event in session.take_events() {
            self.emit(event);
        }
    }
}

async fn join_opt<T>(handle: &mut Option<JoinHandle<T>>) -> Result<T, JoinError> {
    match handle {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

async fn sleep_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn read_lines(
    codec: &mut ClientCodec,
    buf: &mut BytesMut,
    session: &mut Session,
    outbox: &mut Outbox,
) -> Result<(), SessionError> {
    let now = Instant::now();
    session.liveness().touch(now);
    while let Some(item) = codec.decode(buf)? {
        match item {
            Ok(msg) => session.handle(msg, now, outbox)?,
            Err(e) => tracing::warn!(target: "ircsession", "skipping line: {e}"),
        }
    }
    Ok(())
}

/// Runs `session` over `stream` until the connection ends.
///
/// The stream is split: this task reads, a writer task drains the outbound queue,
/// and a supervisor task sends keepalives and watches for silence.
/// On the way out the read half is dropped first, then the supervisor is stopped,
/// then the writer is given a grace period to flush.
pub async fn run_session<S>(
    stream: S,
    session: &mut Session,
    commands: &mut mpsc::UnboundedReceiver<Command>,
    events: &EventTx,
    shutdown: &CancellationToken,
) -> Result<Exit, SessionError>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (mut read, write) = tokio::io::split(stream);
    let (mut outbox, queue) = Outbox::new();
    let mut writer = Some(tokio::spawn(run_writer(write, queue)));
    let stop_supervisor = shutdown.child_token();
    let mut supervisor = Some(tokio::spawn(supervise(
        session.liveness().clone(),
        session.config().timing,
        outbox.clone(),
        stop_supervisor.clone(),
    )));
    session.start(&mut outbox);
    events.forward(session);

    let mut codec = ClientCodec::new();
    let mut buf = BytesMut::with_capacity(16384);
    let result = loop {
        let deadline = session.next_deadline();
        let step = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                outbox.send(ClientMsg::new(Kind::Quit).long("Shutting down"));
                Err(Ok(Exit::Shutdown))
            }
            res = join_opt(&mut supervisor) => {
                supervisor = None;
                match res {
                    Ok(true) => Err(Err(SessionError::Timeout)),
                    Ok(false) => Ok(()),
                    Err(e) => Err(Err(SessionError::Io(std::io::Error::other(e)))),
                }
            }
            res = join_opt(&mut writer) => {
                writer = None;
                let e = match res {
                    Ok(Ok(())) => std::io::Error::other("writer stopped"),
                    Ok(Err(e)) => e,
                    Err(e) => std::io::Error::other(e),
                };
                Err(Err(SessionError::Io(e)))
            }
            _ = sleep_opt(deadline) => {
                session.on_deadline(Instant::now(), &mut outbox);
                Ok(())
            }
            cmd = commands.recv() => match cmd {
                Some(cmd) => match session.command(cmd, &mut outbox) {
                    Flow::Continue => Ok(()),
                    Flow::Quit => Err(Ok(Exit::Quit)),
                },
                None => Err(Ok(Exit::Shutdown)),
            },
            res = read.read_buf(&mut buf) => match res {
                Ok(0) => Err(Err(SessionError::Io(std::io::ErrorKind::UnexpectedEof.into()))),
                Ok(_) => read_lines(&mut codec, &mut buf, session, &mut outbox).map_err(Err),
                Err(e) => Err(Err(e.into())),
            },
        };
        events.forward(session);
        if let Err(done) = step {
            break done;
        }
    };

    drop(read);
    stop_supervisor.cancel();
    if let Some(supervisor) = supervisor {
        let _ = supervisor.await;
    }
    drop(outbox);
    if let Some(mut writer) = writer {
        match tokio::time::timeout(WRITER_GRACE, &mut writer).await {
            Ok(Ok(Ok(()))) => (),
            Ok(Ok(Err(e))) => tracing::debug!(target: "ircsession", "writer failed on close: {e}"),
            Ok(Err(e)) => tracing::warn!(target: "ircsession", "writer task failed: {e}"),
            Err(_) => {
                tracing::warn!(target: "ircsession", "writer did not finish in time");
                writer.abort();
            }
        }
    }
    match &result {
        Ok(exit) => tracing::info!(target: "ircsession", "connection closed: {exit:?}"),
        Err(e) => tracing::warn!(target: "ircsession", "connection lost: {e}"),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{client::event::NoPersistence, config::Config};
    use std::sync::Arc;
    use tokio::io::AsyncWriteExt;

    #[tokio::test(start_paused = true)]
    async fn server_error_ends_session() {
        let (client, mut server) = tokio::io::duplex(4096);
        let config = Config { nick: "me".to_owned(), ..Default::default() };
        let mut session = Session::new(Arc::new(config), Arc::new(NoPersistence), Instant::now());
        let (events, mut events_rx, state) = EventTx::new();
        let (_commands, mut commands_rx) = mpsc::unbounded_channel();
        server
            .write_all(b":irc.example 001 me :hi\r\n:irc.example 422 me :no motd\r\nERROR :Bye\r\n")
            .await
            .unwrap();
        let shutdown = CancellationToken::new();
        let res = run_session(client, &mut session, &mut commands_rx, &events, &shutdown).await;
        assert!(matches!(res, Err(SessionError::Closed(reason)) if reason == "Bye"));
        assert_eq!(*state.borrow(), ConnectionState::Ready);
        let mut diags = 0;
        while let Ok(event) = events_rx.try_recv() {
            diags += usize::from(matches!(event, Event::Diagnostic { .. }));
        }
        assert_eq!(diags, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn split_lines_and_garbage() {
        let (client, mut server) = tokio::io::duplex(4096);
        let mut session = Session::new(Arc::default(), Arc::new(NoPersistence), Instant::now());
        let (events, _events_rx, _state) = EventTx::new();
        let (commands, mut commands_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(async move {
            let res = run_session(client, &mut session, &mut commands_rx, &events, &shutdown).await;
            (res, session)
        });
        server.write_all(b"PING :one\r\n:bad 12x\r\nPI").await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        server.write_all(b"NG :two\r\n").await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        commands.send(Command::Raw("PRIVMSG #x :hi".to_owned())).unwrap();
        commands.send(Command::Quit(None)).unwrap();
        let (res, _session) = task.await.unwrap();
        assert_eq!(res.unwrap(), Exit::Quit);
        let mut sent = String::new();
        tokio::io::AsyncReadExt::read_to_string(&mut server, &mut sent).await.unwrap();
        let lines: Vec<&str> = sent.lines().collect();
        assert_eq!(lines[3..], ["PONG :one", "PONG :two", "PRIVMSG #x :hi", "QUIT :Leaving"]);
    }
}
