use super::*;
use crate::{client::event::NoPersistence, config::Timing};
use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

struct Scripted {
    streams: Mutex<VecDeque<DuplexStream>>,
    calls: Arc<AtomicUsize>,
}

impl Connector for Scripted {
    type Stream = DuplexStream;

    async fn connect(&self, _: &ServerAddr) -> std::io::Result<DuplexStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.streams.lock().unwrap().pop_front();
        next.ok_or_else(|| std::io::ErrorKind::ConnectionRefused.into())
    }
}

fn config() -> Config {
    Config {
        nick: "me".to_owned(),
        username: "u".to_owned(),
        realname: "r".to_owned(),
        timing: Timing {
            ping_interval: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
            direct_backoff: Duration::from_secs(120),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn nicks(users: impl IntoIterator<Item = String>) -> Vec<String> {
    users.into_iter().collect()
}

#[tokio::test(start_paused = true)]
async fn read_timeout_reconnects_once_with_fresh_state() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let (client1, mut server1) = tokio::io::duplex(8192);
    let (client2, mut server2) = tokio::io::duplex(8192);
    for (server, names) in [(&mut server1, "me alice bob"), (&mut server2, "me carol")] {
        let script = format!(
            ":irc.example 001 me :Welcome\r\n\
             :irc.example 376 me :End of MOTD\r\n\
             :me!u@h JOIN #chan\r\n\
             :irc.example 353 me = #chan :{names}\r\n\
             :irc.example 366 me #chan :End of /NAMES list.\r\n"
        );
        server.write_all(script.as_bytes()).await.unwrap();
    }
    let calls = Arc::new(AtomicUsize::new(0));
    let connector =
        Scripted { streams: Mutex::new([client1, client2].into()), calls: calls.clone() };
    let start = Instant::now();
    let (handle, mut events) = spawn(config(), connector, Arc::new(NoPersistence));

    let mut connecting = 0;
    let mut rosters = Vec::new();
    while let Some(event) = events.recv().await {
        match event {
            Event::State(ConnectionState::Connecting) => connecting += 1,
            Event::Roster { users, .. } => {
                let users = nicks(users.into_iter().map(|u| u.nick));
                let done = users.iter().any(|n| n == "carol");
                rosters.push(users);
                if done {
                    break;
                }
            }
            _ => (),
        }
    }
    assert_eq!(connecting, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    // Read timeout, then the backoff.
    assert!(start.elapsed() >= Duration::from_secs(150));
    assert_eq!(rosters, [vec!["alice", "bob", "me"], vec!["carol", "me"]]);

    let chan = handle.snapshot("#chan").await.unwrap();
    assert_eq!(nicks(chan.users.into_iter().map(|m| m.nick)), ["carol", "me"]);
    assert_eq!(handle.state(), ConnectionState::Ready);

    handle.shutdown();
    handle.shutdown();
    handle.join().await.unwrap();

    let mut sent = String::new();
    server1.read_to_string(&mut sent).await.unwrap();
    assert!(sent.starts_with("CAP LS 302\r\nNICK me\r\nUSER u 0 * :r\r\n"));
    assert_eq!(sent.matches("PING ").count(), 2);
    let mut sent = String::new();
    server2.read_to_string(&mut sent).await.unwrap();
    assert!(sent.ends_with("QUIT :Shutting down\r\n"));
}

#[tokio::test(start_paused = true)]
async fn commands_while_disconnected() {
    let calls = Arc::new(AtomicUsize::new(0));
    let connector = Scripted { streams: Mutex::new(VecDeque::new()), calls: calls.clone() };
    let (handle, mut events) = spawn(config(), connector, Arc::new(NoPersistence));
    loop {
        let event = events.recv().await.unwrap();
        if event == Event::State(ConnectionState::Disconnected) {
            break;
        }
    }
    assert_eq!(handle.snapshot("#chan").await, None);
    assert!(handle.send(Command::Quit(None)));
    handle.join().await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let rest: Vec<Event> = std::iter::from_fn(|| events.try_recv().ok()).collect();
    assert_eq!(rest.last(), Some(&Event::State(ConnectionState::Disconnected)));
}

#[tokio::test(start_paused = true)]
async fn quit_ends_for_good() {
    let (client, mut server) = tokio::io::duplex(8192);
    server.write_all(b":irc.example 001 me :Welcome\r\n:irc.example 422 me :No MOTD\r\n").await.unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let connector = Scripted { streams: Mutex::new([client].into()), calls: calls.clone() };
    let (handle, mut events) = spawn(config(), connector, Arc::new(NoPersistence));
    while events.recv().await != Some(Event::State(ConnectionState::Ready)) {}
    assert_eq!(*handle.watch_state().borrow(), ConnectionState::Ready);
    handle.send(Command::Quit(Some("bye".to_owned())));
    handle.join().await.unwrap();
    let mut sent = String::new();
    server.read_to_string(&mut sent).await.unwrap();
    assert!(sent.ends_with("QUIT :bye\r\n"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let mut last = None;
    while let Ok(event) = events.try_recv() {
        last = Some(event);
    }
    assert_eq!(last, Some(Event::State(ConnectionState::Disconnected)));
}
