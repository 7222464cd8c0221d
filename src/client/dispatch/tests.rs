use super::*;
use crate::{client::event::NoPersistence, ircmsg::ClientMsg};
use std::sync::Mutex;

fn dispatcher(config: Config) -> Dispatcher {
    let mut core = Dispatcher::new(Arc::new(config), Arc::new(NoPersistence));
    core.nick = "me".to_owned();
    core
}

fn feed(core: &mut Dispatcher, lines: &[&str]) -> Vec<ClientMsg> {
    let mut sent = Vec::new();
    for line in lines {
        let msg = ServerMsg::parse(line).unwrap();
        core.dispatch(&msg, &mut sent).unwrap();
    }
    sent
}

fn nicks(core: &Dispatcher, channel: &str) -> Vec<String> {
    core.store.get(channel).unwrap().users.iter().map(|m| m.nick.clone()).collect()
}

#[derive(Default)]
struct Recorder {
    lines: Mutex<Vec<(String, String)>>,
    saved: Mutex<Vec<String>>,
}

impl Persistence for Recorder {
    fn append_log(&self, context: &str, line: &str) -> std::io::Result<()> {
        self.lines.lock().unwrap().push((context.to_owned(), line.to_owned()));
        Ok(())
    }
    fn load_ignores(&self) -> std::io::Result<Vec<String>> {
        Ok(vec!["*!*@spam.example".to_owned()])
    }
    fn save_ignores(&self, masks: &[String]) -> std::io::Result<()> {
        *self.saved.lock().unwrap() = masks.to_vec();
        Ok(())
    }
}

#[test]
fn mentions() {
    assert!(is_mention("me: hello", "me"));
    assert!(is_mention("hey ME!", "me"));
    assert!(!is_mention("meme", "me"));
    assert!(!is_mention("some_me", "me"));
    assert!(is_mention("ping [me]", "me"));
    assert!(is_mention("{me}|away", "me"));
    assert!(is_mention("me-too", "me"));
    assert!(!is_mention("anything", ""));
}

#[test]
fn channel_message_and_mention() {
    let mut core = dispatcher(Config::default());
    feed(&mut core, &[":me!u@h JOIN #chan"]);
    core.take_events();
    feed(
        &mut core,
        &[":alice!a@h PRIVMSG #chan :hi all", ":alice!a@h PRIVMSG #chan :me, you there?"],
    );
    let events = core.take_events();
    assert_eq!(events.len(), 2);
    let Event::Message(first) = &events[0] else { panic!("{:?}", events[0]) };
    assert_eq!(first.context, "#chan");
    assert_eq!(first.kind, MessageKind::Privmsg);
    assert!(!first.own);
    let Event::Mention(second) = &events[1] else { panic!("{:?}", events[1]) };
    assert_eq!(second.text, "me, you there?");
}

#[test]
fn direct_message_opens_query() {
    let mut core = dispatcher(Config::default());
    feed(&mut core, &[":bob!b@h PRIVMSG me :\x01ACTION waves\x01"]);
    let events = core.take_events();
    assert_eq!(events[0], Event::Joined("bob".to_owned()));
    let Event::Message(msg) = &events[1] else { panic!("{:?}", events[1]) };
    assert_eq!(msg.context, "bob");
    assert_eq!(msg.kind, MessageKind::Action);
    assert_eq!(msg.text, "waves");
    assert_eq!(core.store.get("bob").unwrap().kind, ChannelKind::Query);
    // A second message doesn't reopen it.
    feed(&mut core, &[":bob!b@h PRIVMSG me :again"]);
    assert_eq!(core.take_events().len(), 1);
}

#[test]
fn ignored_senders_are_dropped_and_logged_lines_recorded() {
    let recorder = Arc::new(Recorder::default());
    let mut core = Dispatcher::new(Arc::new(Config::default()), recorder.clone());
    core.nick = "me".to_owned();
    feed(
        &mut core,
        &[
            ":me!u@h JOIN #chan",
            ":troll!t@spam.example PRIVMSG #chan :buy now",
            ":alice!a@h NOTICE #chan :heads up",
        ],
    );
    let events = core.take_events();
    assert_eq!(events.len(), 2);
    let lines = recorder.lines.lock().unwrap().clone();
    assert_eq!(lines, vec![("#chan".to_owned(), "-alice- heads up".to_owned())]);
    core.ignores.add("alice");
    core.save_ignores();
    assert_eq!(recorder.saved.lock().unwrap().len(), 2);
}

#[test]
fn ctcp_version_reply() {
    let config = Config { version_reply: "tester 0.1".to_owned(), ..Default::default() };
    let mut core = dispatcher(config);
    let sent = feed(&mut core, &[":bob!b@h PRIVMSG me :\x01VERSION\x01"]);
    assert_eq!(sent, vec![ClientMsg::notice("bob", "\x01VERSION tester 0.1\x01")]);
    assert!(matches!(&core.take_events()[..], [Event::Diagnostic { .. }]));
    assert!(core.store.is_empty());
}

#[test]
fn refused_join_rolls_back() {
    let mut core = dispatcher(Config::default());
    let mut sent = Vec::new();
    core.join("#secret", &mut sent);
    assert_eq!(sent, vec![ClientMsg::join("#secret")]);
    assert!(core.store.contains("#secret"));
    feed(&mut core, &[":irc.example 474 me #secret :Cannot join channel (+b)"]);
    assert!(!core.store.contains("#secret"));
    assert!(core.pending_joins.is_empty());
    let events = core.take_events();
    assert_eq!(
        events,
        vec![Event::diag(None, "cannot join #secret: Cannot join channel (+b)")]
    );
}

#[test]
fn missing_or_excess_channel_rolls_back() {
    let mut core = dispatcher(Config::default());
    let mut sent = Vec::new();
    core.join("#gone", &mut sent);
    core.join("#many", &mut sent);
    feed(
        &mut core,
        &[
            ":irc.example 403 me #gone :No such channel",
            ":irc.example 405 me #many :You have joined too many channels",
        ],
    );
    assert!(!core.store.contains("#gone"));
    assert!(!core.store.contains("#many"));
    assert!(core.pending_joins.is_empty());
    // Without a pending JOIN it is only a diagnostic.
    core.take_events();
    feed(&mut core, &[":irc.example 403 me #else :No such channel"]);
    assert_eq!(core.take_events(), vec![Event::diag(None, "#else: No such channel")]);
}

#[test]
fn confirmed_join_keeps_channel() {
    let mut core = dispatcher(Config::default());
    let mut sent = Vec::new();
    core.join("#ok", &mut sent);
    feed(
        &mut core,
        &[
            ":me!u@h JOIN #ok",
            ":irc.example 353 me = #ok :@alice me",
            ":irc.example 366 me #ok :End of /NAMES list.",
        ],
    );
    assert!(core.pending_joins.is_empty());
    let chan = core.store.get("#ok").unwrap();
    assert_eq!(chan.membership, Membership::Joined);
    assert_eq!(nicks(&core, "#ok"), ["alice", "me"]);
    let events = core.take_events();
    assert_eq!(events[0], Event::Joined("#ok".to_owned()));
    let Event::Roster { users, .. } = &events[1] else { panic!("{:?}", events[1]) };
    assert_eq!(users[0].prefix, Some('@'));
}

#[test]
fn kick_with_rejoin() {
    let config = Config { rejoin_on_kick: true, ..Default::default() };
    let mut core = dispatcher(config);
    feed(&mut core, &[":me!u@h JOIN #chan"]);
    core.take_events();
    let sent = feed(&mut core, &[":op!o@h KICK #chan me :behave"]);
    assert_eq!(sent, vec![ClientMsg::join("#chan")]);
    let events = core.take_events();
    assert_eq!(
        events,
        vec![Event::Parted {
            channel: "#chan".to_owned(),
            reason: Some("kicked by op: behave".to_owned()),
        }]
    );
    assert!(core.pending_joins.contains("#chan"));
}

#[test]
fn kick_of_someone_else() {
    let mut core = dispatcher(Config::default());
    feed(&mut core, &[":me!u@h JOIN #chan", ":irc.example 353 me = #chan :me bob carol"]);
    feed(&mut core, &[":irc.example 366 me #chan :End", ":op!o@h KICK #chan bob"]);
    assert_eq!(nicks(&core, "#chan"), ["carol", "me"]);
    assert!(feed(&mut core, &[":op!o@h KICK #chan bob"]).is_empty());
}

#[test]
fn nick_change_across_rosters() {
    let mut core = dispatcher(Config::default());
    feed(
        &mut core,
        &[
            ":me!u@h JOIN #a",
            ":me!u@h JOIN #b",
            ":alice!a@h JOIN #a",
            ":carol!c@h JOIN #b",
            ":alice!a@h PRIVMSG me :hi",
        ],
    );
    core.take_events();
    feed(&mut core, &[":alice!a@h NICK zed"]);
    assert_eq!(nicks(&core, "#a"), ["zed"]);
    assert_eq!(nicks(&core, "#b"), ["carol"]);
    assert!(core.store.contains("zed"));
    assert!(!core.store.contains("alice"));
    let rosters = core
        .take_events()
        .into_iter()
        .filter(|e| matches!(e, Event::Roster { .. }))
        .count();
    assert_eq!(rosters, 1);

    feed(&mut core, &[":me!u@h NICK me2"]);
    assert_eq!(core.nick, "me2");
    assert!(core.take_events().contains(&Event::Nick("me2".to_owned())));
}

#[test]
fn no_such_nick_marks_query_historical() {
    let mut core = dispatcher(Config::default());
    feed(&mut core, &[":ghost!g@h PRIVMSG me :boo", ":ghost!g@h QUIT :gone"]);
    core.take_events();
    feed(&mut core, &[":irc.example 401 me ghost :No such nick/channel"]);
    let query = core.store.get("ghost").unwrap();
    assert_eq!(query.membership, Membership::Historical);
    assert_eq!(
        core.take_events(),
        vec![Event::diag(Some("ghost"), "ghost: No such nick/channel")]
    );
}

#[test]
fn topic_and_metadata() {
    let mut core = dispatcher(Config::default());
    feed(
        &mut core,
        &[
            ":me!u@h JOIN #chan",
            ":irc.example 332 me #chan :Welcome here",
            ":irc.example 333 me #chan alice!a@h 1700000000",
        ],
    );
    let topic = core.store.get("#chan").unwrap().topic.clone().unwrap();
    assert_eq!(topic.text, "Welcome here");
    assert_eq!(topic.setter.as_deref(), Some("alice"));
    assert_eq!(topic.set_at, Some(1700000000));
    feed(&mut core, &[":bob!b@h TOPIC #chan :"]);
    assert_eq!(core.store.get("#chan").unwrap().topic, None);
}

#[test]
fn failures_cost_one_message() {
    let mut core = dispatcher(Config::default());
    let mut sent = Vec::new();
    let bad = ServerMsg::parse(":alice!a@h PART #nowhere").unwrap();
    assert_eq!(
        core.dispatch(&bad, &mut sent),
        Err(HandlerError::UnknownChannel("#nowhere".to_owned()))
    );
    let missing = ServerMsg::parse("JOIN #chan").unwrap();
    assert_eq!(core.dispatch(&missing, &mut sent), Err(HandlerError::MissingSource));
    feed(&mut core, &[":me!u@h JOIN #chan"]);
    assert!(core.store.contains("#chan"));
}

#[test]
fn away_notify_updates_roster() {
    let mut core = dispatcher(Config::default());
    feed(&mut core, &[":me!u@h JOIN #chan", ":bob!b@h JOIN #chan"]);
    core.take_events();
    feed(&mut core, &[":bob!b@h AWAY :lunch"]);
    let events = core.take_events();
    let Event::Roster { users, .. } = &events[0] else { panic!("{:?}", events[0]) };
    assert!(users.iter().any(|u| u.nick == "bob" && u.away));
    feed(&mut core, &[":bob!b@h AWAY"]);
    assert!(!core.store.is_away("bob"));
}

#[test]
fn isupport_changes_channel_detection() {
    let mut core = dispatcher(Config::default());
    feed(&mut core, &[":irc.example 005 me CHANTYPES=& PREFIX=(qov)~@+ :are supported"]);
    assert!(core.info.is_channel("&local"));
    assert!(!core.info.is_channel("#chan"));
    feed(&mut core, &[":me!u@h JOIN &local", ":irc.example 353 me = &local :~boss +vee me"]);
    feed(&mut core, &[":irc.example 366 me &local :End"]);
    assert_eq!(nicks(&core, "&local"), ["boss", "vee", "me"]);
}
