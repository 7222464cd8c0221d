use super::*;
use crate::error::ParseError;
use tokio_util::{
    bytes::BytesMut,
    codec::{Decoder, Encoder},
};

fn reparse(line: &str) -> ServerMsg {
    let msg = ServerMsg::parse(line).expect("first parse failed");
    ServerMsg::parse(&msg.to_string()).expect("reparse failed")
}

#[test]
fn parse_basic() {
    let msg = ServerMsg::parse(":nick!user@host PRIVMSG #chan :hello there\r\n").unwrap();
    let src = msg.source.as_ref().unwrap();
    assert_eq!(src.nick, "nick");
    let uh = src.userhost.as_ref().unwrap();
    assert_eq!(uh.user.as_deref(), Some("user"));
    assert_eq!(uh.host, "host");
    assert_eq!(msg.kind, Kind::Privmsg);
    assert_eq!(msg.args.all(), ["#chan", "hello there"]);
    assert!(msg.args.is_last_long());
}

#[test]
fn parse_numeric_and_case() {
    let msg = ServerMsg::parse(":irc.example 005 me PREFIX=(ov)@+ :are supported").unwrap();
    assert_eq!(msg.kind.numeric(), Some(5));
    assert_eq!(msg.source_nick(), Some("irc.example"));
    assert!(msg.source.unwrap().userhost.is_none());
    let msg = ServerMsg::parse("privmsg #a b").unwrap();
    assert_eq!(msg.kind, Kind::Privmsg);
    assert!(!msg.args.is_last_long());
    let msg = ServerMsg::parse("FOOBAR x").unwrap();
    assert_eq!(msg.kind, Kind::Unknown("FOOBAR".to_owned()));
}

#[test]
fn parse_errors() {
    assert_eq!(ServerMsg::parse(""), Err(ParseError::Empty));
    assert_eq!(ServerMsg::parse("   \r\n"), Err(ParseError::Empty));
    assert_eq!(ServerMsg::parse("@ PING"), Err(ParseError::NoTags));
    assert_eq!(ServerMsg::parse(": PING"), Err(ParseError::NoSource));
    assert_eq!(ServerMsg::parse(":src"), Err(ParseError::NoKind));
    assert!(matches!(ServerMsg::parse("PR1VMSG x"), Err(ParseError::InvalidKind(_))));
    assert!(matches!(ServerMsg::parse("0001 x"), Err(ParseError::InvalidKind(_))));
    assert_eq!(ServerMsg::parse("PING a\0b"), Err(ParseError::InvalidByte(0)));
}

#[test]
fn parse_tags() {
    let msg =
        ServerMsg::parse("@time=2024-01-01T00:00:00Z;msg=a\\sb\\:c;flag :n!u@h PRIVMSG #x :hi")
            .unwrap();
    assert_eq!(msg.tags.get("time"), Some("2024-01-01T00:00:00Z"));
    assert_eq!(msg.tags.get("msg"), Some("a b;c"));
    assert_eq!(msg.tags.get("flag"), Some(""));
    assert_eq!(msg.tags.get("nope"), None);
}

#[test]
fn round_trip_stable() {
    let lines = [
        ":nick!user@host PRIVMSG #chan :hello there",
        ":server 001 me :Welcome",
        "PING :token",
        "PING token",
        ":s 353 me = #c :@op +voice plain",
        ":s 333 me #c setter 1700000000",
        "@a=b\\\\c;d :n@h NOTICE me ::starts with colon",
        ":n!u@h PRIVMSG #c :",
        ":n!u@ MODE #c +ov-b a b c!*@*",
        "CAP * LS * :multi-prefix sasl=PLAIN,EXTERNAL",
        "  :src   JOIN   #spaced  ",
    ];
    for line in lines {
        let first = ServerMsg::parse(line).unwrap();
        assert_eq!(first, reparse(line), "round trip of {line:?}");
    }
}

#[test]
fn client_msg_display() {
    let msg = ClientMsg::privmsg("#chan", "hi there");
    assert_eq!(msg.to_string(), "PRIVMSG #chan :hi there");
    let msg = ClientMsg::join("#chan");
    assert_eq!(msg.to_string(), "JOIN #chan");
    let msg = ClientMsg::new(Kind::Cap).arg("REQ").long("away-notify");
    assert_eq!(msg.to_string(), "CAP REQ :away-notify");
    let msg = ClientMsg::new(Kind::Ping).arg(":odd");
    assert_eq!(msg.to_string(), "PING ::odd");
    assert_eq!(msg.wire_len(), "PING ::odd\r\n".len());
}

#[test]
fn args_add_before_long() {
    let mut args = Args::new();
    args.add_long("text here");
    args.add("#target");
    assert_eq!(args.all(), ["#target", "text here"]);
    assert_eq!(args.to_string(), "#target :text here");
}

#[test]
fn ctcp_parse() {
    let ctcp = MaybeCtcp::parse("\x01version\x01");
    assert_eq!(ctcp.cmd, "VERSION");
    assert_eq!(ctcp.body, "");
    let ctcp = MaybeCtcp::parse("\x01ACTION waves hello\x01");
    assert_eq!(ctcp.cmd, "ACTION");
    assert_eq!(ctcp.body, "waves hello");
    let ctcp = MaybeCtcp::parse("\x01PING 12345");
    assert_eq!(ctcp.cmd, "PING");
    assert_eq!(ctcp.body, "12345");
    let plain = MaybeCtcp::parse("just text");
    assert!(!plain.is_ctcp());
    assert_eq!(plain.to_string(), "just text");
    assert_eq!(MaybeCtcp::new("PING", "1").to_string(), "\x01PING 1\x01");
}

#[test]
fn codec_reassembles_partial_lines() {
    let mut codec = ClientCodec::new();
    let mut buf = BytesMut::new();
    buf.extend_from_slice(b":a PRIVMSG #c :first\r\n:a PRIV");
    let first = codec.decode(&mut buf).unwrap().unwrap().unwrap();
    assert_eq!(first.args.last(), Some("first"));
    assert!(codec.decode(&mut buf).unwrap().is_none());
    buf.extend_from_slice(b"MSG #c :second\r\n\r\n");
    let second = codec.decode(&mut buf).unwrap().unwrap().unwrap();
    assert_eq!(second.args.last(), Some("second"));
    // The blank line is skipped, not reported.
    assert!(codec.decode(&mut buf).unwrap().is_none());
    assert!(buf.is_empty());
}

#[test]
fn codec_skips_malformed_and_overlong() {
    let mut codec = ClientCodec::new();
    let mut buf = BytesMut::new();
    buf.extend_from_slice(b": BAD\r\nPING :ok\r\n");
    assert!(codec.decode(&mut buf).unwrap().unwrap().is_err());
    assert!(codec.decode(&mut buf).unwrap().unwrap().is_ok());
    let long = vec![b'x'; ServerMsg::MAX_LEN + 10];
    buf.extend_from_slice(&long);
    assert!(codec.decode(&mut buf).unwrap().is_none());
    buf.extend_from_slice(b"tail\r\nPING :after\r\n");
    assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), Err(ParseError::TooLong));
    let after = codec.decode(&mut buf).unwrap().unwrap().unwrap();
    assert_eq!(after.args.last(), Some("after"));
}

#[test]
fn codec_encode_framing() {
    let mut codec = ClientCodec::new();
    let mut buf = BytesMut::new();
    codec.encode(ClientMsg::privmsg("#c", "one\r\nQUIT :injected"), &mut buf).unwrap();
    assert_eq!(&buf[..], b"PRIVMSG #c :one  QUIT :injected\r\n");
}
