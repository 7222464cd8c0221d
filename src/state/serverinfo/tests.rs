use super::{ChanModes, ISupportValue, ModeKind, PrefixMap, ServerInfo, Update};
use crate::{ircmsg::ServerMsg, state::Mode};

fn mode(c: char) -> Mode {
    Mode::from_char(c).unwrap()
}

#[test]
fn defaults_without_isupport() {
    let si = ServerInfo::new();
    assert_eq!(si.prefix_map(), &[(mode('o'), '@'), (mode('v'), '+')]);
    assert!(si.chanmodes().list.contains(mode('b')));
    assert!(si.chanmodes().flag.contains(mode('t')));
    assert_eq!(si.chantypes(), "#&");
    assert!(si.is_channel("#rust"));
    assert!(!si.is_channel("someone"));
    assert_eq!(si.mode_kind(mode('b')), ModeKind::List);
    assert_eq!(si.mode_kind(mode('k')), ModeKind::Param);
    assert_eq!(si.mode_kind(mode('l')), ModeKind::SetParam);
    assert_eq!(si.mode_kind(mode('n')), ModeKind::Flag);
    assert_eq!(si.mode_kind(mode('o')), ModeKind::Rank);
    assert_eq!(si.nicklen(), None);
}

#[test]
fn first_value_wins() {
    let mut si = ServerInfo::new();
    assert_eq!(si.update("PREFIX", "(qaohv)~&@%+"), Update::Learned);
    assert_eq!(si.update("PREFIX", "(ov)@+"), Update::Kept);
    assert_eq!(si.prefix_map().len(), 5);
    assert_eq!(si.update("NICKLEN", "30"), Update::Learned);
    assert_eq!(si.update("NICKLEN", "9"), Update::Kept);
    assert_eq!(si.nicklen(), Some(30));
    assert_eq!(si.update("FOO", "bar"), Update::Learned);
    assert_eq!(si.update("FOO", "baz"), Update::Kept);
    assert_eq!(si.get_other("FOO"), Some("bar"));
    assert_eq!(si.update("-FOO", ""), Update::Negated);
    assert_eq!(si.get_other("FOO"), Some("bar"));
}

#[test]
fn invalid_values_are_not_stored() {
    let mut si = ServerInfo::new();
    assert_eq!(si.update("NICKLEN", "lots"), Update::Invalid);
    assert_eq!(si.update("NICKLEN", "0"), Update::Invalid);
    assert_eq!(si.update("PREFIX", "(ov)@"), Update::Invalid);
    // A later valid value is still accepted.
    assert_eq!(si.update("NICKLEN", "16"), Update::Learned);
    assert_eq!(si.nicklen(), Some(16));
}

#[test]
fn isupport_across_lines() {
    let mut si = ServerInfo::new();
    let first = ServerMsg::parse(
        ":irc.example 005 me CHANTYPES=# PREFIX=(ov)@+ NETWORK=Example :are supported by this server",
    )
    .unwrap();
    let second = ServerMsg::parse(
        ":irc.example 005 me CHANMODES=beI,k,l,imnpst NETWORK=Other NICKLEN=12 :are supported",
    )
    .unwrap();
    assert!(si.update_from_args(&first.args).is_empty());
    assert!(si.update_from_args(&second.args).is_empty());
    assert_eq!(si.network(), Some("Example"));
    assert_eq!(si.chantypes(), "#");
    assert!(!si.is_channel("&local"));
    assert_eq!(si.nicklen(), Some(12));
    // The trailing text must not be mistaken for a token.
    assert_eq!(si.get_other("are supported by this server"), None);
}

#[test]
fn prefix_parsing() {
    let map = PrefixMap::parse_value("(qaohv)~&@%+").unwrap();
    assert_eq!(map.0[0], (mode('q'), '~'));
    assert_eq!(map.0[4], (mode('v'), '+'));
    assert_eq!(PrefixMap::parse_value("").unwrap(), PrefixMap::default());
    assert!(PrefixMap::parse_value("ov@+").is_none());
}

#[test]
fn split_multi_prefix() {
    let mut si = ServerInfo::new();
    si.update("PREFIX", "(qaohv)~&@%+");
    let (modes, nick) = si.split_prefixes("@+alice");
    assert_eq!(nick, "alice");
    assert!(modes.contains(mode('o')));
    assert!(modes.contains(mode('v')));
    assert_eq!(si.highest_prefix(modes), Some('@'));
    assert_eq!(si.highest_rank(modes), 2);
    let (modes, nick) = si.split_prefixes("bob");
    assert_eq!(nick, "bob");
    assert!(modes.is_empty());
    assert_eq!(si.highest_rank(modes), usize::MAX);
}

#[test]
fn chanmodes_categories() {
    let cm = ChanModes::parse_value("beI,kf,lj,CFLMPQ").unwrap();
    assert!(cm.list.contains(mode('I')));
    assert!(cm.param.contains(mode('f')));
    assert!(cm.set_param.contains(mode('j')));
    assert!(cm.flag.contains(mode('Q')));
    assert!(!ModeKind::SetParam.takes_arg(false));
    assert!(ModeKind::SetParam.takes_arg(true));
    assert!(ModeKind::Param.takes_arg(false));
}
