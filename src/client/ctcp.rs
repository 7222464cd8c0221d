//! Answers to CTCP queries.

use crate::{config::Config, ircmsg::MaybeCtcp};

/// CTCP commands that get an answer, plus ACTION.
pub const SUPPORTED: &str = "ACTION CLIENTINFO FINGER PING TIME VERSION";

/// Returns the reply to a CTCP query, if it deserves one.
///
/// `now` is only used for `TIME`.
pub fn reply<Tz: chrono::TimeZone>(
    query: &MaybeCtcp,
    config: &Config,
    now: chrono::DateTime<Tz>,
) -> Option<MaybeCtcp>
where
    Tz::Offset: std::fmt::Display,
{
    let body = match query.cmd.as_str() {
        "VERSION" => config.version_reply.clone(),
        "PING" => query.body.clone(),
        "TIME" => now.to_rfc2822(),
        "CLIENTINFO" => SUPPORTED.to_owned(),
        "FINGER" => config.realname(),
        _ => return None,
    };
    Some(MaybeCtcp::new(query.cmd.clone(), body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn replies() {
        let config = Config { version_reply: "test 1.0".into(), ..Default::default() };
        let now = chrono::Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let version = reply(&MaybeCtcp::parse("\x01VERSION\x01"), &config, now).unwrap();
        assert_eq!(version.to_string(), "\x01VERSION test 1.0\x01");
        let ping = reply(&MaybeCtcp::parse("\x01PING 1234\x01"), &config, now).unwrap();
        assert_eq!(ping.body, "1234");
        let time = reply(&MaybeCtcp::parse("\x01TIME\x01"), &config, now).unwrap();
        assert!(time.body.starts_with("Fri,"));
        assert!(time.body.ends_with("Mar 2024 12:00:00 +0000"));
        assert!(reply(&MaybeCtcp::parse("\x01DCC SEND x\x01"), &config, now).is_none());
        assert!(reply(&MaybeCtcp::parse("\x01ACTION waves\x01"), &config, now).is_none());
    }
}
