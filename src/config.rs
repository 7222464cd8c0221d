//! Session configuration.
//!
//! Everything here is consumed by a session, never mutated by it.
//! A reconnect reuses the same [`Config`].

use crate::client::ServerAddr;
use std::time::Duration;

/// Placeholder printed in place of secret values.
const DISPLAY_PLACEHOLDER: &str = "<?>";

/// A password or other sensitive string.
///
/// This newtype has a `Debug` impl that always prints `<?>`,
/// so configs can be logged without leaking credentials.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde_derive::Serialize, serde_derive::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Secret(String);

impl Secret {
    /// Wraps a secret string.
    pub fn new(secret: impl Into<String>) -> Self {
        Secret(secret.into())
    }
    /// Returns the secret value.
    pub fn reveal(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        DISPLAY_PLACEHOLDER.fmt(f)
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Secret::new(value)
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Secret(value)
    }
}

/// A username and password pair.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde_derive::Serialize, serde_derive::Deserialize))]
pub struct Credentials {
    /// The account or bouncer username.
    pub username: String,
    /// The password.
    pub password: Secret,
}

impl Credentials {
    /// Creates a new pair of credentials.
    pub fn new(username: impl Into<String>, password: impl Into<Secret>) -> Self {
        Credentials { username: username.into(), password: password.into() }
    }
}

/// Timers and delays used by a session.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde_derive::Serialize, serde_derive::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Timing {
    /// How long to wait for the transport (and TLS handshake) to come up.
    pub connect_timeout: Duration,
    /// How often to send a keepalive PING.
    pub ping_interval: Duration,
    /// How long the link may be silent before it is considered dead.
    pub read_timeout: Duration,
    /// Delay between consecutive auto-join JOINs.
    pub join_delay: Duration,
    /// How long a backlog replay may go quiet before it is considered finished.
    pub sync_idle: Duration,
    /// Upper bound on how long a backlog replay may take.
    pub sync_ceiling: Duration,
    /// How long to wait for services to confirm a NickServ login.
    pub login_timeout: Duration,
    /// Delay before reconnecting to a bouncer.
    pub bouncer_backoff: Duration,
    /// Delay before reconnecting directly to a server.
    pub direct_backoff: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Timing {
            connect_timeout: Duration::from_secs(30),
            ping_interval: Duration::from_secs(60),
            read_timeout: Duration::from_secs(180),
            join_delay: Duration::from_secs(1),
            sync_idle: Duration::from_millis(500),
            sync_ceiling: Duration::from_secs(30),
            login_timeout: Duration::from_secs(10),
            bouncer_backoff: Duration::from_secs(5),
            direct_backoff: Duration::from_secs(120),
        }
    }
}

/// Everything needed to run a session against one server.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde_derive::Serialize, serde_derive::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    /// Where to connect.
    pub server: ServerAddr,
    /// TLS options, used only if `server.tls` is set.
    #[cfg(feature = "tls")]
    pub tls: crate::client::tls::TlsConfigOptions,
    /// The preferred nickname.
    pub nick: String,
    /// Nicknames to try in order if the preferred one is taken.
    pub backup_nicks: Vec<String>,
    /// How many random suffixes to try once the backups run out.
    pub nick_suffix_attempts: u8,
    /// The USER username. Taken from the local account if empty.
    pub username: String,
    /// The USER realname. Taken from the local account if empty.
    pub realname: String,
    /// Password to IDENTIFY to services with after MOTD.
    ///
    /// Only used if SASL isn't configured.
    pub nickserv: Option<Secret>,
    /// The services nickname to IDENTIFY to.
    pub nickserv_service: String,
    /// SASL PLAIN credentials.
    pub sasl: Option<Credentials>,
    /// Bouncer credentials, sent as PASS.
    ///
    /// Setting these marks the connection as bouncer-backed,
    /// which enables backlog-replay detection and short reconnect backoff.
    pub bouncer: Option<Credentials>,
    /// Channels to join once registered.
    pub autojoin: Vec<String>,
    /// Whether to join `autojoin` at all.
    pub autojoin_enabled: bool,
    /// Whether to rejoin a channel after being kicked from it.
    pub rejoin_on_kick: bool,
    /// The reply to CTCP VERSION.
    pub version_reply: String,
    /// Timers and delays.
    pub timing: Timing,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerAddr::default(),
            #[cfg(feature = "tls")]
            tls: Default::default(),
            nick: "ircsession".to_owned(),
            backup_nicks: Vec::new(),
            nick_suffix_attempts: 8,
            username: String::new(),
            realname: String::new(),
            nickserv: None,
            nickserv_service: "NickServ".to_owned(),
            sasl: None,
            bouncer: None,
            autojoin: Vec::new(),
            autojoin_enabled: true,
            rejoin_on_kick: false,
            version_reply: concat!("ircsession ", env!("CARGO_PKG_VERSION")).to_owned(),
            timing: Timing::default(),
        }
    }
}

impl Config {
    /// Creates a config for connecting to `server` as `nick`, with defaults for everything else.
    pub fn new(server: ServerAddr, nick: impl Into<String>) -> Self {
        Config { server, nick: nick.into(), ..Default::default() }
    }
    /// Returns `true` if this connection goes through a bouncer.
    pub fn is_bouncer(&self) -> bool {
        self.bouncer.is_some()
    }
    /// Returns the delay before reconnecting after a session ends.
    pub fn backoff(&self) -> Duration {
        if self.is_bouncer() {
            self.timing.bouncer_backoff
        } else {
            self.timing.direct_backoff
        }
    }
    /// Returns the USER username, falling back to the local account name.
    pub fn username(&self) -> String {
        if !self.username.is_empty() {
            return self.username.clone();
        }
        #[cfg(feature = "whoami")]
        {
            let name: String =
                whoami::username().chars().filter(|c| c.is_ascii_alphanumeric()).collect();
            if !name.is_empty() {
                return name;
            }
        }
        "user".to_owned()
    }
    /// Returns the USER realname, falling back to the local user's full name.
    pub fn realname(&self) -> String {
        if !self.realname.is_empty() {
            return self.realname.clone();
        }
        #[cfg(feature = "whoami")]
        {
            let name = whoami::realname();
            if !name.trim().is_empty() {
                return name;
            }
        }
        "???".to_owned()
    }
    /// Returns the channels to auto-join, if auto-join is enabled.
    pub fn autojoin_channels(&self) -> &[String] {
        if self.autojoin_enabled {
            &self.autojoin
        } else {
            &[]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_are_redacted() {
        let creds = Credentials::new("me", "hunter2");
        let printed = format!("{creds:?}");
        assert!(printed.contains("me"));
        assert!(!printed.contains("hunter2"));
        assert_eq!(creds.password.reveal(), "hunter2");
    }

    #[test]
    fn backoff_depends_on_bouncer() {
        let mut config = Config::new(ServerAddr::from_host("irc.example"), "me");
        assert_eq!(config.backoff(), config.timing.direct_backoff);
        config.bouncer = Some(Credentials::new("me/libera", "pw"));
        assert!(config.is_bouncer());
        assert_eq!(config.backoff(), Duration::from_secs(5));
        assert!(config.backoff() < config.timing.direct_backoff);
    }

    #[test]
    fn identity_defaults() {
        let config = Config { username: "bob".into(), ..Default::default() };
        assert_eq!(config.username(), "bob");
        assert!(!config.username.is_empty());
        let config = Config::default();
        assert!(!config.username().is_empty());
        assert!(!config.realname().is_empty());
    }

    #[test]
    fn autojoin_toggle() {
        let mut config = Config { autojoin: vec!["#a".into()], ..Default::default() };
        assert_eq!(config.autojoin_channels(), ["#a"]);
        config.autojoin_enabled = false;
        assert!(config.autojoin_channels().is_empty());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn deserialize_partial() {
        let config: Config = serde_json::from_str(
            r##"{
                "server": { "address": "irc.example", "tls": false, "port": null },
                "nick": "me",
                "sasl": { "username": "me", "password": "pw" },
                "autojoin": ["#one", "#two"],
                "timing": { "join_delay": { "secs": 2, "nanos": 0 } }
            }"##,
        )
        .unwrap();
        assert_eq!(config.server.port_num(), 6667);
        assert_eq!(config.sasl.unwrap().password.reveal(), "pw");
        assert_eq!(config.autojoin.len(), 2);
        assert_eq!(config.timing.join_delay, Duration::from_secs(2));
        assert_eq!(config.timing.sync_idle, Duration::from_millis(500));
        assert!(config.autojoin_enabled);
    }
}
