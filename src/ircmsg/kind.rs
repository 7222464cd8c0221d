use crate::error::ParseError;

/// A three-digit numeric reply code.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde_derive::Serialize, serde_derive::Deserialize))]
pub struct Numeric(u16);

impl Numeric {
    /// Creates a `Numeric` from an integer in `0..=999`.
    pub const fn from_int(code: u16) -> Option<Numeric> {
        if code <= 999 {
            Some(Numeric(code))
        } else {
            None
        }
    }
    /// Parses exactly three ASCII digits.
    pub fn from_str_digits(s: &str) -> Option<Numeric> {
        if s.len() != 3 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        s.parse().ok().map(Numeric)
    }
    /// Returns the numeric as an integer.
    pub const fn code(self) -> u16 {
        self.0
    }
    /// Returns `true` if this numeric is conventionally an error reply.
    ///
    /// This is `ERR_*` in `400..=599` plus the SASL failure range.
    pub const fn is_error(self) -> bool {
        matches!(self.0, 400..=599 | 902 | 904..=908)
    }
}

impl std::fmt::Debug for Numeric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:03}", self.0)
    }
}

impl std::fmt::Display for Numeric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:03}", self.0)
    }
}

macro_rules! known_kinds {
    ($($variant:ident = $name:literal;)+) => {
        /// Either a known command, a numeric reply, or something unrecognized.
        ///
        /// Commands are matched case-insensitively.
        #[derive(Clone, PartialEq, Eq, Hash, Debug)]
        #[non_exhaustive]
        pub enum Kind {
            /// A numeric reply.
            Numeric(Numeric),
            $(
            #[doc = concat!("The `", $name, "` command.")]
            $variant,
            )+
            /// A command this crate doesn't know about, upper-cased.
            Unknown(String),
        }

        impl Kind {
            fn from_cmd(cmd: String) -> Kind {
                match cmd.as_str() {
                    $($name => Kind::$variant,)+
                    _ => Kind::Unknown(cmd),
                }
            }
            /// Returns the command name, or `None` if this is a numeric.
            pub fn cmd_name(&self) -> Option<&str> {
                match self {
                    Kind::Numeric(_) => None,
                    $(Kind::$variant => Some($name),)+
                    Kind::Unknown(s) => Some(s.as_str()),
                }
            }
        }
    };
}

known_kinds! {
    Account = "ACCOUNT";
    Authenticate = "AUTHENTICATE";
    Away = "AWAY";
    Cap = "CAP";
    Chghost = "CHGHOST";
    Error = "ERROR";
    Invite = "INVITE";
    Join = "JOIN";
    Kick = "KICK";
    Mode = "MODE";
    Names = "NAMES";
    Nick = "NICK";
    Notice = "NOTICE";
    Part = "PART";
    Pass = "PASS";
    Ping = "PING";
    Pong = "PONG";
    Privmsg = "PRIVMSG";
    Quit = "QUIT";
    Topic = "TOPIC";
    User = "USER";
}

impl Kind {
    /// Parses a command or numeric.
    pub fn parse(word: &str) -> Result<Kind, ParseError> {
        if let Some(num) = Numeric::from_str_digits(word) {
            return Ok(Kind::Numeric(num));
        }
        if word.is_empty() || !word.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(ParseError::InvalidKind(word.to_owned()));
        }
        Ok(Kind::from_cmd(word.to_ascii_uppercase()))
    }
    /// Returns the numeric code if this is a numeric reply.
    pub fn numeric(&self) -> Option<u16> {
        match self {
            Kind::Numeric(n) => Some(n.code()),
            _ => None,
        }
    }
    /// Returns `true` if this is a numeric that is conventionally an error reply.
    pub fn is_error(&self) -> bool {
        matches!(self, Kind::Numeric(n) if n.is_error())
    }
}

impl From<Numeric> for Kind {
    fn from(value: Numeric) -> Self {
        Kind::Numeric(value)
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Kind::Numeric(n) => n.fmt(f),
            other => f.write_str(other.cmd_name().unwrap_or_default()),
        }
    }
}
