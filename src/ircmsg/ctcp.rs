/// A pair combining a CTCP query/reply (or empty if not applicable) and its data.
///
/// This type is written under the assumption that CTCP data, if present, will span the length
/// of a PRIVMSG/NOTICE.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub struct MaybeCtcp {
    /// The upper-cased CTCP command, or empty if this is not a CTCP message.
    pub cmd: String,
    /// The body of the CTCP message, or the whole message if [`cmd`][MaybeCtcp::cmd] is empty.
    pub body: String,
}

impl MaybeCtcp {
    /// Parses `self` out of the text of a PRIVMSG or NOTICE.
    ///
    /// A missing closing `\x01` is tolerated, as several clients omit it.
    pub fn parse(text: &str) -> Self {
        let Some(inner) = text.strip_prefix('\x01') else {
            return MaybeCtcp { cmd: String::new(), body: text.to_owned() };
        };
        let inner = inner.strip_suffix('\x01').unwrap_or(inner);
        let (cmd, body) = inner.split_once(' ').unwrap_or((inner, ""));
        if cmd.is_empty() {
            // "\x01\x01" or "\x01 foo". Not something anyone can reply to.
            return MaybeCtcp { cmd: String::new(), body: text.to_owned() };
        }
        MaybeCtcp { cmd: cmd.to_ascii_uppercase(), body: body.to_owned() }
    }
    /// Creates a CTCP message.
    pub fn new(cmd: impl Into<String>, body: impl Into<String>) -> Self {
        MaybeCtcp { cmd: cmd.into(), body: body.into() }
    }
    /// Returns `true` if [`cmd`][MaybeCtcp::cmd] is non-empty.
    pub fn is_ctcp(&self) -> bool {
        !self.cmd.is_empty()
    }
    /// Converts `self` back into a single line, suitable for inclusion into a message.
    pub fn into_line(self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for MaybeCtcp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.is_ctcp() {
            return f.write_str(&self.body);
        }
        if self.body.is_empty() {
            write!(f, "\x01{}\x01", self.cmd)
        } else {
            write!(f, "\x01{} {}\x01", self.cmd, self.body)
        }
    }
}

impl From<&str> for MaybeCtcp {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}
