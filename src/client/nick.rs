//! Nickname generation and fallback strategies.

use std::collections::{BTreeSet, VecDeque};
use std::error::Error;

/// Error indicating that a nickname generator cannot generate any more nicknames.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct EndOfNicks;

impl std::fmt::Display for EndOfNicks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "no more nicknames")
    }
}

impl Error for EndOfNicks {}

/// Number of decimal digits appended by the random fallback.
const SUFFIX_DIGITS: usize = 3;

/// Yields nicknames to try during registration.
///
/// The preferred nickname comes first, then each backup in order, then up to a fixed number
/// of pseudorandom numeric suffixes on the preferred nickname.
/// A nickname that was already rejected is never yielded again.
#[derive(Clone, Debug)]
pub struct NickGen {
    preferred: String,
    backups: VecDeque<String>,
    tried: BTreeSet<String>,
    suffixes_left: u8,
    seed: u32,
}

impl NickGen {
    /// Creates a generator.
    ///
    /// `seed` fixes the suffix sequence, which is mostly useful for tests.
    pub fn new(
        preferred: impl Into<String>,
        backups: impl IntoIterator<Item = String>,
        suffix_attempts: u8,
        seed: Option<u32>,
    ) -> Self {
        let seed = seed.unwrap_or_else(|| {
            use std::time::{SystemTime, UNIX_EPOCH};
            let mut seed = 0u32;
            if let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) {
                seed ^= dur.as_millis() as u32;
                seed ^= dur.as_nanos() as u32;
            }
            seed
        });
        NickGen {
            preferred: preferred.into(),
            backups: backups.into_iter().collect(),
            tried: BTreeSet::new(),
            suffixes_left: suffix_attempts,
            seed,
        }
    }
    /// Returns the first nickname to try.
    pub fn first(&mut self) -> String {
        self.tried.insert(self.preferred.clone());
        self.preferred.clone()
    }
    /// Returns the next nickname to try after `rejected` was refused.
    ///
    /// `nicklen` is the server's maximum nickname length, if known.
    pub fn next(&mut self, rejected: &str, nicklen: Option<u16>) -> Result<String, EndOfNicks> {
        self.tried.insert(rejected.to_owned());
        while let Some(nick) = self.backups.pop_front() {
            if self.tried.insert(nick.clone()) {
                return Ok(nick);
            }
        }
        while self.suffixes_left > 0 {
            self.suffixes_left -= 1;
            let nick = self.gen_suffixed(nicklen);
            if self.tried.insert(nick.clone()) {
                return Ok(nick);
            }
        }
        Err(EndOfNicks)
    }
    /// Starts over with a new preferred nickname, as after the user picks one by hand.
    ///
    /// Nicknames that were already rejected stay rejected.
    pub fn restart(&mut self, preferred: impl Into<String>) {
        self.preferred = preferred.into();
        self.tried.remove(&self.preferred);
    }
    fn gen_suffixed(&mut self, nicklen: Option<u16>) -> String {
        let mut base: String = self.preferred.clone();
        if let Some(max) = nicklen.map(usize::from) {
            let keep = max.saturating_sub(SUFFIX_DIGITS);
            while base.len() > keep {
                base.pop();
            }
        }
        for _ in 0..SUFFIX_DIGITS {
            // LCG constants taken from Numerical Recipes.
            self.seed = self.seed.wrapping_mul(1664525).wrapping_add(1013904223);
            let digit = ((self.seed >> 16) % 10) as u8;
            base.push((b'0' + digit) as char);
        }
        base
    }
}

#[cfg(test)]
mod tests {
    use super::{EndOfNicks, NickGen};

    #[test]
    fn backups_then_suffixes() {
        let mut gen = NickGen::new("me", ["me_".to_owned(), "me__".to_owned()], 2, Some(1337));
        let first = gen.first();
        assert_eq!(first, "me");
        let second = gen.next(&first, None).unwrap();
        assert_eq!(second, "me_");
        let third = gen.next(&second, None).unwrap();
        assert_eq!(third, "me__");
        let fourth = gen.next(&third, None).unwrap();
        assert_eq!(fourth.len(), 5);
        assert!(fourth.starts_with("me"));
        let fifth = gen.next(&fourth, None).unwrap();
        assert_ne!(fourth, fifth);
        assert_eq!(gen.next(&fifth, None), Err(EndOfNicks));
    }

    #[test]
    fn never_repeats_rejected() {
        let backups = ["dup".to_owned(), "me".to_owned(), "dup".to_owned(), "other".to_owned()];
        let mut gen = NickGen::new("me", backups, 0, Some(1));
        let first = gen.first();
        assert_eq!(gen.next(&first, None).unwrap(), "dup");
        assert_eq!(gen.next("dup", None).unwrap(), "other");
        assert_eq!(gen.next("other", None), Err(EndOfNicks));
    }

    #[test]
    fn suffix_respects_nicklen() {
        let mut gen = NickGen::new("averylongnickname", [], 4, Some(42));
        let first = gen.first();
        let next = gen.next(&first, Some(9)).unwrap();
        assert_eq!(next.len(), 9);
        assert!(next.starts_with("avery"));
        assert!(next[6..].chars().all(|c| c.is_ascii_digit()));
    }
}
