//! Hostmask-based ignore lists.

use wildmatch::WildMatch;

/// Case-insensitively matches `text` against a glob `pattern`.
///
/// `*` matches any run of characters and `?` matches exactly one.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    WildMatch::new(&pattern.to_ascii_lowercase()).matches(&text.to_ascii_lowercase())
}

/// Expands a partial mask into a full `nick!user@host` glob.
///
/// `foo` becomes `foo!*@*` and `foo@bar` becomes `foo!*@bar`.
pub fn normalize_mask(mask: &str) -> String {
    let (nickuser, host) = mask.split_once('@').unwrap_or((mask, "*"));
    let (nick, user) = nickuser.split_once('!').unwrap_or((nickuser, "*"));
    let or_star = |s: &str| if s.is_empty() { "*".to_owned() } else { s.to_owned() };
    format!("{}!{}@{}", or_star(nick), or_star(user), or_star(host))
}

/// A list of hostmask globs whose messages are dropped.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct IgnoreList {
    masks: Vec<String>,
}

impl IgnoreList {
    /// Creates an empty ignore list.
    pub const fn new() -> Self {
        IgnoreList { masks: Vec::new() }
    }
    /// Adds a mask. Returns `false` if it was already present.
    pub fn add(&mut self, mask: &str) -> bool {
        let mask = normalize_mask(mask);
        if self.masks.iter().any(|m| m.eq_ignore_ascii_case(&mask)) {
            return false;
        }
        self.masks.push(mask);
        true
    }
    /// Removes a mask. Returns `false` if it wasn't present.
    pub fn remove(&mut self, mask: &str) -> bool {
        let mask = normalize_mask(mask);
        let before = self.masks.len();
        self.masks.retain(|m| !m.eq_ignore_ascii_case(&mask));
        before != self.masks.len()
    }
    /// Returns every mask, normalized.
    pub fn masks(&self) -> &[String] {
        &self.masks
    }
    /// Returns `true` if `hostmask` matches any mask in the list.
    pub fn matches(&self, hostmask: &str) -> bool {
        self.masks.iter().any(|m| glob_match(m, hostmask))
    }
}

impl<S: AsRef<str>> FromIterator<S> for IgnoreList {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        let mut list = IgnoreList::new();
        for mask in iter {
            list.add(mask.as_ref());
        }
        list
    }
}
