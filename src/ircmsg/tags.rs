//! Stuctures and utilities for IRCv3 message tags.

/// Collection mapping tag keys to unescaped values.
///
/// Insertion order is preserved. Keys are unique; a later duplicate replaces the earlier value.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct Tags {
    pairs: Vec<(String, String)>,
}

impl Tags {
    /// Creates a new empty `Tags`.
    pub const fn new() -> Self {
        Tags { pairs: Vec::new() }
    }
    /// Returns `true` if there are no tags.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
    /// Returns the number of tags.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }
    /// Returns the value associated with the provided key, if any.
    ///
    /// Tags without values map to the empty string.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
    /// Inserts a tag, returning the old value if there was one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        let value = value.into();
        if let Some((_, old)) = self.pairs.iter_mut().find(|(k, _)| *k == key) {
            return Some(std::mem::replace(old, value));
        }
        self.pairs.push((key, value));
        None
    }
    /// Parses the provided semicolon-delimited list of tag strings.
    ///
    /// The provided word should NOT contain the leading '@'.
    pub fn parse(word: &str) -> Self {
        let mut tags = Tags::new();
        for pair in word.split(';') {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            if key.is_empty() {
                continue;
            }
            tags.insert(key, unescape(value));
        }
        tags
    }
    /// Iterates over the key-value pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Undoes IRCv3 tag value escaping.
pub fn unescape(value: &str) -> String {
    let mut retval = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            retval.push(c);
            continue;
        }
        match chars.next() {
            Some(':') => retval.push(';'),
            Some('s') => retval.push(' '),
            Some('\\') => retval.push('\\'),
            Some('r') => retval.push('\r'),
            Some('n') => retval.push('\n'),
            Some(other) => retval.push(other),
            // A trailing lone backslash is dropped.
            None => (),
        }
    }
    retval
}

/// Applies IRCv3 tag value escaping.
pub fn escape(value: &str) -> String {
    let mut retval = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            ';' => retval.push_str("\\:"),
            ' ' => retval.push_str("\\s"),
            '\\' => retval.push_str("\\\\"),
            '\r' => retval.push_str("\\r"),
            '\n' => retval.push_str("\\n"),
            c => retval.push(c),
        }
    }
    retval
}

impl std::fmt::Display for Tags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut prefix = "@";
        for (key, value) in &self.pairs {
            write!(f, "{prefix}{key}")?;
            if !value.is_empty() {
                write!(f, "={}", escape(value))?;
            }
            prefix = ";";
        }
        Ok(())
    }
}
