//! IRC message argument utilities.

/// IRC message argument array.
///
/// This type enforces the invariant that
/// only the last argument may be longer than one word.
/// The flag records whether the last argument is a trailing (`:`-prefixed) one.
#[derive(Clone, PartialEq, Eq, Hash, Default, Debug)]
pub struct Args(Vec<String>, bool);

impl Args {
    /// Creates a new empty argument array.
    pub const fn new() -> Args {
        Args(Vec::new(), false)
    }
    /// Parses an argument array from the part of a line after the command.
    pub fn parse(mut line: &str) -> Args {
        let mut args = Args::new();
        loop {
            line = line.trim_start_matches(' ');
            if let Some(long) = line.strip_prefix(':') {
                args.0.push(long.to_owned());
                args.1 = true;
                break;
            }
            let (word, rest) = match line.find(' ') {
                Some(idx) => (&line[..idx], &line[idx..]),
                None => (line, ""),
            };
            if word.is_empty() {
                break;
            }
            args.0.push(word.to_owned());
            line = rest;
        }
        args
    }
    /// Clears the argument array.
    pub fn clear(&mut self) {
        self.0.clear();
        self.1 = false;
    }
    /// Adds a word to the argument array.
    ///
    /// The word will be added to the end of the argument array unless the last argument is long,
    /// in which case it will be added just before it.
    /// Whitespace in `word` is replaced, since a middle argument cannot contain it.
    pub fn add(&mut self, word: impl Into<String>) {
        let mut word = word.into();
        if word.contains(' ') {
            word = word.replace(' ', "_");
        }
        if self.1 {
            let idx = self.0.len() - 1;
            self.0.insert(idx, word);
        } else {
            self.0.push(word);
        }
    }
    /// Adds a trailing argument to the end of this argument array.
    ///
    /// If the last argument in the array is already long, it will be replaced.
    pub fn add_long(&mut self, text: impl Into<String>) {
        let text = text.into();
        if self.1 {
            if let Some(last) = self.0.last_mut() {
                *last = text;
            }
        } else {
            self.0.push(text);
        }
        self.1 = true;
    }
    /// Returns true if there are no arguments.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    /// Returns the number of arguments.
    pub fn len(&self) -> usize {
        self.0.len()
    }
    /// Returns true if the last argument was sent as a trailing argument.
    pub fn is_last_long(&self) -> bool {
        self.1
    }
    /// Returns a slice of all of the arguments.
    pub fn all(&self) -> &[String] {
        self.0.as_slice()
    }
    /// Returns the argument at `idx` as a `&str`.
    pub fn get(&self, idx: usize) -> Option<&str> {
        self.0.get(idx).map(String::as_str)
    }
    /// Returns the arguments with the last argument split off.
    pub fn split_last(&self) -> (&[String], Option<&str>) {
        if let Some((last, rest)) = self.0.split_last() {
            (rest, Some(last.as_str()))
        } else {
            (Default::default(), None)
        }
    }
    /// Returns the last argument, which is usually the human-readable text.
    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }
}

impl std::fmt::Display for Args {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (words, last) = self.split_last();
        for word in words {
            write!(f, "{word} ")?;
        }
        if let Some(last) = last {
            let needs_colon =
                self.1 || last.is_empty() || last.starts_with(':') || last.contains(' ');
            if needs_colon {
                write!(f, ":")?;
            }
            write!(f, "{last}")?;
        }
        Ok(())
    }
}

impl<S: Into<String>> FromIterator<S> for Args {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        let mut args = Args::new();
        for word in iter {
            args.add(word);
        }
        args
    }
}
