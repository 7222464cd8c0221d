use std::{fmt::Write, iter::FusedIterator};

/// A single mode letter.
///
/// This is a newtype around an ASCII alphabetic character.
/// It orders alphabetically first and by capitalization second, so `a < A < b`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
#[cfg_attr(feature = "serde", derive(serde_derive::Serialize, serde_derive::Deserialize))]
pub struct Mode(u8);

impl Mode {
    /// Creates a new `Mode` from the given ASCII letter.
    pub const fn new(letter: u8) -> Option<Mode> {
        if letter.is_ascii_alphabetic() {
            Some(Mode(letter))
        } else {
            None
        }
    }
    /// Creates a new `Mode` from a `char`.
    pub fn from_char(letter: char) -> Option<Mode> {
        u8::try_from(letter).ok().and_then(Mode::new)
    }
    /// Converts `self` into a `char`.
    pub const fn into_char(self) -> char {
        self.0 as char
    }
    /// Bit position in a [`ModeSet`]. Lowercase letters take even slots.
    const fn index(self) -> u32 {
        let letter = (self.0.to_ascii_lowercase() - b'a') as u32;
        let upper = self.0.is_ascii_uppercase() as u32;
        (letter << 1) | upper
    }
    const fn from_index(index: u32) -> Mode {
        let letter = b'a' + (index >> 1) as u8;
        if index & 1 == 1 {
            Mode(letter.to_ascii_uppercase())
        } else {
            Mode(letter)
        }
    }
    const fn mask(self) -> u64 {
        1u64 << self.index()
    }
}

impl std::cmp::PartialOrd for Mode {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl std::cmp::Ord for Mode {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.index().cmp(&other.index())
    }
}

impl std::fmt::Debug for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.into_char().fmt(f)
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_char(self.into_char())
    }
}

impl From<Mode> for char {
    fn from(value: Mode) -> Self {
        value.into_char()
    }
}

/// A set of mode letters.
///
/// Setting a mode that is already set is a no-op, which is what makes
/// applying the same MODE change twice harmless.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde_derive::Serialize, serde_derive::Deserialize))]
pub struct ModeSet(u64);

impl ModeSet {
    /// Creates a new, empty `ModeSet`.
    pub const fn new() -> ModeSet {
        ModeSet(0)
    }
    /// Returns a version of `self` with the provided mode set.
    pub const fn with(self, mode: Mode) -> ModeSet {
        ModeSet(self.0 | mode.mask())
    }
    /// Sets a mode.
    ///
    /// Returns `true` if there was a change.
    #[inline]
    pub fn set(&mut self, mode: Mode) -> bool {
        let old = self.0;
        self.0 |= mode.mask();
        old != self.0
    }
    /// Unsets a mode.
    ///
    /// Returns `true` if there was a change.
    #[inline]
    pub fn unset(&mut self, mode: Mode) -> bool {
        let old = self.0;
        self.0 &= !mode.mask();
        old != self.0
    }
    /// Sets or unsets a mode depending on `on`.
    pub fn toggle(&mut self, mode: Mode, on: bool) -> bool {
        if on {
            self.set(mode)
        } else {
            self.unset(mode)
        }
    }
    /// Tests if a mode is set.
    pub const fn contains(&self, mode: Mode) -> bool {
        (self.0 & mode.mask()) != 0
    }
    /// Returns true if this set is empty.
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }
    /// Returns the number of modes in this set.
    pub const fn len(&self) -> usize {
        self.0.count_ones() as usize
    }
    /// Returns an iterator over the modes in this set in ascending order.
    pub fn iter(&self) -> ModeSetIter {
        ModeSetIter(self.0)
    }
}

impl IntoIterator for ModeSet {
    type Item = Mode;

    type IntoIter = ModeSetIter;

    fn into_iter(self) -> Self::IntoIter {
        ModeSetIter(self.0)
    }
}

impl IntoIterator for &ModeSet {
    type Item = Mode;

    type IntoIter = ModeSetIter;

    fn into_iter(self) -> Self::IntoIter {
        ModeSetIter(self.0)
    }
}

impl FromIterator<Mode> for ModeSet {
    fn from_iter<T: IntoIterator<Item = Mode>>(iter: T) -> Self {
        let mut ms = ModeSet::new();
        for mode in iter {
            ms.set(mode);
        }
        ms
    }
}

impl std::fmt::Debug for ModeSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self).finish()
    }
}

impl std::fmt::Display for ModeSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for mode in self {
            f.write_char(mode.into_char())?;
        }
        Ok(())
    }
}

/// Iterator over [`ModeSet`]s.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct ModeSetIter(u64);

impl Iterator for ModeSetIter {
    type Item = Mode;

    fn next(&mut self) -> Option<Self::Item> {
        if self.0 == 0 {
            return None;
        }
        let mode = Mode::from_index(self.0.trailing_zeros());
        self.0 &= !mode.mask();
        Some(mode)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let retval = self.0.count_ones() as usize;
        (retval, Some(retval))
    }
}

impl DoubleEndedIterator for ModeSetIter {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.0 == 0 {
            return None;
        }
        let mode = Mode::from_index(63 - self.0.leading_zeros());
        self.0 &= !mode.mask();
        Some(mode)
    }
}

impl FusedIterator for ModeSetIter {}
impl ExactSizeIterator for ModeSetIter {}
