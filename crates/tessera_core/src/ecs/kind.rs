//! # Component Kinds
//!
//! A [`ComponentKind`] is the small integer a [`TypeRegistry`](super::TypeRegistry)
//! hands out for a component type. A [`KindSet`] is a growable bitset of kinds,
//! used both for an entity's component set and for each archetype clause.
//!
//! ## Performance
//!
//! - Membership test: O(1)
//! - Superset / intersection: O(words), 64 kinds per word
//! - Iteration: O(set bits) via `trailing_zeros`

use std::fmt;

/// Identifier of a component data shape, unique within one registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ComponentKind(u32);

impl ComponentKind {
    /// Creates a kind from its raw index.
    #[inline]
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }

    #[inline]
    const fn word(self) -> usize {
        (self.0 / 64) as usize
    }

    #[inline]
    const fn mask(self) -> u64 {
        1u64 << (self.0 % 64)
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bitset of component kinds.
///
/// The word vector never carries trailing zero words, so the derived
/// equality and hash are structural: two sets holding the same kinds
/// compare equal regardless of how they were built.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct KindSet {
    /// 1 = kind present. 64 kinds per u64.
    words: Vec<u64>,
}

impl KindSet {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self { words: Vec::new() }
    }

    /// Inserts a kind. Returns `true` if it was not already present.
    pub fn insert(&mut self, kind: ComponentKind) -> bool {
        let word = kind.word();
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        let was_absent = self.words[word] & kind.mask() == 0;
        self.words[word] |= kind.mask();
        was_absent
    }

    /// Removes a kind. Returns `true` if it was present.
    pub fn remove(&mut self, kind: ComponentKind) -> bool {
        let Some(bits) = self.words.get_mut(kind.word()) else {
            return false;
        };
        let was_present = *bits & kind.mask() != 0;
        *bits &= !kind.mask();
        self.trim();
        was_present
    }

    /// Checks if a kind is present.
    #[inline]
    #[must_use]
    pub fn contains(&self, kind: ComponentKind) -> bool {
        self.words
            .get(kind.word())
            .is_some_and(|bits| bits & kind.mask() != 0)
    }

    /// Returns `true` if every kind of `other` is also in `self`.
    #[inline]
    #[must_use]
    pub fn is_superset(&self, other: &Self) -> bool {
        other.words.iter().enumerate().all(|(i, &required)| {
            let have = self.words.get(i).copied().unwrap_or(0);
            have & required == required
        })
    }

    /// Returns `true` if the two sets share at least one kind.
    #[inline]
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .any(|(a, b)| a & b != 0)
    }

    /// Checks if empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Returns the number of kinds in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Iterates over the kinds in ascending order.
    #[must_use]
    pub fn iter(&self) -> KindIter<'_> {
        KindIter {
            words: &self.words,
            word_idx: 0,
            current_word: self.words.first().copied().unwrap_or(0),
        }
    }

    fn trim(&mut self) {
        while self.words.last() == Some(&0) {
            self.words.pop();
        }
    }
}

impl FromIterator<ComponentKind> for KindSet {
    fn from_iter<I: IntoIterator<Item = ComponentKind>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl Extend<ComponentKind> for KindSet {
    fn extend<I: IntoIterator<Item = ComponentKind>>(&mut self, iter: I) {
        for kind in iter {
            self.insert(kind);
        }
    }
}

impl fmt::Debug for KindSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<'a> IntoIterator for &'a KindSet {
    type Item = ComponentKind;
    type IntoIter = KindIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the kinds of a [`KindSet`], ascending.
pub struct KindIter<'a> {
    words: &'a [u64],
    word_idx: usize,
    current_word: u64,
}

impl Iterator for KindIter<'_> {
    type Item = ComponentKind;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current_word != 0 {
                let bit = self.current_word.trailing_zeros();
                // Clear lowest set bit
                self.current_word &= self.current_word - 1;
                #[allow(clippy::cast_possible_truncation)]
                return Some(ComponentKind::new(self.word_idx as u32 * 64 + bit));
            }

            self.word_idx += 1;
            if self.word_idx >= self.words.len() {
                return None;
            }
            self.current_word = self.words[self.word_idx];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(kinds: &[u32]) -> KindSet {
        kinds.iter().copied().map(ComponentKind::new).collect()
    }

    #[test]
    fn test_insert_remove_contains() {
        let mut s = KindSet::new();
        assert!(s.insert(ComponentKind::new(3)));
        assert!(!s.insert(ComponentKind::new(3)));
        assert!(s.insert(ComponentKind::new(130)));
        assert!(s.contains(ComponentKind::new(130)));
        assert!(!s.contains(ComponentKind::new(4)));
        assert_eq!(s.len(), 2);

        assert!(s.remove(ComponentKind::new(130)));
        assert!(!s.remove(ComponentKind::new(130)));
        assert_eq!(s, set(&[3]));
    }

    #[test]
    fn test_structural_equality_after_trim() {
        let mut grown = set(&[1, 200]);
        grown.remove(ComponentKind::new(200));
        assert_eq!(grown, set(&[1]));

        let mut emptied = set(&[70]);
        emptied.remove(ComponentKind::new(70));
        assert!(emptied.is_empty());
        assert_eq!(emptied, KindSet::new());
    }

    #[test]
    fn test_superset_and_intersects() {
        let entity = set(&[0, 1, 65]);
        assert!(entity.is_superset(&set(&[0, 65])));
        assert!(entity.is_superset(&KindSet::new()));
        assert!(!entity.is_superset(&set(&[0, 2])));
        assert!(!set(&[0]).is_superset(&set(&[0, 128])));

        assert!(entity.intersects(&set(&[65, 300])));
        assert!(!entity.intersects(&set(&[2, 64])));
        assert!(!entity.intersects(&KindSet::new()));
    }

    #[test]
    fn test_iter_ascending() {
        let s = set(&[129, 0, 64, 5]);
        let kinds: Vec<u32> = s.iter().map(ComponentKind::index).collect();
        assert_eq!(kinds, vec![0, 5, 64, 129]);
    }
}
