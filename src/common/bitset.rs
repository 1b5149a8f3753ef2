// Copyright 2025 Hyperjoin Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Relation index sets as value-type bitsets
//!
//! A [`NodeSet`] identifies a set of base relations by their bit positions in
//! the query's node universe. The single inline word covers queries of up to
//! 64 relations without allocating; wider universes spill to the heap.
//!
//! All operations return new values. Two sets compare equal iff they contain
//! the same indices, regardless of how they were built.

use std::fmt;
use std::hash::{Hash, Hasher};

use smallvec::SmallVec;

const WORD_BITS: usize = 64;

/// A set of node (relation) indices, represented as a bit vector.
///
/// Invariant: the word vector never ends in a zero word, so structural
/// equality and hashing coincide with set equality.
#[derive(Clone, Default)]
pub struct NodeSet {
    words: SmallVec<[u64; 1]>,
}

impl NodeSet {
    /// Create an empty set
    #[inline]
    pub fn empty() -> Self {
        Self {
            words: SmallVec::new(),
        }
    }

    /// Create a set containing a single index
    pub fn single(index: usize) -> Self {
        let mut set = Self::empty();
        set.set_bit(index);
        set
    }

    /// Create a set from an iterator of indices
    pub fn from_indices<I: IntoIterator<Item = usize>>(indices: I) -> Self {
        let mut set = Self::empty();
        for index in indices {
            set.set_bit(index);
        }
        set
    }

    /// Check whether the set contains an index
    pub fn contains(&self, index: usize) -> bool {
        let word = index / WORD_BITS;
        match self.words.get(word) {
            Some(w) => w & (1u64 << (index % WORD_BITS)) != 0,
            None => false,
        }
    }

    /// Return a new set with `index` added
    pub fn insert(&self, index: usize) -> Self {
        let mut set = self.clone();
        set.set_bit(index);
        set
    }

    /// Union of two sets
    pub fn union(&self, other: &Self) -> Self {
        let (longer, shorter) = if self.words.len() >= other.words.len() {
            (self, other)
        } else {
            (other, self)
        };
        let mut words = longer.words.clone();
        for (i, w) in shorter.words.iter().enumerate() {
            words[i] |= w;
        }
        // No normalization needed: the longer operand was already normalized
        Self { words }
    }

    /// Intersection of two sets
    pub fn intersection(&self, other: &Self) -> Self {
        let len = self.words.len().min(other.words.len());
        let mut words: SmallVec<[u64; 1]> = (0..len)
            .map(|i| self.words[i] & other.words[i])
            .collect();
        while words.last() == Some(&0) {
            words.pop();
        }
        Self { words }
    }

    /// Elements of `self` not present in `other`
    pub fn difference(&self, other: &Self) -> Self {
        let mut words = self.words.clone();
        for (i, w) in words.iter_mut().enumerate() {
            if let Some(o) = other.words.get(i) {
                *w &= !o;
            }
        }
        while words.last() == Some(&0) {
            words.pop();
        }
        Self { words }
    }

    /// True iff every index in `self` is also in `other`
    pub fn is_subset_of(&self, other: &Self) -> bool {
        if self.words.len() > other.words.len() {
            return false;
        }
        self.words
            .iter()
            .zip(other.words.iter())
            .all(|(a, b)| a & !b == 0)
    }

    /// True iff the sets share at least one index
    pub fn overlaps(&self, other: &Self) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .any(|(a, b)| a & b != 0)
    }

    /// Number of indices in the set (population count)
    pub fn cardinality(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// True iff the set contains no indices
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Lowest set index, if any
    pub fn lowest(&self) -> Option<usize> {
        for (i, w) in self.words.iter().enumerate() {
            if *w != 0 {
                return Some(i * WORD_BITS + w.trailing_zeros() as usize);
            }
        }
        None
    }

    /// Iterate over set indices in ascending order
    pub fn iter(&self) -> NodeSetIter<'_> {
        NodeSetIter {
            words: &self.words,
            word_index: 0,
            current: self.words.first().copied().unwrap_or(0),
        }
    }

    fn set_bit(&mut self, index: usize) {
        let word = index / WORD_BITS;
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1u64 << (index % WORD_BITS);
    }
}

impl PartialEq for NodeSet {
    fn eq(&self, other: &Self) -> bool {
        self.words == other.words
    }
}

impl Eq for NodeSet {}

impl Hash for NodeSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.words.hash(state);
    }
}

impl PartialOrd for NodeSet {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NodeSet {
    /// Total order used only for deterministic tie-breaking: compares the
    /// sets as unsigned big-endian integers.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.words
            .len()
            .cmp(&other.words.len())
            .then_with(|| self.words.iter().rev().cmp(other.words.iter().rev()))
    }
}

impl fmt::Debug for NodeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, index) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", index)?;
        }
        write!(f, "}}")
    }
}

impl FromIterator<usize> for NodeSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self::from_indices(iter)
    }
}

/// Ascending iterator over the indices of a [`NodeSet`]
pub struct NodeSetIter<'a> {
    words: &'a [u64],
    word_index: usize,
    current: u64,
}

impl Iterator for NodeSetIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        while self.current == 0 {
            self.word_index += 1;
            if self.word_index >= self.words.len() {
                return None;
            }
            self.current = self.words[self.word_index];
        }
        let bit = self.current.trailing_zeros() as usize;
        self.current &= self.current - 1;
        Some(self.word_index * WORD_BITS + bit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_set() {
        let set = NodeSet::empty();
        assert!(set.is_empty());
        assert_eq!(set.cardinality(), 0);
        assert_eq!(set.lowest(), None);
        assert!(!set.contains(0));
    }

    #[test]
    fn test_single_and_contains() {
        let set = NodeSet::single(5);
        assert!(set.contains(5));
        assert!(!set.contains(4));
        assert_eq!(set.cardinality(), 1);
        assert_eq!(set.lowest(), Some(5));
    }

    #[test]
    fn test_union_and_intersection() {
        let a = NodeSet::from_indices([0, 2, 4]);
        let b = NodeSet::from_indices([2, 3]);

        let u = a.union(&b);
        assert_eq!(u, NodeSet::from_indices([0, 2, 3, 4]));

        let i = a.intersection(&b);
        assert_eq!(i, NodeSet::single(2));
    }

    #[test]
    fn test_difference() {
        let a = NodeSet::from_indices([0, 1, 2]);
        let b = NodeSet::from_indices([1]);
        assert_eq!(a.difference(&b), NodeSet::from_indices([0, 2]));
        assert_eq!(b.difference(&a), NodeSet::empty());
    }

    #[test]
    fn test_subset_antisymmetry() {
        // is_subset_of(a, b) && is_subset_of(b, a) <=> a == b
        let sets = [
            NodeSet::empty(),
            NodeSet::single(0),
            NodeSet::from_indices([0, 1]),
            NodeSet::from_indices([1, 2]),
            NodeSet::from_indices([0, 1, 2]),
            NodeSet::from_indices([0, 70]),
        ];
        for a in &sets {
            for b in &sets {
                let both = a.is_subset_of(b) && b.is_subset_of(a);
                assert_eq!(both, a == b, "antisymmetry failed for {:?} / {:?}", a, b);
            }
        }
    }

    #[test]
    fn test_overlaps() {
        let a = NodeSet::from_indices([0, 1]);
        let b = NodeSet::from_indices([1, 2]);
        let c = NodeSet::from_indices([3]);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert!(!a.overlaps(&NodeSet::empty()));
    }

    #[test]
    fn test_iter_ascending() {
        let set = NodeSet::from_indices([7, 0, 63, 3]);
        let indices: Vec<usize> = set.iter().collect();
        assert_eq!(indices, vec![0, 3, 7, 63]);
    }

    #[test]
    fn test_wide_universe() {
        // Indices past the inline word must behave identically
        let set = NodeSet::from_indices([1, 64, 130]);
        assert_eq!(set.cardinality(), 3);
        assert!(set.contains(64));
        assert!(set.contains(130));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![1, 64, 130]);

        let narrow = NodeSet::single(1);
        assert!(narrow.is_subset_of(&set));
        assert!(!set.is_subset_of(&narrow));
    }

    #[test]
    fn test_normalization_equality() {
        // A set that grew wide and lost its high bits again must equal the
        // narrow representation of the same indices.
        let wide = NodeSet::from_indices([1, 100]);
        let shrunk = wide.difference(&NodeSet::single(100));
        let narrow = NodeSet::single(1);
        assert_eq!(shrunk, narrow);

        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};
        let mut h1 = DefaultHasher::new();
        let mut h2 = DefaultHasher::new();
        shrunk.hash(&mut h1);
        narrow.hash(&mut h2);
        assert_eq!(h1.finish(), h2.finish());
    }

    #[test]
    fn test_insert_is_non_destructive() {
        let a = NodeSet::single(1);
        let b = a.insert(2);
        assert_eq!(a.cardinality(), 1);
        assert_eq!(b.cardinality(), 2);
    }
}
