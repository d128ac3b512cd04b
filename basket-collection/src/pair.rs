//! Pairs and per-fragment pair counts.
//!
//! A `Pair` is stored in canonical order: the lexicographically smaller item always comes
//! first, so `(A, B)` and `(B, A)` are the same key.  `PairCounts` keeps its entries
//! ordered by pair which lets two count tables be intersected with a single merge walk.

use std::cmp::Ordering;
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;
use std::iter::FromIterator;

use serde_derive::{Deserialize, Serialize};

/// Unordered combination of two distinct items
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Pair(String, String);

impl Pair {

    /// Creates a pair in canonical order.  Returns None when both items are equal.
    /// ```rust
    ///   use basket_collection::pair::Pair;
    ///
    ///   let ab = Pair::new("b", "a").unwrap();
    ///   assert_eq!(ab, Pair::new("a", "b").unwrap());
    ///   assert_eq!(ab.first(), "a");
    ///   assert!(Pair::new("a", "a").is_none());
    /// ```
    pub fn new<A: Into<String>, B: Into<String>>(x: A, y: B) -> Option<Pair> {
        let (x, y) = (x.into(), y.into());
        match x.cmp(&y) {
            Ordering::Less    => Some(Pair(x, y)),
            Ordering::Greater => Some(Pair(y, x)),
            Ordering::Equal   => None
        }
    }

    /// Smaller of the two items
    pub fn first(&self) -> &str {
        &self.0
    }

    /// Larger of the two items
    pub fn second(&self) -> &str {
        &self.1
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {})", self.0, self.1)
    }
}

/// Key-ordered mapping from pair to count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairCounts {
    counts: BTreeMap<Pair, u64>
}

impl PairCounts {

    /// Creates an empty table
    pub fn new() -> Self {
        PairCounts { counts: BTreeMap::new() }
    }

    /// Number of distinct pairs
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// True if no pairs are held
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Count for a pair, if present
    pub fn get(&self, pair: &Pair) -> Option<u64> {
        self.counts.get(pair).cloned()
    }

    /// Adds `count` to the pair, inserting it when missing
    pub fn add(&mut self, pair: Pair, count: u64) {
        *self.counts.entry(pair).or_insert(0) += count;
    }

    /// Sum of all counts
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Iterates entries in pair order
    pub fn iter(&self) -> btree_map::Iter<Pair, u64> {
        self.counts.iter()
    }

    /// Removes every entry whose pair is also held by `primary`, returning the removed
    /// entries.  Both tables are walked once, in order.
    /// ```rust
    ///   use basket_collection::pair::{Pair, PairCounts};
    ///
    ///   let p = |a: &str, b: &str| Pair::new(a, b).unwrap();
    ///   let primary: PairCounts = vec![(p("a", "b"), 1), (p("a", "c"), 1)].into_iter().collect();
    ///   let mut secondary: PairCounts = vec![(p("a", "b"), 4), (p("c", "d"), 2)].into_iter().collect();
    ///
    ///   let matched = secondary.take_matching(&primary);
    ///   assert_eq!(matched.get(&p("a", "b")), Some(4));
    ///   assert_eq!(secondary.len(), 1);
    ///   assert_eq!(secondary.get(&p("c", "d")), Some(2));
    /// ```
    pub fn take_matching(&mut self, primary: &PairCounts) -> PairCounts {
        let mut keys = Vec::new();
        {
            let mut mine = self.counts.keys();
            let mut theirs = primary.counts.keys();
            let (mut a, mut b) = (mine.next(), theirs.next());
            while let (Some(x), Some(y)) = (a, b) {
                match x.cmp(y) {
                    Ordering::Less    => a = mine.next(),
                    Ordering::Greater => b = theirs.next(),
                    Ordering::Equal   => {
                        keys.push(x.clone());
                        a = mine.next();
                        b = theirs.next();
                    }
                }
            }
        }

        let mut matched = PairCounts::new();
        for k in keys {
            if let Some((pair, count)) = self.counts.remove_entry(&k) {
                matched.counts.insert(pair, count);
            }
        }
        matched
    }

    /// Folds the counts of another table into this one, returning how many pairs were
    /// folded.
    pub fn absorb(&mut self, other: PairCounts) -> usize {
        let n = other.len();
        for (pair, count) in other.counts {
            self.add(pair, count);
        }
        n
    }
}

impl FromIterator<(Pair, u64)> for PairCounts {
    fn from_iter<I: IntoIterator<Item=(Pair, u64)>>(iter: I) -> Self {
        let mut pc = PairCounts::new();
        pc.extend(iter);
        pc
    }
}

impl Extend<(Pair, u64)> for PairCounts {
    fn extend<I: IntoIterator<Item=(Pair, u64)>>(&mut self, iter: I) {
        for (pair, count) in iter {
            self.add(pair, count);
        }
    }
}

impl IntoIterator for PairCounts {
    type Item = (Pair, u64);
    type IntoIter = btree_map::IntoIter<Pair, u64>;

    fn into_iter(self) -> Self::IntoIter {
        self.counts.into_iter()
    }
}

impl <'a> IntoIterator for &'a PairCounts {
    type Item = (&'a Pair, &'a u64);
    type IntoIter = btree_map::Iter<'a, Pair, u64>;

    fn into_iter(self) -> Self::IntoIter {
        self.counts.iter()
    }
}
