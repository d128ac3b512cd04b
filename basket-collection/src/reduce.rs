//! Fragment Reducer
//! ---
//! Turns the raw pair tally of one fragment into pair-ordered count-fragments of at most
//! `row_limit` rows each.  Every pair of the tally lands in exactly one count-fragment;
//! counts from different fragments are only combined later by the merge sweep.

use std::collections::HashMap;
use std::hash::Hash;

use log::debug;

use crate::error::Result;
use crate::interfaces::{Accumulator, Output, ValueWriter};
use crate::pair::Pair;

/// Merges `right` into `left`, combining values of shared keys with `reduce`
pub fn merge_maps<K: Hash + Eq, V, R: Fn(&mut V, V)>(left: &mut HashMap<K, V>, right: HashMap<K, V>, reduce: R) {
    for (k, v) in right {
        if let Some(e) = left.get_mut(&k) {
            reduce(e, v);
        } else {
            left.insert(k, v);
        }
    }
}

/// Writes raw pair tallies out as bounded count-fragments
#[derive(Debug, Clone, Copy)]
pub struct Reducer {
    row_limit: usize
}

impl Reducer {

    /// Creates a reducer emitting at most `row_limit` pairs per count-fragment.  A limit
    /// of zero is treated as one.
    pub fn new(row_limit: usize) -> Self {
        Reducer { row_limit: row_limit.max(1) }
    }

    /// Row budget per count-fragment
    pub fn row_limit(&self) -> usize {
        self.row_limit
    }

    /// Sorts the tally by pair and writes it in chunks of `row_limit`, one writer per
    /// chunk.  An empty tally produces no count-fragments.
    /// ```rust
    ///   use std::collections::HashMap;
    ///   use basket_collection::pair::{Pair, PairCounts};
    ///   use basket_collection::reduce::Reducer;
    ///
    ///   let mut raw = HashMap::new();
    ///   raw.insert(Pair::new("A", "C").unwrap(), 1);
    ///   raw.insert(Pair::new("A", "B").unwrap(), 2);
    ///   raw.insert(Pair::new("B", "C").unwrap(), 1);
    ///
    ///   let chunks = Reducer::new(2).reduce(raw, &PairCounts::new()).unwrap();
    ///   assert_eq!(chunks.len(), 2);
    ///   assert_eq!(chunks[0].len(), 2);
    ///   assert_eq!(chunks[1].get(&Pair::new("B", "C").unwrap()), Some(1));
    /// ```
    pub fn reduce<Acc>(&self, raw: HashMap<Pair, u64>, acc: &Acc) -> Result<Vec<Output<Acc, (Pair, u64)>>>
        where Acc: Accumulator<(Pair, u64)> {

        let mut rows: Vec<(Pair, u64)> = raw.into_iter().collect();
        rows.sort_unstable_by(|a, b| a.0.cmp(&b.0));

        let n_rows = rows.len();
        let mut chunks = Vec::with_capacity((n_rows + self.row_limit - 1) / self.row_limit);
        let mut current: Option<Acc::VW> = None;
        let mut in_chunk = 0usize;

        for row in rows {
            if in_chunk == self.row_limit {
                if let Some(writer) = current.take() {
                    chunks.push(writer.finish()?);
                }
                in_chunk = 0;
            }
            if current.is_none() {
                current = Some(acc.writer(chunks.len())?);
            }
            if let Some(ref mut writer) = current {
                writer.add(row)?;
            }
            in_chunk += 1;
        }

        if let Some(writer) = current.take() {
            chunks.push(writer.finish()?);
        }

        debug!("Reduced {} pairs into {} count-fragments", n_rows, chunks.len());
        Ok(chunks)
    }

    /// Combines a stream of tallies for the same fragment before reducing them.
    pub fn reduce_stream<I, Acc>(&self, tallies: I, acc: &Acc) -> Result<Vec<Output<Acc, (Pair, u64)>>>
        where I: IntoIterator<Item=HashMap<Pair, u64>>,
              Acc: Accumulator<(Pair, u64)> {
        let mut merged = HashMap::new();
        for tally in tallies {
            merge_maps(&mut merged, tally, |x, y| *x += y);
        }
        self.reduce(merged, acc)
    }
}
