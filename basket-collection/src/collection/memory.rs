//! In-Memory Storage
//! ---
//! Holds everything in memory.  Used as a report sink when the caller wants the result
//! back as a table, and as the naive single-pass reference aggregation which the
//! external pipeline must agree with.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::error::{Error, Result};
use crate::interfaces::ReportSink;
use crate::pair::{Pair, PairCounts};
use crate::record::Record;

/// Report sink keeping every appended row in memory.  Appending a pair a second time is
/// rejected.
#[derive(Debug, Clone, Default)]
pub struct MemoryReport {
    rows: Vec<(Pair, u64)>,
    seen: HashSet<Pair>,
    batches: usize
}

impl MemoryReport {

    /// Creates an empty report
    pub fn new() -> Self {
        MemoryReport::default()
    }

    /// Rows in append order
    pub fn rows(&self) -> &[(Pair, u64)] {
        &self.rows
    }

    /// Number of batches appended so far
    pub fn batches(&self) -> usize {
        self.batches
    }

    /// Sum of all counts
    pub fn total(&self) -> u64 {
        self.rows.iter().map(|r| r.1).sum()
    }

    /// Converts the report into a pair-ordered table
    pub fn to_counts(&self) -> PairCounts {
        self.rows.iter().cloned().collect()
    }
}

impl ReportSink for MemoryReport {
    fn append(&mut self, batch: &PairCounts) -> Result<()> {
        for (pair, count) in batch {
            if !self.seen.insert(pair.clone()) {
                return Err(Error::DuplicatePair(pair.clone()));
            }
            self.rows.push((pair.clone(), *count));
        }
        self.batches += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Naive aggregation holding every basket in memory at once.  Records are grouped by
/// basket key over the whole input, so for well formed (contiguous) input it agrees with
/// the fragment pipeline.  Malformed records are ignored.
/// ```rust
///   use basket_collection::collection::memory::reference_counts;
///   use basket_collection::pair::Pair;
///   use basket_collection::record::Record;
///
///   let records = vec![
///       Record::new("1", "A"), Record::new("1", "B"), Record::new("1", "C"),
///       Record::new("2", "A"), Record::new("2", "B"),
///   ];
///   let counts = reference_counts(records);
///   assert_eq!(counts.get(&Pair::new("A", "B").unwrap()), Some(2));
///   assert_eq!(counts.get(&Pair::new("B", "C").unwrap()), Some(1));
///   assert_eq!(counts.total(), 4);
/// ```
pub fn reference_counts<I: IntoIterator<Item=Record>>(records: I) -> PairCounts {
    let mut baskets: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for r in records {
        if r.malformed().is_none() {
            baskets.entry(r.basket).or_insert_with(BTreeSet::new).insert(r.item);
        }
    }

    let mut counts = PairCounts::new();
    for items in baskets.values() {
        let items: Vec<_> = items.iter().collect();
        for (i, a) in items.iter().enumerate() {
            for b in items[i + 1..].iter() {
                if let Some(p) = Pair::new(a.as_str(), b.as_str()) {
                    counts.add(p, 1);
                }
            }
        }
    }
    counts
}
