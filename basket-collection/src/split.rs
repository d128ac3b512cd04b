//! Fragment Splitter
//! ---
//! Cuts one basket-grouped record stream into bounded fragments.  A fragment is closed
//! at the first basket boundary after it reaches `line_limit` records, so no basket is
//! ever divided between two fragments.  The limit is a soft ceiling: a fragment may run
//! over to finish its last basket, and a single oversized basket still yields a single
//! fragment.  Records without a basket key never start a basket; they stay in the
//! fragment being written.

use log::debug;

use crate::error::Result;
use crate::interfaces::{Accumulator, Output, ValueWriter};
use crate::record::{Malformed, Record};

/// Fragments produced by a split, in creation order
#[derive(Debug)]
pub struct Split<F> {
    /// Finished fragments
    pub fragments: Vec<F>,

    /// Records read from the input
    pub records: usize
}

/// Splits record streams into basket-aligned fragments
#[derive(Debug, Clone, Copy)]
pub struct Splitter {
    line_limit: usize
}

impl Splitter {

    /// Creates a splitter targeting `line_limit` records per fragment.  A limit of zero
    /// is treated as one.
    pub fn new(line_limit: usize) -> Self {
        Splitter { line_limit: line_limit.max(1) }
    }

    /// Record budget per fragment
    pub fn line_limit(&self) -> usize {
        self.line_limit
    }

    /// Splits `records` into fragments, opening one writer per fragment from `acc`.
    /// Writer ordinals start at zero and follow creation order.
    /// ```rust
    ///   use basket_collection::interfaces::Memory;
    ///   use basket_collection::record::Record;
    ///   use basket_collection::split::Splitter;
    ///
    ///   let records = vec![
    ///       Record::new("1", "A"), Record::new("1", "B"), Record::new("1", "C"),
    ///       Record::new("2", "A"), Record::new("2", "B"),
    ///   ];
    ///   let split = Splitter::new(2).split(records.into_iter().map(Ok), &Memory).unwrap();
    ///   assert_eq!(split.fragments.len(), 2);
    ///   assert_eq!(split.fragments[0].len(), 3);
    ///   assert_eq!(split.records, 5);
    /// ```
    pub fn split<I, Acc>(&self, records: I, acc: &Acc) -> Result<Split<Output<Acc, Record>>>
        where I: IntoIterator<Item=Result<Record>>,
              Acc: Accumulator<Record> {

        let mut fragments = Vec::new();
        let mut current: Option<(Acc::VW, usize)> = None;
        let mut last_basket: Option<String> = None;
        let mut total = 0usize;

        for record in records {
            let record = record?;
            total += 1;

            let keyless = record.malformed() == Some(Malformed::MissingBasket);

            // Only cut once the budget is reached and the basket changes
            let cut = match current {
                Some((_, n)) if !keyless => {
                    n >= self.line_limit && last_basket.as_deref() != Some(record.basket.as_str())
                },
                _ => false
            };

            if cut {
                if let Some((writer, n)) = current.take() {
                    debug!("Closing fragment {} with {} records", fragments.len(), n);
                    fragments.push(writer.finish()?);
                }
            }

            if !keyless && last_basket.as_deref() != Some(record.basket.as_str()) {
                last_basket = Some(record.basket.clone());
            }

            if current.is_none() {
                current = Some((acc.writer(fragments.len())?, 0));
            }
            if let Some((ref mut writer, ref mut n)) = current {
                writer.add(record)?;
                *n += 1;
            }
        }

        if let Some((writer, n)) = current.take() {
            debug!("Closing fragment {} with {} records", fragments.len(), n);
            fragments.push(writer.finish()?);
        }

        debug!("Split {} records into {} fragments", total, fragments.len());
        Ok(Split { fragments: fragments, records: total })
    }
}
