//! Pair Extractor
//! ---
//! Expands every basket of one fragment into its distinct unordered item pairs and tallies
//! them.  Baskets are found by adjacency: consecutive records sharing a basket key form
//! one basket.  A basket contributes at most one unit to each of its pairs, however many
//! times its items are repeated.

use std::collections::{BTreeSet, HashMap};

use log::{trace, warn};

use crate::error::Result;
use crate::pair::Pair;
use crate::record::Record;

/// Raw pair tally for one fragment
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Pair counts summed over the fragment's baskets
    pub counts: HashMap<Pair, u64>,

    /// Records read, malformed ones included
    pub records: usize,

    /// Baskets seen
    pub baskets: usize,

    /// Records skipped because a field was missing
    pub malformed: usize
}

/// Enumerates every 2-combination of a basket's distinct items, in canonical order.
/// ```rust
///   use std::collections::BTreeSet;
///   use basket_collection::extract::basket_pairs;
///   use basket_collection::pair::Pair;
///
///   let items: BTreeSet<String> = vec!["C", "A", "B"].into_iter().map(String::from).collect();
///   let pairs: Vec<Pair> = basket_pairs(&items).collect();
///   assert_eq!(pairs, vec![
///       Pair::new("A", "B").unwrap(),
///       Pair::new("A", "C").unwrap(),
///       Pair::new("B", "C").unwrap(),
///   ]);
/// ```
pub fn basket_pairs<'a>(items: &'a BTreeSet<String>) -> impl Iterator<Item=Pair> + 'a {
    items.iter().enumerate().flat_map(move |(i, a)| {
        items.iter().skip(i + 1).filter_map(move |b| Pair::new(a.as_str(), b.as_str()))
    })
}

fn tally(counts: &mut HashMap<Pair, u64>, items: &BTreeSet<String>) {
    for pair in basket_pairs(items) {
        *counts.entry(pair).or_insert(0) += 1;
    }
}

/// Tallies the pairs of every basket in `records`.  Malformed records are logged and
/// skipped without ending the basket they appear in; storage errors abort.
pub fn extract_pairs<I: IntoIterator<Item=Result<Record>>>(records: I) -> Result<Extraction> {
    let mut out = Extraction::default();
    let mut basket: Option<String> = None;
    let mut items = BTreeSet::new();

    for record in records {
        let record = record?;
        out.records += 1;

        if let Some(reason) = record.malformed() {
            warn!("Skipping malformed record {} ({}): {:?}", out.records, reason, record);
            out.malformed += 1;
            continue;
        }

        if basket.as_deref() != Some(record.basket.as_str()) {
            if basket.is_some() {
                tally(&mut out.counts, &items);
                items.clear();
            }
            trace!("Starting basket {}", record.basket);
            basket = Some(record.basket);
            out.baskets += 1;
        }
        items.insert(record.item);
    }

    if basket.is_some() {
        tally(&mut out.counts, &items);
    }

    Ok(out)
}

#[cfg(test)]
mod test_extract {
    use super::*;

    fn p(a: &str, b: &str) -> Pair {
        Pair::new(a, b).unwrap()
    }

    fn extract(spec: &[(&str, &str)]) -> Extraction {
        extract_pairs(spec.iter().map(|(b, i)| Ok(Record::new(*b, *i)))).unwrap()
    }

    #[test]
    fn test_two_baskets() {
        let out = extract(&[("1", "A"), ("1", "B"), ("1", "C"), ("2", "A"), ("2", "B")]);
        assert_eq!(out.baskets, 2);
        assert_eq!(out.records, 5);
        assert_eq!(out.counts.len(), 3);
        assert_eq!(out.counts[&p("A", "B")], 2);
        assert_eq!(out.counts[&p("A", "C")], 1);
        assert_eq!(out.counts[&p("B", "C")], 1);
    }

    #[test]
    fn test_repeated_items_count_once() {
        let out = extract(&[("1", "A"), ("1", "B"), ("1", "A"), ("1", "C"), ("1", "B"), ("1", "C")]);
        assert_eq!(out.baskets, 1);
        let mut pairs: Vec<_> = out.counts.into_iter().collect();
        pairs.sort();
        assert_eq!(pairs, vec![(p("A", "B"), 1), (p("A", "C"), 1), (p("B", "C"), 1)]);
    }

    #[test]
    fn test_single_item_basket() {
        let out = extract(&[("1", "A"), ("2", "B"), ("2", "B")]);
        assert_eq!(out.baskets, 2);
        assert!(out.counts.is_empty());
    }

    #[test]
    fn test_malformed_records_skipped() {
        let out = extract(&[("1", "A"), ("1", ""), ("", "Z"), ("1", "B"), ("2", "A"), ("2", "B")]);
        assert_eq!(out.malformed, 2);
        assert_eq!(out.records, 6);
        assert_eq!(out.baskets, 2);
        assert_eq!(out.counts[&p("A", "B")], 2);
        assert_eq!(out.counts.len(), 1);
    }

    #[test]
    fn test_empty_fragment() {
        let out = extract(&[]);
        assert_eq!(out.baskets, 0);
        assert!(out.counts.is_empty());
    }
}
