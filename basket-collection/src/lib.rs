//! Basket-Collection
//! ---
//! Basket-Collection counts how often pairs of items occur together across a very large
//! collection of baskets, using a bounded amount of memory however large the input is.
//!
//! What is it?
//! ---
//! A basket is a run of consecutive `(basket_key, item)` records sharing one key.  Every
//! basket contributes one count to each distinct unordered pair of its items.  The result
//! is a single report holding each pair once along with its total count.
//!
//! The input is never loaded whole.  Instead:
//!
//! 1. The `split` module cuts the input into fragments of roughly `line_limit` records,
//!    never splitting a basket.
//! 2. The `extract` module tallies the pairs of one fragment at a time.
//! 3. The `reduce` module writes each tally out as pair-ordered count-fragments of at most
//!    `row_limit` rows.
//! 4. The `sweep` module folds count-fragments into each other pairwise, appending each
//!    fully consolidated fragment to the report.
//!
//! Stages 2 and 3 run fragment-parallel on a `basket_core` scheduler.
//!
//! Example - Two baskets
//! ---
//!
//! ```rust
//! use basket_collection::collection::memory::MemoryReport;
//! use basket_collection::config::PipelineConfig;
//! use basket_collection::pair::Pair;
//! use basket_collection::pipeline::Pipeline;
//! use basket_collection::record::Record;
//! use basket_core::scheduler::SerialScheduler;
//!
//! let records = vec![
//!     Record::new("1", "A"), Record::new("1", "B"), Record::new("1", "C"),
//!     Record::new("2", "A"), Record::new("2", "B"),
//! ];
//! let config = PipelineConfig { line_limit: 2, ..PipelineConfig::default() };
//! let mut report = MemoryReport::new();
//! let summary = Pipeline::new(config).unwrap()
//!     .run_with(records.into_iter().map(Ok), &mut report, &SerialScheduler)
//!     .unwrap();
//!
//! assert_eq!(summary.fragments, 2);
//! let counts = report.to_counts();
//! assert_eq!(counts.get(&Pair::new("A", "B").unwrap()), Some(2));
//! assert_eq!(counts.get(&Pair::new("A", "C").unwrap()), Some(1));
//! assert_eq!(counts.get(&Pair::new("B", "C").unwrap()), Some(1));
//! ```

#![warn(missing_docs)]

/// Error type shared by every stage
pub mod error;

/// Input records
pub mod record;

/// Pairs and pair count tables
pub mod pair;

/// Describes the storage and sink interfaces every stage is written against
pub mod interfaces;

/// Defines the two storage backends: memory and scratch disk
pub mod collection;

/// Defines useful utilities, such as reading input files
pub mod utils;

/// Splits the record stream into basket-aligned fragments
pub mod split;

/// Expands baskets into pair counts
pub mod extract;

/// Sorts pair counts into row-bounded count-fragments
pub mod reduce;

/// Merges count-fragments into the report, deduplicating pairs
pub mod sweep;

/// CSV report writer
pub mod report;

/// Run configuration
pub mod config;

/// Runs the stages end to end
pub mod pipeline;

pub use error::{Error, Result};
pub use pair::{Pair, PairCounts};
pub use pipeline::{Pipeline, RunSummary};
pub use config::PipelineConfig;
pub use record::Record;
