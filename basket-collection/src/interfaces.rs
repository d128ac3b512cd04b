use std::vec;

use crate::error::Result;
use crate::pair::{Pair, PairCounts};

/// Creates fresh writers for numbered outputs.
pub trait Accumulator<A> {
    /// Writer produced for each output
    type VW: ValueWriter<A>;

    /// Opens the writer for the output numbered `ordinal`
    fn writer(&self, ordinal: usize) -> Result<Self::VW>;
}

/// Consumes values one at a time, producing a finished output.
pub trait ValueWriter<A> {
    /// Finished output
    type Out;

    /// Appends a value
    fn add(&mut self, item: A) -> Result<()>;

    /// Closes the writer
    fn finish(self) -> Result<Self::Out>;
}

/// Output type produced by an accumulator's writers
pub type Output<Acc, A> = <<Acc as Accumulator<A>>::VW as ValueWriter<A>>::Out;

/// Sequentially readable sequence of values.
pub trait Stream<A> {
    /// Iterator over the values
    type Iter: Iterator<Item=Result<A>>;

    /// Opens the sequence for reading from the start
    fn stream(&self) -> Result<Self::Iter>;

    /// Number of values held
    fn count(&self) -> usize;
}

/// Exclusive, rewritable storage for one count-fragment.
pub trait CountStore: Send {
    /// True when the fragment holds no pairs
    fn is_empty(&self) -> bool;

    /// Reads the whole fragment
    fn load(&self) -> Result<PairCounts>;

    /// Replaces the fragment's content
    fn store(&mut self, counts: &PairCounts) -> Result<()>;

    /// Releases the fragment
    fn discard(self) -> Result<()>;
}

/// Append-only destination for finalized pair counts.
pub trait ReportSink {
    /// Appends one finalized batch.  Failure aborts the run.
    fn append(&mut self, batch: &PairCounts) -> Result<()>;

    /// Makes every appended batch durable
    fn finish(&mut self) -> Result<()>;
}

/// Accumulates values into in-memory vectors
#[derive(Debug, Clone, Copy, Default)]
pub struct Memory;

impl <A> Accumulator<A> for Memory {
    type VW = Vec<A>;

    fn writer(&self, _ordinal: usize) -> Result<Self::VW> {
        Ok(Vec::new())
    }
}

impl <A> ValueWriter<A> for Vec<A> {
    type Out = Vec<A>;

    fn add(&mut self, item: A) -> Result<()> {
        self.push(item);
        Ok(())
    }

    fn finish(mut self) -> Result<Self::Out> {
        self.shrink_to_fit();
        Ok(self)
    }
}

impl <A: Clone> Stream<A> for Vec<A> {
    type Iter = vec::IntoIter<Result<A>>;

    fn stream(&self) -> Result<Self::Iter> {
        let vs: Vec<_> = self.iter().cloned().map(Ok).collect();
        Ok(vs.into_iter())
    }

    fn count(&self) -> usize {
        self.len()
    }
}

impl Accumulator<(Pair, u64)> for PairCounts {
    type VW = PairCounts;

    fn writer(&self, _ordinal: usize) -> Result<Self::VW> {
        Ok(PairCounts::new())
    }
}

impl ValueWriter<(Pair, u64)> for PairCounts {
    type Out = PairCounts;

    fn add(&mut self, item: (Pair, u64)) -> Result<()> {
        PairCounts::add(self, item.0, item.1);
        Ok(())
    }

    fn finish(self) -> Result<Self::Out> {
        Ok(self)
    }
}

impl CountStore for PairCounts {
    fn is_empty(&self) -> bool {
        PairCounts::is_empty(self)
    }

    fn load(&self) -> Result<PairCounts> {
        Ok(self.clone())
    }

    fn store(&mut self, counts: &PairCounts) -> Result<()> {
        *self = counts.clone();
        Ok(())
    }

    fn discard(self) -> Result<()> {
        Ok(())
    }
}
