//! Merge-Dedup Sweep
//! ---
//! Consolidates per-fragment pair counts into one report without ever holding more than
//! the current primary and the secondaries being compared against it.
//!
//! The sweep is a state machine over the ordered queue of remaining count-fragments:
//!
//! 1. `SelectPrimary` - pop the next fragment.  Empty fragments were fully absorbed by an
//!    earlier primary and are discarded.  If nothing is left the sweep is `Done`.
//! 2. `Compare` - every remaining fragment is a secondary.  Pairs found in both the
//!    primary and a secondary are removed from the secondary and their counts are added
//!    to the primary.
//! 3. `Finalize` - the primary is appended to the report and discarded.
//!
//! A pair leaves every secondary the moment it is folded into a primary, so it can never
//! reach the report twice.  Each fragment is guarded by its own lock; comparisons for one
//! primary touch disjoint secondaries and may run concurrently.  Secondaries are compared
//! in batches no wider than the scheduler's concurrency, and each batch is folded into the
//! primary before the next starts.

use std::collections::VecDeque;
use std::sync::Mutex;

use basket_core::scheduler::Scheduler;
use log::{debug, trace};

use crate::error::{Error, Result};
use crate::interfaces::{CountStore, ReportSink};
use crate::pair::PairCounts;

/// States of the sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepState {
    /// Choosing the next primary
    SelectPrimary,

    /// Folding secondaries into the primary
    Compare,

    /// Appending the primary to the report
    Finalize,

    /// All fragments consumed
    Done
}

/// Counters describing a finished sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Fragments which served as primary
    pub rounds: usize,

    /// Fragments skipped because they were empty when their turn came
    pub skipped: usize,

    /// Primary/secondary comparisons performed
    pub comparisons: usize,

    /// Pairs moved from a secondary into a primary
    pub folded: usize,

    /// Rows appended to the report
    pub rows: usize,

    /// Sum of all counts appended to the report
    pub total: u64
}

struct Primary<C> {
    slot: usize,
    store: C,
    counts: PairCounts
}

/// Sweep over an arena of count-fragments
pub struct Sweep<'s, C: CountStore, S: Scheduler> {
    arena: Vec<Mutex<Option<C>>>,
    queue: VecDeque<usize>,
    primary: Option<Primary<C>>,
    state: SweepState,
    scheduler: &'s S,
    stats: SweepStats
}

fn lock_err(slot: usize) -> Error {
    Error::Poisoned(slot)
}

// Folds the primary's pairs out of one secondary, returning the removed entries
fn compare<C: CountStore>(arena: &[Mutex<Option<C>>], slot: usize, primary: &PairCounts) -> Result<PairCounts> {
    let mut guard = arena[slot].lock().map_err(|_| lock_err(slot))?;
    let store = match guard.as_mut() {
        Some(store) if !store.is_empty() => store,
        _ => return Ok(PairCounts::new())
    };

    let mut secondary = store.load()?;
    let matched = secondary.take_matching(primary);
    if !matched.is_empty() {
        trace!("Fragment {}: {} pairs folded, {} remain", slot, matched.len(), secondary.len());
        store.store(&secondary)?;
    }
    Ok(matched)
}

impl <'s, C: CountStore, S: Scheduler> Sweep<'s, C, S> {

    /// Creates a sweep over `fragments`, in the order given.
    pub fn new(fragments: Vec<C>, scheduler: &'s S) -> Self {
        let queue = (0..fragments.len()).collect();
        let arena = fragments.into_iter().map(|f| Mutex::new(Some(f))).collect();
        Sweep {
            arena: arena,
            queue: queue,
            primary: None,
            state: SweepState::SelectPrimary,
            scheduler: scheduler,
            stats: SweepStats::default()
        }
    }

    /// Current state
    pub fn state(&self) -> SweepState {
        self.state
    }

    /// Fragments still waiting for their turn as primary
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    /// Arena slot of the current primary
    pub fn primary_slot(&self) -> Option<usize> {
        self.primary.as_ref().map(|p| p.slot)
    }

    /// Counters so far
    pub fn stats(&self) -> &SweepStats {
        &self.stats
    }

    fn take(&self, slot: usize) -> Result<Option<C>> {
        let mut guard = self.arena[slot].lock().map_err(|_| lock_err(slot))?;
        Ok(guard.take())
    }

    /// Performs one transition, returning the new state.
    pub fn step<R: ReportSink>(&mut self, report: &mut R) -> Result<SweepState> {
        self.state = match self.state {
            SweepState::SelectPrimary => self.select_primary()?,
            SweepState::Compare       => self.compare_secondaries()?,
            SweepState::Finalize      => self.finalize(report)?,
            SweepState::Done          => SweepState::Done
        };
        Ok(self.state)
    }

    /// Runs the sweep to completion
    pub fn run<R: ReportSink>(mut self, report: &mut R) -> Result<SweepStats> {
        debug!("Sweeping {} count-fragments", self.queue.len());
        while self.step(report)? != SweepState::Done {}
        debug!("Sweep finished: {:?}", self.stats);
        Ok(self.stats)
    }

    fn select_primary(&mut self) -> Result<SweepState> {
        while let Some(slot) = self.queue.pop_front() {
            let store = match self.take(slot)? {
                Some(store) => store,
                None => continue
            };

            if store.is_empty() {
                trace!("Fragment {} already absorbed, skipping", slot);
                self.stats.skipped += 1;
                store.discard()?;
                continue;
            }

            let counts = store.load()?;
            debug!("Fragment {} is primary with {} pairs, {} secondaries", slot, counts.len(), self.queue.len());
            self.primary = Some(Primary { slot: slot, store: store, counts: counts });
            return Ok(SweepState::Compare);
        }
        Ok(SweepState::Done)
    }

    fn compare_secondaries(&mut self) -> Result<SweepState> {
        let mut primary = match self.primary.take() {
            Some(primary) => primary,
            None => return Ok(SweepState::SelectPrimary)
        };

        // Matches are folded after every batch so at most `concurrency` of them are live
        let secondaries: Vec<usize> = self.queue.iter().cloned().collect();
        let width = self.scheduler.concurrency().max(1);
        for batch in secondaries.chunks(width) {
            let arena = &self.arena;
            let counts = &primary.counts;
            let matches = self.scheduler.try_batch_apply(batch.to_vec(), |_idx, slot| compare(arena, slot, counts))?;
            self.stats.comparisons += batch.len();
            for matched in matches {
                self.stats.folded += primary.counts.absorb(matched);
            }
        }

        self.primary = Some(primary);
        Ok(SweepState::Finalize)
    }

    fn finalize<R: ReportSink>(&mut self, report: &mut R) -> Result<SweepState> {
        if let Some(primary) = self.primary.take() {
            report.append(&primary.counts)?;
            self.stats.rounds += 1;
            self.stats.rows += primary.counts.len();
            self.stats.total += primary.counts.total();
            debug!("Fragment {} finalized with {} pairs", primary.slot, primary.counts.len());
            primary.store.discard()?;
        }
        Ok(SweepState::SelectPrimary)
    }
}

#[cfg(test)]
mod test_sweep {
    use super::*;
    use crate::collection::memory::MemoryReport;
    use crate::pair::Pair;
    use basket_core::scheduler::{PoolScheduler, SerialScheduler};

    fn p(a: &str, b: &str) -> Pair {
        Pair::new(a, b).unwrap()
    }

    fn frag(rows: &[(&str, &str, u64)]) -> PairCounts {
        rows.iter().map(|(a, b, c)| (p(a, b), *c)).collect()
    }

    #[test]
    fn test_two_basket_scenario() {
        let frags = vec![
            frag(&[("A", "B", 1), ("A", "C", 1), ("B", "C", 1)]),
            frag(&[("A", "B", 1)]),
        ];
        let mut report = MemoryReport::new();
        let stats = Sweep::new(frags, &SerialScheduler).run(&mut report).unwrap();

        assert_eq!(report.to_counts(), frag(&[("A", "B", 2), ("A", "C", 1), ("B", "C", 1)]));
        assert_eq!(stats.rounds, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.folded, 1);
        assert_eq!(stats.total, 4);
    }

    #[test]
    fn test_state_transitions() {
        let frags = vec![
            frag(&[("A", "B", 1), ("C", "D", 1)]),
            frag(&[("A", "B", 2)]),
            frag(&[("C", "D", 3), ("E", "F", 1)]),
        ];
        let mut report = MemoryReport::new();
        let mut sweep = Sweep::new(frags, &SerialScheduler);
        assert_eq!(sweep.state(), SweepState::SelectPrimary);

        assert_eq!(sweep.step(&mut report).unwrap(), SweepState::Compare);
        assert_eq!(sweep.primary_slot(), Some(0));
        assert_eq!(sweep.remaining(), 2);
        assert_eq!(sweep.step(&mut report).unwrap(), SweepState::Finalize);
        assert_eq!(report.rows().len(), 0);
        assert_eq!(sweep.step(&mut report).unwrap(), SweepState::SelectPrimary);
        assert_eq!(report.to_counts(), frag(&[("A", "B", 3), ("C", "D", 4)]));

        // Fragment 1 was emptied by the first round, fragment 2 still holds (E, F)
        assert_eq!(sweep.step(&mut report).unwrap(), SweepState::Compare);
        assert_eq!(sweep.primary_slot(), Some(2));
        assert_eq!(sweep.stats().skipped, 1);
        assert_eq!(sweep.step(&mut report).unwrap(), SweepState::Finalize);
        assert_eq!(sweep.step(&mut report).unwrap(), SweepState::SelectPrimary);
        assert_eq!(sweep.step(&mut report).unwrap(), SweepState::Done);
        assert_eq!(sweep.step(&mut report).unwrap(), SweepState::Done);

        assert_eq!(report.to_counts(), frag(&[("A", "B", 3), ("C", "D", 4), ("E", "F", 1)]));
        assert_eq!(report.batches(), 2);
    }

    #[test]
    fn test_no_fragments() {
        let mut report = MemoryReport::new();
        let stats = Sweep::new(Vec::<PairCounts>::new(), &SerialScheduler).run(&mut report).unwrap();
        assert_eq!(stats, SweepStats::default());
        assert!(report.rows().is_empty());
    }

    #[test]
    fn test_empty_fragments_skipped() {
        let frags = vec![PairCounts::new(), frag(&[("A", "B", 1)]), PairCounts::new()];
        let mut report = MemoryReport::new();
        let stats = Sweep::new(frags, &SerialScheduler).run(&mut report).unwrap();
        assert_eq!(stats.rounds, 1);
        assert_eq!(stats.skipped, 2);
        assert_eq!(report.total(), 1);
    }

    #[test]
    fn test_pool_matches_serial() {
        let make = || {
            (0..12).map(|i| {
                (0..30).map(|j| (p(&format!("i{}", (i + j) % 17), &format!("j{}", j % 7)), (i + 1) as u64))
                    .collect::<PairCounts>()
            }).collect::<Vec<_>>()
        };
        let expected_total: u64 = make().iter().map(|f| f.total()).sum();

        let mut serial = MemoryReport::new();
        Sweep::new(make(), &SerialScheduler).run(&mut serial).unwrap();

        let pool = PoolScheduler::new(4).unwrap();
        let mut pooled = MemoryReport::new();
        Sweep::new(make(), &pool).run(&mut pooled).unwrap();

        assert_eq!(serial.to_counts(), pooled.to_counts());
        assert_eq!(serial.rows(), pooled.rows());
        assert_eq!(serial.total(), expected_total);
    }

    struct FailingSink;

    impl ReportSink for FailingSink {
        fn append(&mut self, _batch: &PairCounts) -> Result<()> {
            Err(Error::Report(csv::Error::from(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))))
        }

        fn finish(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_report_failure_is_fatal() {
        let frags = vec![frag(&[("A", "B", 1)])];
        match Sweep::new(frags, &SerialScheduler).run(&mut FailingSink) {
            Err(Error::Report(_)) => (),
            other => panic!("expected report failure, got {:?}", other.map(|s| s.rows))
        }
    }

    // Runs serially but reports a fixed width, recording every batch it is handed
    struct Recording {
        width: usize,
        batches: Mutex<Vec<usize>>
    }

    impl Scheduler for Recording {
        fn batch_apply<A, B, F>(&self, inputs: Vec<A>, f: F) -> Vec<B>
            where A: Send,
                  B: Send,
                  F: Fn(usize, A) -> B + Send + Sync {
            self.batches.lock().unwrap().push(inputs.len());
            inputs.into_iter().enumerate().map(|(idx, a)| f(idx, a)).collect()
        }

        fn concurrency(&self) -> usize {
            self.width
        }
    }

    #[test]
    fn test_compare_bounded_by_concurrency() {
        let shared = [("A", "B", 1), ("C", "D", 1)];
        let frags: Vec<PairCounts> = (0..8).map(|_| frag(&shared)).collect();
        let scheduler = Recording { width: 3, batches: Mutex::new(Vec::new()) };
        let mut report = MemoryReport::new();
        let stats = Sweep::new(frags, &scheduler).run(&mut report).unwrap();

        // One primary against seven secondaries: batches of 3, 3 and 1
        assert_eq!(*scheduler.batches.lock().unwrap(), vec![3, 3, 1]);
        assert_eq!(stats.comparisons, 7);
        assert_eq!(stats.skipped, 7);
        assert_eq!(report.to_counts(), frag(&[("A", "B", 8), ("C", "D", 8)]));
    }
}
