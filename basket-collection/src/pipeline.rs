//! Pipeline driver
//! ---
//! Runs the stages in order: split the input into fragments, expand and reduce every
//! fragment into count-fragments, sweep the count-fragments into the report.  The middle
//! stage runs one task per fragment on the configured scheduler.

use std::fmt;
use std::time::{Duration, Instant};

use basket_core::scheduler::{PoolScheduler, Scheduler, SerialScheduler};
use log::{debug, info, warn};

use crate::collection::disk::{Disk, ScratchSpace};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::extract::extract_pairs;
use crate::interfaces::{ReportSink, Stream};
use crate::record::Record;
use crate::reduce::Reducer;
use crate::report::CsvReport;
use crate::split::Splitter;
use crate::sweep::Sweep;
use crate::utils::{read_records, MemoryUsage};

/// What a run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Records read from the input
    pub records: usize,

    /// Fragments written by the splitter
    pub fragments: usize,

    /// Baskets seen by the extractor
    pub baskets: usize,

    /// Records skipped as malformed
    pub malformed: usize,

    /// Count-fragments written by the reducer
    pub count_fragments: usize,

    /// Count-fragments that served as primary
    pub rounds: usize,

    /// Count-fragments skipped because earlier primaries absorbed them
    pub skipped: usize,

    /// Rows in the report
    pub report_rows: usize,

    /// Sum of all report counts
    pub total_count: u64,

    /// Resident bytes when the run started
    pub memory_start: Option<u64>,

    /// Resident bytes when the run finished
    pub memory_end: Option<u64>,

    /// Largest resident bytes sampled at stage boundaries
    pub memory_peak: Option<u64>,

    /// Wall clock time of the run
    pub elapsed: Duration
}

const MIB: f64 = (1u64 << 20) as f64;

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Records read:      {}", self.records)?;
        writeln!(f, "Baskets:           {}", self.baskets)?;
        writeln!(f, "Malformed records: {}", self.malformed)?;
        writeln!(f, "Fragments:         {}", self.fragments)?;
        writeln!(f, "Count-fragments:   {} ({} primary, {} absorbed)",
                 self.count_fragments, self.rounds, self.skipped)?;
        writeln!(f, "Report rows:       {}", self.report_rows)?;
        writeln!(f, "Total count:       {}", self.total_count)?;
        if let (Some(start), Some(end)) = (self.memory_start, self.memory_end) {
            writeln!(f, "Total MiBs used:   {:.4}", (end as f64 - start as f64) / MIB)?;
        }
        if let Some(peak) = self.memory_peak {
            writeln!(f, "Peak MiBs:         {:.4}", peak as f64 / MIB)?;
        }
        write!(f, "Run time:          {:.3} seconds", self.elapsed.as_secs_f64())
    }
}

/// Basket pair aggregation pipeline
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig
}

impl Pipeline {

    /// Creates a pipeline after validating its configuration
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Pipeline { config: config })
    }

    /// Configuration in use
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Reads the configured input and writes the configured report.
    pub fn run(&self) -> Result<RunSummary> {
        info!("Processing {}", self.config.input.display());
        let records = read_records(&self.config.input)?;
        let mut report = CsvReport::create(&self.config.report)?;

        if self.config.workers > 1 {
            let pool = PoolScheduler::new(self.config.workers)?;
            self.run_with(records, &mut report, &pool)
        } else {
            self.run_with(records, &mut report, &SerialScheduler)
        }
    }

    /// Runs the pipeline over any record stream, report sink and scheduler.
    pub fn run_with<I, R, S>(&self, records: I, report: &mut R, scheduler: &S) -> Result<RunSummary>
        where I: IntoIterator<Item=Result<Record>>,
              R: ReportSink,
              S: Scheduler {

        let start = Instant::now();
        let mut memory = MemoryUsage::start();
        let space = ScratchSpace::create(&self.config.scratch_dir, self.config.compress_scratch)?
            .keep(self.config.keep_scratch);
        let mut summary = RunSummary::default();

        // Split
        let split = Splitter::new(self.config.line_limit)
            .split(records, &Disk::new(&space, "subdata"))?;
        summary.records = split.records;
        summary.fragments = split.fragments.len();
        info!("Created {} fragments of approximately {} records each",
              summary.fragments, self.config.line_limit);
        memory.sample();

        // Extract and reduce, one task per fragment
        let reducer = Reducer::new(self.config.row_limit());
        let space_ref = &space;
        let per_fragment = scheduler.try_batch_apply(split.fragments, |idx, fragment| -> Result<_> {
            let extraction = extract_pairs(fragment.stream()?)?;
            if extraction.malformed > 0 {
                warn!("Fragment {}: skipped {} malformed records", idx, extraction.malformed);
            }
            let (baskets, malformed) = (extraction.baskets, extraction.malformed);
            let chunks = reducer.reduce(extraction.counts, &Disk::new(space_ref, format!("tuplecount_{:05}", idx)))?;
            debug!("Fragment {}: {} baskets, {} count-fragments", idx, baskets, chunks.len());
            fragment.remove()?;
            Ok((baskets, malformed, chunks))
        })?;

        let mut count_fragments = Vec::new();
        for (baskets, malformed, chunks) in per_fragment {
            summary.baskets += baskets;
            summary.malformed += malformed;
            count_fragments.extend(chunks);
        }
        summary.count_fragments = count_fragments.len();
        memory.sample();

        // Merge and deduplicate
        info!("Consolidating {} count-fragments", summary.count_fragments);
        let stats = Sweep::new(count_fragments, scheduler).run(report)?;
        report.finish()?;

        summary.rounds = stats.rounds;
        summary.skipped = stats.skipped;
        summary.report_rows = stats.rows;
        summary.total_count = stats.total;
        summary.memory_end = memory.sample();
        summary.memory_start = memory.initial();
        summary.memory_peak = memory.peak();
        summary.elapsed = start.elapsed();
        info!("Finished: {} pairs, total count {}, in {:?}",
              summary.report_rows, summary.total_count, summary.elapsed);
        Ok(summary)
    }
}

#[cfg(test)]
mod test_pipeline {
    use super::*;
    use crate::collection::memory::{reference_counts, MemoryReport};
    use crate::error::Error;
    use crate::pair::{Pair, PairCounts};
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};
    use std::fs;
    use std::io;

    fn p(a: &str, b: &str) -> Pair {
        Pair::new(a, b).unwrap()
    }

    fn pipeline(root: &tempfile::TempDir, line_limit: usize, row_limit: Option<usize>) -> Pipeline {
        let config = PipelineConfig {
            scratch_dir: root.path().to_path_buf(),
            line_limit: line_limit,
            row_limit: row_limit,
            ..PipelineConfig::default()
        };
        Pipeline::new(config).unwrap()
    }

    fn run(pl: &Pipeline, records: &[Record]) -> (RunSummary, MemoryReport) {
        let mut report = MemoryReport::new();
        let summary = pl.run_with(records.iter().cloned().map(Ok), &mut report, &SerialScheduler).unwrap();
        (summary, report)
    }

    // Random contiguous baskets of 1-6 items drawn from `n_items` ids
    fn random_baskets(rng: &mut StdRng, n_baskets: usize, n_items: usize) -> Vec<Vec<Record>> {
        (0..n_baskets).map(|b| {
            let size = rng.gen_range(1..=6);
            (0..size).map(|_| Record::new(format!("b{}", b), format!("i{}", rng.gen_range(0..n_items))))
                .collect()
        }).collect()
    }

    #[test]
    fn test_two_basket_scenario() {
        let root = tempfile::tempdir().unwrap();
        let records = vec![
            Record::new("1", "A"), Record::new("1", "B"), Record::new("1", "C"),
            Record::new("2", "A"), Record::new("2", "B"),
        ];
        let (summary, report) = run(&pipeline(&root, 2, None), &records);

        assert!(summary.fragments >= 2);
        assert_eq!(summary.baskets, 2);
        let expected: PairCounts = vec![(p("A", "B"), 2), (p("A", "C"), 1), (p("B", "C"), 1)]
            .into_iter().collect();
        assert_eq!(report.to_counts(), expected);
        assert_eq!(report.rows().len(), 3);
        assert_eq!(summary.total_count, 4);
    }

    #[test]
    fn test_oversized_basket() {
        let root = tempfile::tempdir().unwrap();
        let records: Vec<Record> = (0..8).map(|i| Record::new("big", format!("item{}", i))).collect();
        let (summary, report) = run(&pipeline(&root, 3, None), &records);

        assert_eq!(summary.fragments, 1);
        assert_eq!(report.rows().len(), 28);
        assert!(report.rows().iter().all(|r| r.1 == 1));
    }

    #[test]
    fn test_empty_input() {
        let root = tempfile::tempdir().unwrap();
        let (summary, report) = run(&pipeline(&root, 10, None), &[]);
        assert_eq!(summary.fragments, 0);
        assert_eq!(summary.count_fragments, 0);
        assert!(report.rows().is_empty());
    }

    #[test]
    fn test_conservation_against_reference() {
        let mut rng = StdRng::seed_from_u64(11);
        let records: Vec<Record> = random_baskets(&mut rng, 300, 25).into_iter().flatten().collect();
        let expected = reference_counts(records.clone());

        let root = tempfile::tempdir().unwrap();
        for &(line_limit, row_limit) in &[(1, Some(1)), (7, Some(5)), (40, None), (10_000, None)] {
            let (summary, report) = run(&pipeline(&root, line_limit, row_limit), &records);
            assert_eq!(report.to_counts(), expected, "line_limit {}", line_limit);
            assert_eq!(report.total(), expected.total());
            assert_eq!(summary.total_count, expected.total());
            assert_eq!(summary.baskets, 300);
        }
    }

    #[test]
    fn test_fragment_order_independence() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut baskets = random_baskets(&mut rng, 120, 15);
        let root = tempfile::tempdir().unwrap();
        let pl = pipeline(&root, 9, Some(6));

        let first: Vec<Record> = baskets.iter().flatten().cloned().collect();
        let (_, base) = run(&pl, &first);

        for _ in 0..3 {
            baskets.shuffle(&mut rng);
            let shuffled: Vec<Record> = baskets.iter().flatten().cloned().collect();
            let (_, report) = run(&pl, &shuffled);
            assert_eq!(report.to_counts(), base.to_counts());
        }
    }

    #[test]
    fn test_pool_scheduler() {
        let mut rng = StdRng::seed_from_u64(23);
        let records: Vec<Record> = random_baskets(&mut rng, 200, 20).into_iter().flatten().collect();
        let root = tempfile::tempdir().unwrap();
        let pl = pipeline(&root, 15, Some(10));

        let pool = PoolScheduler::new(4).unwrap();
        let mut report = MemoryReport::new();
        pl.run_with(records.iter().cloned().map(Ok), &mut report, &pool).unwrap();
        assert_eq!(report.to_counts(), reference_counts(records));
    }

    #[test]
    fn test_malformed_records() {
        let root = tempfile::tempdir().unwrap();
        let records = vec![
            Record::new("1", "A"), Record::new("1", ""), Record::new("1", "B"),
            Record::new("", "C"), Record::new("2", "A"), Record::new("2", "B"),
        ];
        let (summary, report) = run(&pipeline(&root, 100, None), &records);
        assert_eq!(summary.malformed, 2);
        let expected: PairCounts = vec![(p("A", "B"), 2)].into_iter().collect();
        assert_eq!(report.to_counts(), expected);
    }

    #[test]
    fn test_keyless_record_inside_basket() {
        let root = tempfile::tempdir().unwrap();
        let records = vec![Record::new("1", "A"), Record::new("", "Z"), Record::new("1", "B")];
        let expected = reference_counts(records.clone());
        for &line_limit in &[1, 2, 100] {
            let (summary, report) = run(&pipeline(&root, line_limit, None), &records);
            assert_eq!(summary.fragments, 1, "line_limit {}", line_limit);
            assert_eq!(summary.malformed, 1);
            assert_eq!(report.to_counts(), expected, "line_limit {}", line_limit);
        }
        assert_eq!(expected.get(&p("A", "B")), Some(1));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_memory_reported() {
        let root = tempfile::tempdir().unwrap();
        let records = vec![Record::new("1", "A"), Record::new("1", "B")];
        let (summary, _) = run(&pipeline(&root, 10, None), &records);
        let peak = summary.memory_peak.unwrap();
        assert!(peak >= summary.memory_start.unwrap());
        assert!(peak >= summary.memory_end.unwrap());

        let text = summary.to_string();
        assert!(text.contains("Total MiBs used:"));
        assert!(text.contains("Peak MiBs:"));
    }

    #[test]
    fn test_scratch_cleaned_up() {
        let root = tempfile::tempdir().unwrap();
        let records = vec![Record::new("1", "A"), Record::new("1", "B"), Record::new("2", "A")];
        run(&pipeline(&root, 1, None), &records);
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_input_failure_aborts() {
        let root = tempfile::tempdir().unwrap();
        let input = vec![
            Ok(Record::new("1", "A")),
            Err(Error::Io(io::Error::new(io::ErrorKind::Other, "truncated input"))),
        ];
        let mut report = MemoryReport::new();
        let res = pipeline(&root, 1, None).run_with(input, &mut report, &SerialScheduler);
        assert!(res.is_err());
        assert!(report.rows().is_empty());
    }

    #[test]
    fn test_run_from_files() {
        let root = tempfile::tempdir().unwrap();
        let input = root.path().join("baskets.csv");
        let output = root.path().join("report.csv");
        fs::write(&input, "1,A\n1,B\n1,C\n2,A\n2,B\n").unwrap();

        let config = PipelineConfig {
            input: input,
            report: output.clone(),
            line_limit: 2,
            workers: 2,
            scratch_dir: root.path().join("scratch"),
            ..PipelineConfig::default()
        };
        let summary = Pipeline::new(config).unwrap().run().unwrap();
        assert_eq!(summary.report_rows, 3);

        let text = fs::read_to_string(&output).unwrap();
        let mut lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.remove(0), "Product_1,Product_2,num_baskets");
        lines.sort();
        assert_eq!(lines, vec!["A,B,2", "A,C,1", "B,C,1"]);
    }
}
