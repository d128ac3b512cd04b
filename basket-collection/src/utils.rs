use std::collections::VecDeque;
use std::fs::File;
use std::io::prelude::*;
use std::io::BufReader;
use std::path::Path;

use csv::{ReaderBuilder, StringRecordsIntoIter, Trim, WriterBuilder};
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::debug;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use sysinfo::{Pid, ProcessesToUpdate, System};
use uuid::Builder;

use crate::error::{Error, Result};
use crate::record::Record;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Streams records out of headerless CSV rows of the form `basket,item[,item...]`.
///
/// A row with several item columns yields one record per item.  A row with no item column
/// yields a single record with an empty item, which the extractor reports as malformed.
pub struct RecordReader<R: Read> {
    rows: StringRecordsIntoIter<R>,
    pending: VecDeque<Record>
}

impl <R: Read> RecordReader<R> {

    /// Reads CSV from any reader
    /// ```rust
    ///   use basket_collection::utils::RecordReader;
    ///   use basket_collection::record::Record;
    ///
    ///   let data = "b1,apple\nb1,pear,plum\nb2\n";
    ///   let records: Vec<Record> = RecordReader::new(data.as_bytes())
    ///       .collect::<Result<_, _>>()
    ///       .unwrap();
    ///   assert_eq!(records, vec![
    ///       Record::new("b1", "apple"),
    ///       Record::new("b1", "pear"),
    ///       Record::new("b1", "plum"),
    ///       Record::new("b2", ""),
    ///   ]);
    /// ```
    pub fn new(input: R) -> Self {
        let rows = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(input)
            .into_records();
        RecordReader { rows: rows, pending: VecDeque::new() }
    }
}

impl <R: Read> Iterator for RecordReader<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pending.is_empty() {
            let row = match self.rows.next()? {
                Ok(row) => row,
                Err(e) => return Some(Err(Error::Input(e)))
            };
            let basket = row.get(0).unwrap_or("");
            if row.len() < 2 {
                self.pending.push_back(Record::new(basket, ""));
            } else {
                for item in row.iter().skip(1) {
                    self.pending.push_back(Record::new(basket, item));
                }
            }
        }
        self.pending.pop_front().map(Ok)
    }
}

/// Opens a record file.  Gzip input is recognized by its magic bytes and decompressed on
/// the fly; anything else is read as plain CSV.
pub fn read_records<P: AsRef<Path>>(path: P) -> Result<RecordReader<Box<dyn Read + Send>>> {
    let path = path.as_ref();
    let fd = File::open(path)?;
    let mut br = BufReader::new(fd);
    let gzipped = br.fill_buf()?.starts_with(&GZIP_MAGIC);
    debug!("Reading {} ({})", path.display(), if gzipped { "gzip" } else { "plain" });

    let input: Box<dyn Read + Send> = if gzipped {
        Box::new(MultiGzDecoder::new(br))
    } else {
        Box::new(br)
    };
    Ok(RecordReader::new(input))
}

/// Writes a synthetic gzip compressed basket dataset.
///
/// `scale * 2^16` baskets are generated, each keyed by a random UUID and holding between
/// one and five distinct products drawn from `scale * 2^8` product ids.  Every item is
/// written as its own `basket,product` row.  Returns the number of rows written.
pub fn write_dataset<P: AsRef<Path>>(path: P, scale: usize, seed: u64) -> Result<usize> {
    let fd = File::create(path.as_ref())?;
    let gz = GzEncoder::new(fd, Compression::default());
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(gz);
    let rows = generate_baskets(&mut writer, scale, seed)?;
    let gz = writer.into_inner().map_err(|e| Error::Io(e.into_error()))?;
    gz.finish()?;
    Ok(rows)
}

fn generate_baskets<W: Write>(writer: &mut csv::Writer<W>, scale: usize, seed: u64) -> Result<usize> {
    let mut rng = StdRng::seed_from_u64(seed);
    let n_products = scale << 8;
    let n_baskets = scale << 16;
    let mut rows = 0usize;

    for _ in 0..n_baskets {
        let basket = Builder::from_random_bytes(rng.gen()).into_uuid().to_string();
        let size = rng.gen_range(1..=5).min(n_products);
        for product in sample(&mut rng, n_products, size).into_iter() {
            writer.write_record(&[basket.as_str(), product.to_string().as_str()])
                .map_err(|e| Error::Io(e.into()))?;
            rows += 1;
        }
    }
    debug!("Generated {} baskets, {} rows", n_baskets, rows);
    Ok(rows)
}

/// Samples the resident memory of the current process.
///
/// Platforms where the process can't be inspected report `None` for every sample.
pub struct MemoryUsage {
    system: System,
    pid: Option<Pid>,
    start: Option<u64>,
    peak: Option<u64>
}

impl MemoryUsage {

    /// Starts tracking, taking the first sample
    pub fn start() -> Self {
        let mut usage = MemoryUsage {
            system: System::new(),
            pid: sysinfo::get_current_pid().ok(),
            start: None,
            peak: None
        };
        usage.start = usage.sample();
        usage
    }

    /// Takes a sample, returning resident bytes
    pub fn sample(&mut self) -> Option<u64> {
        let pid = self.pid?;
        self.system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        let bytes = self.system.process(pid).map(|p| p.memory())?;
        self.peak = Some(self.peak.map_or(bytes, |peak| peak.max(bytes)));
        Some(bytes)
    }

    /// Resident bytes when tracking started
    pub fn initial(&self) -> Option<u64> {
        self.start
    }

    /// Largest resident bytes over all samples
    pub fn peak(&self) -> Option<u64> {
        self.peak
    }
}
