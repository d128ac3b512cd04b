//! Report Sink
//! ---
//! Writes the final pair counts as CSV.  Batches are appended in the order the sweep
//! finalizes them and are never re-read.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use csv::{Writer, WriterBuilder};
use log::debug;

use crate::error::{Error, Result};
use crate::interfaces::ReportSink;
use crate::pair::PairCounts;

/// Column names of the report
pub const HEADER: [&str; 3] = ["Product_1", "Product_2", "num_baskets"];

fn report_err(e: io::Error) -> Error {
    Error::Report(csv::Error::from(e))
}

/// CSV report with one `Product_1,Product_2,num_baskets` row per pair
pub struct CsvReport<W: Write> {
    writer: Writer<W>,
    rows: usize
}

impl CsvReport<File> {

    /// Creates (or truncates) the report file at `path` and writes the header
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let fd = File::create(path.as_ref()).map_err(report_err)?;
        debug!("Writing report to {}", path.as_ref().display());
        CsvReport::new(fd)
    }
}

impl <W: Write> CsvReport<W> {

    /// Wraps a writer, emitting the header immediately
    pub fn new(out: W) -> Result<Self> {
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(out);
        writer.write_record(&HEADER).map_err(Error::Report)?;
        Ok(CsvReport { writer: writer, rows: 0 })
    }

    /// Rows written so far, header excluded
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Flushes and returns the underlying writer
    pub fn into_inner(self) -> Result<W> {
        self.writer.into_inner().map_err(|e| report_err(e.into_error()))
    }
}

impl <W: Write> ReportSink for CsvReport<W> {
    fn append(&mut self, batch: &PairCounts) -> Result<()> {
        for (pair, count) in batch {
            self.writer.serialize((pair.first(), pair.second(), count)).map_err(Error::Report)?;
        }
        self.rows += batch.len();
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush().map_err(report_err)
    }
}
