use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::pair::Pair;

/// Errors which abort a run.  Malformed input records are not errors; they are counted
/// and skipped by the stage that finds them.
#[derive(Error, Debug)]
pub enum Error {
    /// Reading or parsing the input stream failed
    #[error("Input error: {0}")]
    Input(#[from] csv::Error),

    /// Generic I/O failure outside of scratch storage
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A fragment or count-fragment file could not be created, written, read or removed
    #[error("Scratch storage error on {}: {source}", .path.display())]
    Scratch {
        /// File or directory being accessed
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: io::Error
    },

    /// A fragment file held bytes which could not be encoded or decoded
    #[error("Fragment codec error on {}: {source}", .path.display())]
    Codec {
        /// Fragment file being accessed
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: bincode::Error
    },

    /// Appending a batch to the report failed; the partial report is not authoritative
    #[error("Report append failed: {0}")]
    Report(#[source] csv::Error),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// The configuration file could not be parsed
    #[error("Configuration file error: {0}")]
    ConfigFile(#[from] toml::de::Error),

    /// A report sink received a pair it had already been given
    #[error("Pair {0} was appended to the report twice")]
    DuplicatePair(Pair),

    /// A fragment lock was poisoned by a panicking worker
    #[error("Fragment {0} lock poisoned")]
    Poisoned(usize),

    /// The worker pool could not be started
    #[error("Worker pool error: {0}")]
    Pool(#[from] basket_core::scheduler::ThreadPoolBuildError),
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn scratch<P: Into<PathBuf>>(path: P, source: io::Error) -> Self {
        Error::Scratch { path: path.into(), source: source }
    }

    pub(crate) fn codec<P: Into<PathBuf>>(path: P, source: bincode::Error) -> Self {
        Error::Codec { path: path.into(), source: source }
    }
}
