//! Disk Storage
//! ---
//! Fragments and count-fragments are written to a per-run scratch directory so that only
//! the fragment currently being worked on needs to be held in memory.  Each file holds a
//! sequence of bincode encoded values, optionally wrapped in a snappy frame stream to cut
//! down on scratch disk usage.
//!
//! The scratch directory is removed when the `ScratchSpace` is dropped.

use std::fs::{self, File};
use std::io::prelude::*;
use std::io::{BufReader, BufWriter};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use bincode::{deserialize_from, serialize_into};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use snap::read::FrameDecoder;
use snap::write::FrameEncoder;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::interfaces::{Accumulator, CountStore, Stream, ValueWriter};
use crate::pair::{Pair, PairCounts};

/// Per-run scratch directory holding fragment files
#[derive(Debug)]
pub struct ScratchSpace {
    dir: PathBuf,
    compress: bool,
    keep: bool
}

impl ScratchSpace {

    /// Creates a uniquely named scratch directory under `root`.
    pub fn create<P: AsRef<Path>>(root: P, compress: bool) -> Result<Self> {
        let dir = root.as_ref().join(format!("basket-{}", Uuid::new_v4()));
        fs::create_dir_all(&dir).map_err(|e| Error::scratch(&dir, e))?;
        debug!("Created scratch space {}", dir.display());
        Ok(ScratchSpace { dir: dir, compress: compress, keep: false })
    }

    /// Leaves the directory in place when dropped
    pub fn keep(mut self, keep: bool) -> Self {
        self.keep = keep;
        self
    }

    /// Location of the scratch directory
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Opens a new fragment file named `<prefix>_<ordinal>.bin`, truncating any previous
    /// file of that name.
    pub fn writer<A: Serialize>(&self, prefix: &str, ordinal: usize) -> Result<DiskBuffer<A>> {
        let path = self.dir.join(format!("{}_{:05}.bin", prefix, ordinal));
        DiskBuffer::create(path, ordinal, self.compress)
    }
}

impl Drop for ScratchSpace {
    fn drop(&mut self) {
        if self.keep {
            debug!("Keeping scratch space {}", self.dir.display());
        } else if let Err(e) = fs::remove_dir_all(&self.dir) {
            warn!("Error deleting scratch space {}: {}", self.dir.display(), e);
        }
    }
}

/// Accumulator writing each output into its own file in a scratch space
#[derive(Debug, Clone)]
pub struct Disk<'a> {
    space: &'a ScratchSpace,
    prefix: String
}

impl <'a> Disk<'a> {
    /// Writes files named `<prefix>_<ordinal>.bin` into `space`
    pub fn new<S: Into<String>>(space: &'a ScratchSpace, prefix: S) -> Self {
        Disk { space: space, prefix: prefix.into() }
    }
}

impl <'a, A: Serialize> Accumulator<A> for Disk<'a> {
    type VW = DiskBuffer<A>;

    fn writer(&self, ordinal: usize) -> Result<Self::VW> {
        self.space.writer(&self.prefix, ordinal)
    }
}

fn open_sink(path: &Path, compress: bool) -> Result<Box<dyn Write + Send>> {
    let fd = File::create(path).map_err(|e| Error::scratch(path, e))?;
    let bw = BufWriter::new(fd);
    if compress {
        Ok(Box::new(FrameEncoder::new(bw)))
    } else {
        Ok(Box::new(bw))
    }
}

/// Writer for a fragment file under construction
pub struct DiskBuffer<A> {
    path: PathBuf,
    ordinal: usize,
    compress: bool,
    len: usize,
    out: Box<dyn Write + Send>,
    pd: PhantomData<fn(A)>
}

impl <A> DiskBuffer<A> {
    fn create(path: PathBuf, ordinal: usize, compress: bool) -> Result<Self> {
        let out = open_sink(&path, compress)?;
        Ok(DiskBuffer {
            path: path,
            ordinal: ordinal,
            compress: compress,
            len: 0,
            out: out,
            pd: PhantomData
        })
    }
}

impl <A: Serialize> ValueWriter<A> for DiskBuffer<A> {
    type Out = FileStore<A>;

    fn add(&mut self, item: A) -> Result<()> {
        serialize_into(&mut self.out, &item).map_err(|e| Error::codec(&self.path, e))?;
        self.len += 1;
        Ok(())
    }

    fn finish(mut self) -> Result<Self::Out> {
        self.out.flush().map_err(|e| Error::scratch(&self.path, e))?;
        Ok(FileStore {
            path: self.path,
            ordinal: self.ordinal,
            compress: self.compress,
            len: self.len,
            pd: PhantomData
        })
    }
}

/// A finished fragment file.  The handle is the only owner of the file.
#[derive(Debug)]
pub struct FileStore<A> {
    path: PathBuf,
    ordinal: usize,
    compress: bool,
    len: usize,
    pd: PhantomData<fn() -> A>
}

impl <A> FileStore<A> {

    /// Position of the fragment in creation order
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Number of values held
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if no values are held
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Location of the file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Deletes the file
    pub fn remove(self) -> Result<()> {
        fs::remove_file(&self.path).map_err(|e| Error::scratch(&self.path, e))
    }
}

impl <A: Serialize> FileStore<A> {

    /// Replaces the file's contents.  Values are written to a sibling file first which is
    /// then moved over the original.
    pub fn rewrite<I: IntoIterator<Item=A>>(&mut self, items: I) -> Result<()> {
        let tmp = self.path.with_extension("tmp");
        let mut out: DiskBuffer<A> = DiskBuffer::create(tmp.clone(), self.ordinal, self.compress)?;
        for item in items {
            out.add(item)?;
        }
        let written = out.finish()?;
        fs::rename(&tmp, &self.path).map_err(|e| Error::scratch(&self.path, e))?;
        self.len = written.len;
        Ok(())
    }
}

impl <A: DeserializeOwned> Stream<A> for FileStore<A> {
    type Iter = RecordStreamer<A>;

    fn stream(&self) -> Result<Self::Iter> {
        let fd = File::open(&self.path).map_err(|e| Error::scratch(&self.path, e))?;
        let br = BufReader::new(fd);
        let input: Box<dyn Read + Send> = if self.compress {
            Box::new(FrameDecoder::new(br))
        } else {
            Box::new(br)
        };
        Ok(RecordStreamer {
            path: self.path.clone(),
            remaining: self.len,
            input: input,
            pd: PhantomData
        })
    }

    fn count(&self) -> usize {
        self.len
    }
}

/// Reads the values of a fragment file back in write order
pub struct RecordStreamer<A> {
    path: PathBuf,
    remaining: usize,
    input: Box<dyn Read + Send>,
    pd: PhantomData<fn() -> A>
}

impl <A: DeserializeOwned> Iterator for RecordStreamer<A> {
    type Item = Result<A>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        match deserialize_from(&mut self.input) {
            Ok(record) => Some(Ok(record)),
            Err(e) => {
                // A short or corrupt file can't be resumed
                self.remaining = 0;
                Some(Err(Error::codec(&self.path, e)))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl CountStore for FileStore<(Pair, u64)> {
    fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn load(&self) -> Result<PairCounts> {
        self.stream()?.collect()
    }

    fn store(&mut self, counts: &PairCounts) -> Result<()> {
        self.rewrite(counts.iter().map(|(p, c)| (p.clone(), *c)))
    }

    fn discard(self) -> Result<()> {
        self.remove()
    }
}
