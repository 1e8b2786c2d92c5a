//! Buffered scratch files of pixel-index pairs.
//!
//! During pair binning, every unordered pixel pair is appended to the scratch
//! file of its separation bin and read back once when the bin's two-point
//! table is assembled. The files are written in host byte order and are never
//! portable; they exist only to keep the working set of the binning stage out
//! of memory. Reads and writes never interleave on one file, so the two modes
//! are separate types.

use crate::error::Error;
use crate::Pix;
use std::fs::File;
use std::io::{Read, Write};
use std::mem::size_of;
use std::path::{Path, PathBuf};

/// Default buffer capacity, in pairs.
pub const DEFAULT_PAIR_BUFFER: usize = 1_000_000;

pub struct PairFileWriter {
    path: PathBuf,
    file: File,
    // interleaved (i, j) values; flushed when it reaches 2 * buf_pairs
    buf: Vec<Pix>,
    capacity: usize,
}

impl PairFileWriter {
    /// Create (truncating) the scratch file, buffering `buf_pairs` pairs.
    pub fn create(path: impl Into<PathBuf>, buf_pairs: usize) -> Result<Self, Error> {
        let path = path.into();
        let file = File::create(&path).map_err(|e| Error::io(&path, e))?;
        let capacity = 2 * buf_pairs.max(1);
        Ok(PairFileWriter {
            path,
            file,
            buf: Vec::with_capacity(capacity),
            capacity,
        })
    }

    pub fn append(&mut self, i: Pix, j: Pix) -> Result<(), Error> {
        if self.buf.len() >= self.capacity {
            self.flush()?;
        }
        self.buf.push(i);
        self.buf.push(j);
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), Error> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let mut bytes = Vec::with_capacity(self.buf.len() * size_of::<Pix>());
        for &v in &self.buf {
            bytes.extend_from_slice(&v.to_ne_bytes());
        }
        self.file
            .write_all(&bytes)
            .map_err(|e| Error::io(&self.path, e))?;
        self.buf.clear();
        Ok(())
    }

    /// Flush and close the file.
    pub fn finish(mut self) -> Result<(), Error> {
        self.flush()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PairFileWriter {
    fn drop(&mut self) {
        // best effort; call finish() to observe flush failures
        let _ = self.flush();
    }
}

pub struct PairFileReader {
    path: PathBuf,
    file: File,
    buf: Vec<Pix>,
    pos: usize,
    /// values (not pairs) left in the file beyond the current buffer
    remaining: u64,
    capacity: usize,
}

impl PairFileReader {
    pub fn open(path: impl Into<PathBuf>, buf_pairs: usize) -> Result<Self, Error> {
        let path = path.into();
        let file = File::open(&path).map_err(|e| Error::io(&path, e))?;
        let nbytes = file.metadata().map_err(|e| Error::io(&path, e))?.len();
        Ok(PairFileReader {
            path,
            file,
            buf: Vec::new(),
            pos: 0,
            remaining: nbytes / size_of::<Pix>() as u64,
            capacity: 2 * buf_pairs.max(1),
        })
    }

    /// Yield the next `(i, j)` pair, or `None` once the file is exhausted.
    pub fn read_next_pair(&mut self) -> Result<Option<(Pix, Pix)>, Error> {
        if self.pos + 1 >= self.buf.len() {
            if !self.refill()? {
                return Ok(None);
            }
        }
        let i = self.buf[self.pos];
        let j = self.buf[self.pos + 1];
        self.pos += 2;
        Ok(Some((i, j)))
    }

    fn refill(&mut self) -> Result<bool, Error> {
        let n = (self.remaining as usize).min(self.capacity);
        if n == 0 {
            return Ok(false);
        }
        let mut bytes = vec![0u8; n * size_of::<Pix>()];
        self.file
            .read_exact(&mut bytes)
            .map_err(|e| Error::io(&self.path, e))?;
        self.buf.clear();
        self.buf.extend(
            bytes
                .chunks_exact(size_of::<Pix>())
                .map(|c| Pix::from_ne_bytes(c.try_into().unwrap())),
        );
        self.pos = 0;
        self.remaining -= n as u64;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_across_buffer_boundaries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pairs.bin");

        // a buffer of 8 pairs forces several flushes and refills
        let mut writer = PairFileWriter::create(&path, 8).unwrap();
        for k in 0..100 {
            writer.append(k, 2 * k + 1).unwrap();
        }
        writer.finish().unwrap();

        let mut reader = PairFileReader::open(&path, 8).unwrap();
        for k in 0..100 {
            assert_eq!(reader.read_next_pair().unwrap(), Some((k, 2 * k + 1)));
        }
        assert_eq!(reader.read_next_pair().unwrap(), None);
        // safe to keep asking
        assert_eq!(reader.read_next_pair().unwrap(), None);
    }

    #[test]
    fn empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pairs.bin");
        PairFileWriter::create(&path, 4).unwrap().finish().unwrap();
        let mut reader = PairFileReader::open(&path, 4).unwrap();
        assert_eq!(reader.read_next_pair().unwrap(), None);
    }
}
