//! The quadrilateral list file.
//!
//! Quadruples arrive as a stream of `(p₀, p₁, p₂, p₃)` records in which long
//! runs share their leading vertices, so the file groups consecutive records
//! into a recursive run-length form. One blob holds every quadrilateral of a
//! `p₀` run:
//!
//! ```text
//! p₀ N₁ { p₁ N₂ [ p₂ N₃ ( p₃ p₃ … ) p₂' N₃' ( … ) … ] p₁' N₂' [ … ] … }
//! ```
//!
//! all values in the table integer type. On disk (version 1, little endian):
//! version byte, `nside` (u64), scheme byte, `bin_value` (f64), `maxbytes`
//! (u64, back-patched on close so readers can size their scratch), then a
//! sequence of blobs, each a `u64` byte length followed by the values.
//! End-of-file at a length prefix ends the stream; a partial record is an
//! error. The format does not involve the codec.

use crate::error::Error;
use crate::pixels::Scheme;
use crate::util::{
    read_f64, read_u64, read_u8, try_read_exact, write_f64, write_u64, write_u8,
};
use crate::Pix;
use std::fs::File;
use std::io::{BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const QUAD_FORMAT_VERSION: u8 = 1;
/// byte offset of the `maxbytes` header field
const MAXBYTES_OFFSET: u64 = 1 + 8 + 1 + 8;

struct P2Group {
    p2: Pix,
    third: Vec<Pix>,
}

struct P1Group {
    p1: Pix,
    groups: Vec<P2Group>,
}

struct BlobBuilder {
    p0: Pix,
    groups: Vec<P1Group>,
}

impl BlobBuilder {
    fn flatten(&self, out: &mut Vec<Pix>) {
        out.clear();
        out.push(self.p0);
        out.push(self.groups.len() as Pix);
        for g1 in &self.groups {
            out.push(g1.p1);
            out.push(g1.groups.len() as Pix);
            for g2 in &g1.groups {
                out.push(g2.p2);
                out.push(g2.third.len() as Pix);
                out.extend_from_slice(&g2.third);
            }
        }
    }
}

pub struct QuadFileWriter {
    path: PathBuf,
    w: BufWriter<File>,
    current: Option<BlobBuilder>,
    maxbytes: u64,
    scratch: Vec<Pix>,
}

impl QuadFileWriter {
    pub fn create(
        path: impl Into<PathBuf>,
        nside: usize,
        scheme: Scheme,
        bin_value: f64,
    ) -> Result<Self, Error> {
        let path = path.into();
        let file = File::create(&path).map_err(|e| Error::io(&path, e))?;
        let mut w = BufWriter::new(file);
        write_u8(&mut w, &path, QUAD_FORMAT_VERSION)?;
        write_u64(&mut w, &path, nside as u64)?;
        write_u8(&mut w, &path, scheme.to_byte())?;
        write_f64(&mut w, &path, bin_value)?;
        // placeholder, patched in finish()
        write_u64(&mut w, &path, 0)?;
        Ok(QuadFileWriter {
            path,
            w,
            current: None,
            maxbytes: 0,
            scratch: Vec::new(),
        })
    }

    /// Append the quadrilaterals `(pts[0], pts[1], pts[2], d)` for every `d`
    /// in `third`. Consecutive calls sharing leading vertices extend the
    /// current groups; a new leading vertex closes the current blob.
    pub fn push_set(&mut self, pts: &[Pix; 3], third: &[Pix]) -> Result<(), Error> {
        for &d in third {
            self.push_quad(pts[0], pts[1], pts[2], d)?;
        }
        Ok(())
    }

    fn push_quad(&mut self, p0: Pix, p1: Pix, p2: Pix, p3: Pix) -> Result<(), Error> {
        match &mut self.current {
            Some(blob) if blob.p0 == p0 => {
                let g1_matches = blob.groups.last().is_some_and(|g| g.p1 == p1);
                if !g1_matches {
                    blob.groups.push(P1Group {
                        p1,
                        groups: Vec::new(),
                    });
                }
                let g1 = blob.groups.last_mut().expect("just ensured");
                let g2_matches = g1.groups.last().is_some_and(|g| g.p2 == p2);
                if !g2_matches {
                    g1.groups.push(P2Group {
                        p2,
                        third: Vec::new(),
                    });
                }
                g1.groups.last_mut().expect("just ensured").third.push(p3);
                Ok(())
            }
            _ => {
                self.emit_current()?;
                self.current = Some(BlobBuilder {
                    p0,
                    groups: vec![P1Group {
                        p1,
                        groups: vec![P2Group {
                            p2,
                            third: vec![p3],
                        }],
                    }],
                });
                Ok(())
            }
        }
    }

    fn emit_current(&mut self) -> Result<(), Error> {
        let Some(blob) = self.current.take() else {
            return Ok(());
        };
        blob.flatten(&mut self.scratch);
        let nbytes = (self.scratch.len() * 4) as u64;
        self.maxbytes = self.maxbytes.max(nbytes);
        write_u64(&mut self.w, &self.path, nbytes)?;
        let mut bytes = Vec::with_capacity(self.scratch.len() * 4);
        for &v in &self.scratch {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        self.w
            .write_all(&bytes)
            .map_err(|e| Error::io(&self.path, e))
    }

    /// Flush the trailing blob and patch `maxbytes` into the header.
    pub fn finish(mut self) -> Result<(), Error> {
        self.emit_current()?;
        self.w.flush().map_err(|e| Error::io(&self.path, e))?;
        let mut file = self
            .w
            .into_inner()
            .map_err(|e| Error::io(&self.path, e.into_error()))?;
        file.seek(SeekFrom::Start(MAXBYTES_OFFSET))
            .map_err(|e| Error::io(&self.path, e))?;
        file.write_all(&self.maxbytes.to_le_bytes())
            .map_err(|e| Error::io(&self.path, e))
    }
}

/// Sequential reader over the blobs of a quadrilateral list file.
pub struct QuadFile {
    path: PathBuf,
    r: BufReader<File>,
    nside: usize,
    scheme: Scheme,
    bin_value: f64,
    maxbytes: u64,
    bytes: Vec<u8>,
    values: Vec<Pix>,
}

impl QuadFile {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();
        let file = File::open(&path).map_err(|e| Error::io(&path, e))?;
        let mut r = BufReader::new(file);
        let version = read_u8(&mut r, &path)?;
        if version != QUAD_FORMAT_VERSION {
            return Err(Error::format(
                &path,
                format!("unsupported quadrilateral list version {version}"),
            ));
        }
        let nside = read_u64(&mut r, &path)? as usize;
        let scheme_byte = read_u8(&mut r, &path)?;
        let scheme = Scheme::from_byte(scheme_byte)
            .ok_or_else(|| Error::format(&path, format!("bad scheme byte {scheme_byte}")))?;
        let bin_value = read_f64(&mut r, &path)?;
        let maxbytes = read_u64(&mut r, &path)?;
        Ok(QuadFile {
            path,
            r,
            nside,
            scheme,
            bin_value,
            maxbytes,
            bytes: Vec::new(),
            values: Vec::new(),
        })
    }

    pub fn nside(&self) -> usize {
        self.nside
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn bin_value(&self) -> f64 {
        self.bin_value
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The next blob of values, or `None` at end-of-stream.
    pub fn next_blob(&mut self) -> Result<Option<&[Pix]>, Error> {
        let mut lenbuf = [0u8; 8];
        match try_read_exact(&mut self.r, &mut lenbuf) {
            Ok(false) => return Ok(None),
            Ok(true) => {}
            Err(e) => return Err(Error::io(&self.path, e)),
        }
        let nbytes = u64::from_le_bytes(lenbuf);
        if nbytes % 4 != 0 || nbytes > self.maxbytes {
            return Err(Error::format(
                &self.path,
                format!("blob of {nbytes} bytes is inconsistent with the header"),
            ));
        }
        self.bytes.resize(nbytes as usize, 0);
        match try_read_exact(&mut self.r, &mut self.bytes) {
            Ok(true) => {}
            Ok(false) | Err(_) => {
                return Err(Error::format(&self.path, "truncated blob"));
            }
        }
        self.values.clear();
        self.values.extend(
            self.bytes
                .chunks_exact(4)
                .map(|c| Pix::from_le_bytes(c.try_into().unwrap())),
        );
        Ok(Some(&self.values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grouping_of_consecutive_runs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.dat");

        let mut w = QuadFileWriter::create(&path, 2, Scheme::Nest, 0.25).unwrap();
        w.push_set(&[0, 1, 2], &[3, 4]).unwrap();
        w.push_set(&[0, 1, 5], &[6]).unwrap();
        w.push_set(&[0, 2, 3], &[7]).unwrap();
        w.push_set(&[1, 2, 3], &[4]).unwrap();
        // an empty fourth-point list contributes nothing
        w.push_set(&[1, 2, 9], &[]).unwrap();
        w.finish().unwrap();

        let mut r = QuadFile::open(&path).unwrap();
        assert_eq!(r.nside(), 2);
        assert_eq!(r.scheme(), Scheme::Nest);
        assert_eq!(r.bin_value(), 0.25);

        let first = r.next_blob().unwrap().unwrap().to_vec();
        assert_eq!(
            first,
            vec![0, 2, 1, 2, 2, 2, 3, 4, 5, 1, 6, 2, 1, 3, 1, 7]
        );
        let second = r.next_blob().unwrap().unwrap().to_vec();
        assert_eq!(second, vec![1, 1, 2, 1, 3, 1, 4]);
        assert!(r.next_blob().unwrap().is_none());
    }

    #[test]
    fn maxbytes_is_patched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.dat");
        let mut w = QuadFileWriter::create(&path, 1, Scheme::Ring, -0.5).unwrap();
        w.push_set(&[0, 1, 2], &[3]).unwrap();
        w.push_set(&[4, 5, 6], &[7, 8, 9]).unwrap();
        w.finish().unwrap();

        let r = QuadFile::open(&path).unwrap();
        // the larger blob has 9 values
        assert_eq!(r.maxbytes, 36);
    }

    #[test]
    fn empty_file_has_no_blobs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.dat");
        QuadFileWriter::create(&path, 1, Scheme::Nest, 0.0)
            .unwrap()
            .finish()
            .unwrap();
        let mut r = QuadFile::open(&path).unwrap();
        assert!(r.next_blob().unwrap().is_none());
    }

    #[test]
    fn partial_record_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.dat");
        let mut w = QuadFileWriter::create(&path, 1, Scheme::Nest, 0.0).unwrap();
        w.push_set(&[0, 1, 2], &[3]).unwrap();
        w.finish().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 2]).unwrap();
        let mut r = QuadFile::open(&path).unwrap();
        assert!(r.next_blob().is_err());
    }
}
