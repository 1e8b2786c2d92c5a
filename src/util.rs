//! Numbered-file helpers and little-endian wire primitives shared by the
//! on-disk formats.

use crate::error::Error;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Make a numbered filename from a prefix.
///
/// The number is zero padded to five digits and `.dat` is appended. No
/// separator is inserted, so the prefix must carry its own (`"twopt_"`,
/// `"quads/"`, ...).
pub fn make_filename(prefix: &str, num: usize) -> PathBuf {
    PathBuf::from(format!("{prefix}{num:05}.dat"))
}

/// Collect the existing files `<prefix>00000.dat`, `<prefix>00001.dat`, ...
/// stopping at the first gap.
pub fn sequential_file_list(prefix: &str) -> Vec<PathBuf> {
    let mut files = Vec::new();
    loop {
        let candidate = make_filename(prefix, files.len());
        if !candidate.is_file() {
            break;
        }
        files.push(candidate);
    }
    files
}

pub(crate) fn write_u8(w: &mut impl Write, path: &Path, v: u8) -> Result<(), Error> {
    w.write_all(&[v]).map_err(|e| Error::io(path, e))
}

pub(crate) fn write_u64(w: &mut impl Write, path: &Path, v: u64) -> Result<(), Error> {
    w.write_all(&v.to_le_bytes()).map_err(|e| Error::io(path, e))
}

pub(crate) fn write_f64(w: &mut impl Write, path: &Path, v: f64) -> Result<(), Error> {
    w.write_all(&v.to_le_bytes()).map_err(|e| Error::io(path, e))
}

pub(crate) fn write_i32(w: &mut impl Write, path: &Path, v: i32) -> Result<(), Error> {
    w.write_all(&v.to_le_bytes()).map_err(|e| Error::io(path, e))
}

pub(crate) fn read_u8(r: &mut impl Read, path: &Path) -> Result<u8, Error> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf).map_err(|e| Error::io(path, e))?;
    Ok(buf[0])
}

pub(crate) fn read_u64(r: &mut impl Read, path: &Path) -> Result<u64, Error> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf).map_err(|e| Error::io(path, e))?;
    Ok(u64::from_le_bytes(buf))
}

pub(crate) fn read_f64(r: &mut impl Read, path: &Path) -> Result<f64, Error> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf).map_err(|e| Error::io(path, e))?;
    Ok(f64::from_le_bytes(buf))
}

pub(crate) fn read_i32(r: &mut impl Read, path: &Path) -> Result<i32, Error> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf).map_err(|e| Error::io(path, e))?;
    Ok(i32::from_le_bytes(buf))
}

/// Fill `buf` from `r`, distinguishing a clean end-of-stream (nothing read,
/// returns `Ok(false)`) from a short read mid-record (an error).
pub(crate) fn try_read_exact(r: &mut impl Read, buf: &mut [u8]) -> std::io::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = r.read(&mut buf[filled..])?;
        if n == 0 {
            if filled == 0 {
                return Ok(false);
            }
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "record truncated",
            ));
        }
        filled += n;
    }
    Ok(true)
}
