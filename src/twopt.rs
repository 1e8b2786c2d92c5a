//! The per-bin two-point table.
//!
//! A table records, for one separation bin, which pixel pairs fall in it. It
//! holds the bin's `cos θ` value, the sorted pixel list the local indices
//! refer to, and a rectangular `Npix × Nmax` matrix of local indices padded
//! with `-1`. Row `i` lists, ascending, every local index `k` such that the
//! pair `(pixel_list[i], pixel_list[k])` lies in the bin; the structure is
//! symmetric because pairs are added in both directions.
//!
//! Writing and reading are split into two types that share no state: the
//! builder keeps ragged rows and rectangularizes on serialization, while the
//! read-side table wraps the single contiguous decompressed payload.
//!
//! On disk (format version 3, little endian): version byte, `bin_value`
//! (f64), `nside` (u64), `npix` (u64), the pixel list (`npix` × i32), scheme
//! byte, `nmax` (u64), then the codec-compressed payload of
//! `npix · nmax` i32 values in row-major order. The payload length is not
//! stored; the decompressor runs to end-of-file. Header-only readers stop
//! after `nmax`.

use crate::codec::Codec;
use crate::error::Error;
use crate::pixels::Scheme;
use crate::util::{
    read_f64, read_i32, read_u64, read_u8, write_f64, write_i32, write_u64, write_u8,
};
use crate::Pix;
use ndarray::Array2;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

const TABLE_FORMAT_VERSION: u8 = 3;

/// Write-mode table.
pub struct TwoptTableBuilder {
    nside: usize,
    scheme: Scheme,
    bin_value: f64,
    pixel_list: Vec<Pix>,
    rows: Vec<Vec<Pix>>,
}

impl TwoptTableBuilder {
    pub fn new(nside: usize, scheme: Scheme, pixel_list: Vec<Pix>, bin_value: f64) -> Self {
        let rows = vec![Vec::new(); pixel_list.len()];
        TwoptTableBuilder {
            nside,
            scheme,
            bin_value,
            pixel_list,
            rows,
        }
    }

    /// Append local index `j` to row `i`. Rows stay sorted as long as entries
    /// arrive in ascending order, which the pair-binning driver guarantees.
    pub fn add(&mut self, i: Pix, j: Pix) {
        self.rows[i as usize].push(j);
    }

    /// Add a pair symmetrically; equivalent to `add(i, j)` and `add(j, i)`.
    pub fn add_pair(&mut self, i: Pix, j: Pix) {
        self.add(i, j);
        self.add(j, i);
    }

    pub fn write_file(&self, path: &Path, codec: Codec) -> Result<(), Error> {
        let npix = self.pixel_list.len();
        let nmax = self.rows.iter().map(Vec::len).max().unwrap_or(0);

        let file = File::create(path).map_err(|e| Error::io(path, e))?;
        let mut w = BufWriter::new(file);
        write_u8(&mut w, path, TABLE_FORMAT_VERSION)?;
        write_f64(&mut w, path, self.bin_value)?;
        write_u64(&mut w, path, self.nside as u64)?;
        write_u64(&mut w, path, npix as u64)?;
        for &p in &self.pixel_list {
            write_i32(&mut w, path, p)?;
        }
        write_u8(&mut w, path, self.scheme.to_byte())?;
        write_u64(&mut w, path, nmax as u64)?;

        // rectangularize with -1 padding and hand the matrix to the codec
        let mut table = Array2::<Pix>::from_elem((npix, nmax), -1);
        for (i, row) in self.rows.iter().enumerate() {
            for (k, &v) in row.iter().enumerate() {
                table[[i, k]] = v;
            }
        }
        let mut payload = Vec::with_capacity(npix * nmax * 4);
        for &v in table.as_slice().expect("row-major table") {
            payload.extend_from_slice(&v.to_le_bytes());
        }
        codec.write_buffer(&mut w, &payload)?;
        w.flush().map_err(|e| Error::io(path, e))
    }
}

/// The header fields of a serialized table.
#[derive(Clone, Debug)]
pub struct TwoptHeader {
    pub bin_value: f64,
    pub nside: usize,
    pub npix: usize,
    pub scheme: Scheme,
    pub nmax: usize,
}

/// Read-mode table.
pub struct TwoptTable {
    bin_value: f64,
    nside: usize,
    scheme: Scheme,
    pixel_list: Vec<Pix>,
    nmax: usize,
    table: Vec<Pix>,
}

impl TwoptTable {
    pub fn read_file(path: &Path, codec: Codec) -> Result<Self, Error> {
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let mut r = BufReader::new(file);
        let (header, pixel_list) = read_header_from(&mut r, path)?;

        let nbytes = header.npix * header.nmax * 4;
        let mut payload = vec![0u8; nbytes];
        codec.read_buffer(&mut r, &mut payload)?;
        let table = payload
            .chunks_exact(4)
            .map(|c| Pix::from_le_bytes(c.try_into().unwrap()))
            .collect();

        Ok(TwoptTable {
            bin_value: header.bin_value,
            nside: header.nside,
            scheme: header.scheme,
            pixel_list,
            nmax: header.nmax,
            table,
        })
    }

    /// Read only the header; cheap, no decompression.
    pub fn read_header(path: &Path) -> Result<TwoptHeader, Error> {
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let mut r = BufReader::new(file);
        let (header, _) = read_header_from(&mut r, path)?;
        Ok(header)
    }

    pub fn bin_value(&self) -> f64 {
        self.bin_value
    }

    pub fn nside(&self) -> usize {
        self.nside
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn npix(&self) -> usize {
        self.pixel_list.len()
    }

    pub fn nmax(&self) -> usize {
        self.nmax
    }

    pub fn pixel_list(&self) -> &[Pix] {
        &self.pixel_list
    }

    /// The pixel behind local index `i`.
    #[inline]
    pub fn pixel(&self, i: usize) -> Pix {
        self.pixel_list[i]
    }

    #[inline]
    pub fn element(&self, i: usize, j: usize) -> Pix {
        self.table[i * self.nmax + j]
    }

    /// Row `i` of the matrix, `-1`-padded to `nmax`.
    #[inline]
    pub fn row(&self, i: usize) -> &[Pix] {
        &self.table[i * self.nmax..(i + 1) * self.nmax]
    }
}

fn read_header_from(
    r: &mut BufReader<File>,
    path: &Path,
) -> Result<(TwoptHeader, Vec<Pix>), Error> {
    let version = read_u8(r, path)?;
    if version != TABLE_FORMAT_VERSION {
        return Err(Error::format(
            path,
            format!("unsupported two-point table version {version}"),
        ));
    }
    let bin_value = read_f64(r, path)?;
    let nside = read_u64(r, path)? as usize;
    let npix = read_u64(r, path)? as usize;
    if npix > 12 * nside * nside {
        return Err(Error::format(
            path,
            format!("pixel list of {npix} exceeds the sphere at Nside = {nside}"),
        ));
    }
    let mut pixel_list = Vec::with_capacity(npix);
    for _ in 0..npix {
        pixel_list.push(read_i32(r, path)?);
    }
    let scheme_byte = read_u8(r, path)?;
    let scheme = Scheme::from_byte(scheme_byte)
        .ok_or_else(|| Error::format(path, format!("bad scheme byte {scheme_byte}")))?;
    let nmax = read_u64(r, path)? as usize;
    Ok((
        TwoptHeader {
            bin_value,
            nside,
            npix,
            scheme,
            nmax,
        },
        pixel_list,
    ))
}
