//! Streaming compression used by the two-point table payload.
//!
//! Three interchangeable variants sit behind one interface: zlib (the
//! default), xz for smaller-but-slower files, and a raw pass-through. The
//! choice is fixed per run by configuration and is deliberately not recorded
//! in the files; a producer and its consumers must agree out of band.
//!
//! [`Codec::write_buffer`] compresses a whole buffer and appends it to the
//! sink. [`Codec::read_buffer`] decompresses from the current position of the
//! source to end-of-file into a destination of known size, and fails if the
//! decompressed size does not match exactly.

use crate::error::Error;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};
use std::str::FromStr;
use xz2::read::XzDecoder;
use xz2::write::XzEncoder;

const COMPRESSION_LEVEL: u32 = 6;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Codec {
    Deflate,
    Lzma,
    Identity,
}

impl Codec {
    /// Compress `bytes` and append the result to `sink`.
    pub fn write_buffer<W: Write>(&self, sink: &mut W, bytes: &[u8]) -> Result<(), Error> {
        match self {
            Codec::Deflate => {
                let mut enc = ZlibEncoder::new(&mut *sink, Compression::new(COMPRESSION_LEVEL));
                enc.write_all(bytes)
                    .map_err(|e| Error::codec(format!("deflate failed: {e}")))?;
                enc.finish()
                    .map_err(|e| Error::codec(format!("deflate finish failed: {e}")))?;
                Ok(())
            }
            Codec::Lzma => {
                let mut enc = XzEncoder::new(&mut *sink, COMPRESSION_LEVEL);
                enc.write_all(bytes)
                    .map_err(|e| Error::codec(format!("lzma failed: {e}")))?;
                enc.finish()
                    .map_err(|e| Error::codec(format!("lzma finish failed: {e}")))?;
                Ok(())
            }
            Codec::Identity => sink
                .write_all(bytes)
                .map_err(|e| Error::codec(format!("raw write failed: {e}"))),
        }
    }

    /// Read from the current position of `source` to end-of-file and
    /// decompress into exactly `dest.len()` bytes.
    pub fn read_buffer<R: Read>(&self, source: &mut R, dest: &mut [u8]) -> Result<(), Error> {
        match self {
            Codec::Deflate => drain_into(&mut ZlibDecoder::new(&mut *source), dest),
            Codec::Lzma => drain_into(&mut XzDecoder::new(&mut *source), dest),
            // the identity reader consumes exactly dest.len() bytes
            Codec::Identity => source
                .read_exact(dest)
                .map_err(|e| Error::codec(format!("raw read failed: {e}"))),
        }
    }
}

fn drain_into(dec: &mut impl Read, dest: &mut [u8]) -> Result<(), Error> {
    dec.read_exact(dest)
        .map_err(|e| Error::codec(format!("decompression failed: {e}")))?;
    // the payload must decompress to exactly dest.len() bytes
    let mut probe = [0u8; 1];
    match dec.read(&mut probe) {
        Ok(0) => Ok(()),
        Ok(_) => Err(Error::codec(
            "decompressed payload is larger than the expected size",
        )),
        Err(e) => Err(Error::codec(format!("decompression failed: {e}"))),
    }
}

impl FromStr for Codec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "deflate" | "zlib" => Ok(Codec::Deflate),
            "lzma" | "xz" => Ok(Codec::Lzma),
            "none" | "identity" => Ok(Codec::Identity),
            other => Err(Error::config(format!(
                "unknown codec {other:?} (expected deflate, lzma, or none)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;
    use rand_xoshiro::rand_core::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;
    use std::io::Cursor;

    const ALL: [Codec; 3] = [Codec::Deflate, Codec::Lzma, Codec::Identity];

    fn roundtrip(codec: Codec, data: &[u8]) {
        let mut sink = Vec::new();
        codec.write_buffer(&mut sink, data).unwrap();
        let mut dest = vec![0u8; data.len()];
        codec
            .read_buffer(&mut Cursor::new(&sink), &mut dest)
            .unwrap();
        assert_eq!(dest, data);
    }

    #[test]
    fn roundtrip_all_variants() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(11);
        let mut noise = vec![0u8; 40_000];
        rng.fill_bytes(&mut noise);
        // compressible data too: long runs of the table padding value
        let padded: Vec<u8> = std::iter::repeat((-1i32).to_le_bytes())
            .take(10_000)
            .flatten()
            .collect();

        for codec in ALL {
            roundtrip(codec, &noise);
            roundtrip(codec, &padded);
            roundtrip(codec, &[]);
        }
    }

    #[test]
    fn length_mismatch_is_rejected() {
        // the compressing variants know the true decompressed size and must
        // reject both a short and a long destination
        for codec in [Codec::Deflate, Codec::Lzma] {
            let mut sink = Vec::new();
            codec.write_buffer(&mut sink, &[1, 2, 3, 4]).unwrap();
            let mut short = vec![0u8; 3];
            assert!(codec
                .read_buffer(&mut Cursor::new(&sink), &mut short)
                .is_err());
            let mut long = vec![0u8; 5];
            assert!(codec
                .read_buffer(&mut Cursor::new(&sink), &mut long)
                .is_err());
        }
        // the identity reader can only detect a destination that is too long
        let mut long = vec![0u8; 5];
        assert!(Codec::Identity
            .read_buffer(&mut Cursor::new(&[1u8, 2, 3, 4]), &mut long)
            .is_err());
    }

    #[test]
    fn codec_names() {
        assert_eq!("zlib".parse::<Codec>().unwrap(), Codec::Deflate);
        assert_eq!("lzma".parse::<Codec>().unwrap(), Codec::Lzma);
        assert_eq!("none".parse::<Codec>().unwrap(), Codec::Identity);
        assert!("gzip".parse::<Codec>().is_err());
    }
}
