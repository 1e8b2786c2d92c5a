//! Scalar sky maps and masks.
//!
//! A map is an ordered sequence of `f64` samples indexed by pixel, tied to an
//! `Nside` and an ordering scheme. The on-disk form is a minimal binary
//! layout (version byte, `nside`, scheme byte, pixel count, then the
//! samples), enough to feed every aggregator; the science archive format
//! stays outside this crate. Masks are ordinary maps thresholded at 0.5.

use crate::error::Error;
use crate::pixels::{Pixelization, Scheme};
use crate::util::{
    read_f64, read_u64, read_u8, write_f64, write_u64, write_u8,
};
use crate::Pix;
use rand::Rng;
use rand_distr::StandardNormal;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

const MAP_FORMAT_VERSION: u8 = 1;

#[derive(Clone, Debug)]
pub struct SkyMap {
    nside: usize,
    scheme: Scheme,
    data: Vec<f64>,
}

impl SkyMap {
    pub fn from_values(nside: usize, scheme: Scheme, data: Vec<f64>) -> Result<Self, Error> {
        if data.len() != 12 * nside * nside {
            return Err(Error::precondition(format!(
                "map with {} samples does not match Nside = {nside}",
                data.len()
            )));
        }
        Ok(SkyMap {
            nside,
            scheme,
            data,
        })
    }

    pub fn constant(nside: usize, scheme: Scheme, value: f64) -> Self {
        SkyMap {
            nside,
            scheme,
            data: vec![value; 12 * nside * nside],
        }
    }

    /// Build a map by evaluating `f` at every pixel centre.
    pub fn from_fn(
        pix: &Pixelization,
        scheme: Scheme,
        mut f: impl FnMut([f64; 3]) -> f64,
    ) -> Self {
        let data = (0..pix.npix() as Pix)
            .map(|p| f(pix.pix2vec(p, scheme)))
            .collect();
        SkyMap {
            nside: pix.nside(),
            scheme,
            data,
        }
    }

    /// A unit-variance Gaussian white-noise map; stands in for harmonic
    /// synthesis when generating Monte-Carlo batches.
    pub fn gaussian_noise(nside: usize, scheme: Scheme, rng: &mut impl Rng) -> Self {
        let data = (0..12 * nside * nside)
            .map(|_| rng.sample(StandardNormal))
            .collect();
        SkyMap {
            nside,
            scheme,
            data,
        }
    }

    pub fn nside(&self) -> usize {
        self.nside
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn npix(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn value(&self, p: Pix) -> f64 {
        self.data[p as usize]
    }

    pub fn values(&self) -> &[f64] {
        &self.data
    }

    /// Reorder into `target`, returning a copy when already there.
    pub fn to_scheme(&self, target: Scheme, pix: &Pixelization) -> SkyMap {
        if self.scheme == target {
            return self.clone();
        }
        let mut data = vec![0.0; self.data.len()];
        for p in 0..self.data.len() {
            let q = match self.scheme {
                Scheme::Nest => pix.nest2ring(p as Pix),
                Scheme::Ring => pix.ring2nest(p as Pix),
            };
            data[q as usize] = self.data[p];
        }
        SkyMap {
            nside: self.nside,
            scheme: target,
            data,
        }
    }

    /// Indices of the pixels this map keeps when read as a mask, ascending.
    pub fn mask_pixel_list(&self) -> Vec<Pix> {
        (0..self.data.len() as Pix)
            .filter(|&p| self.data[p as usize] > 0.5)
            .collect()
    }

    pub fn write_file(&self, path: &Path) -> Result<(), Error> {
        let file = File::create(path).map_err(|e| Error::io(path, e))?;
        let mut w = BufWriter::new(file);
        write_u8(&mut w, path, MAP_FORMAT_VERSION)?;
        write_u64(&mut w, path, self.nside as u64)?;
        write_u8(&mut w, path, self.scheme.to_byte())?;
        write_u64(&mut w, path, self.data.len() as u64)?;
        for &v in &self.data {
            write_f64(&mut w, path, v)?;
        }
        w.flush().map_err(|e| Error::io(path, e))
    }

    pub fn read_file(path: &Path) -> Result<Self, Error> {
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let mut r = BufReader::new(file);
        let version = read_u8(&mut r, path)?;
        if version != MAP_FORMAT_VERSION {
            return Err(Error::format(
                path,
                format!("unsupported map format version {version}"),
            ));
        }
        let nside = read_u64(&mut r, path)? as usize;
        let scheme_byte = read_u8(&mut r, path)?;
        let scheme = Scheme::from_byte(scheme_byte)
            .ok_or_else(|| Error::format(path, format!("bad scheme byte {scheme_byte}")))?;
        let npix = read_u64(&mut r, path)? as usize;
        if npix != 12 * nside * nside {
            return Err(Error::format(
                path,
                format!("pixel count {npix} does not match Nside = {nside}"),
            ));
        }
        let mut data = Vec::with_capacity(npix);
        for _ in 0..npix {
            data.push(read_f64(&mut r, path)?);
        }
        Ok(SkyMap {
            nside,
            scheme,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_xoshiro::rand_core::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.dat");
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(5);
        let map = SkyMap::gaussian_noise(2, Scheme::Nest, &mut rng);
        map.write_file(&path).unwrap();
        let back = SkyMap::read_file(&path).unwrap();
        assert_eq!(back.nside(), 2);
        assert_eq!(back.scheme(), Scheme::Nest);
        assert_eq!(back.values(), map.values());
    }

    #[test]
    fn truncated_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.dat");
        let map = SkyMap::constant(1, Scheme::Ring, 1.0);
        map.write_file(&path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 4]).unwrap();
        assert!(SkyMap::read_file(&path).is_err());
    }

    #[test]
    fn scheme_conversion_permutes_values() {
        let pix = Pixelization::new(4).unwrap();
        let nest = SkyMap::from_fn(&pix, Scheme::Nest, |v| v[2] + 2.0 * v[0]);
        let ring = nest.to_scheme(Scheme::Ring, &pix);
        for p in 0..pix.npix() as Pix {
            assert_eq!(ring.value(pix.nest2ring(p)), nest.value(p));
        }
        let back = ring.to_scheme(Scheme::Nest, &pix);
        assert_eq!(back.values(), nest.values());
    }

    #[test]
    fn mask_threshold() {
        let mask = SkyMap::from_values(
            1,
            Scheme::Nest,
            vec![1.0, 0.0, 0.6, 0.5, 0.4, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.51],
        )
        .unwrap();
        assert_eq!(mask.mask_pixel_list(), vec![0, 2, 5, 11]);
    }
}
