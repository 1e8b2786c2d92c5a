//! N-point correlation aggregation.
//!
//! Every function here averages a product of map samples over an enumerated
//! tuple set: pixel pairs of a two-point table, records of a triangle list,
//! or the replayed contents of a quadrilateral list file. The four-point
//! walkers keep one running accumulator per nesting level so each blob is
//! traversed once. Masked variants multiply every sample by its 0/1 mask
//! weight and normalize by the summed weight products instead of the tuple
//! count. A bin with no tuples (or fully masked) is not an error: the
//! correlation is defined as 0 and a warning is logged.
//!
//! Aggregators insist that the map, mask, and tuple source agree on `Nside`
//! and ordering scheme; a mismatch is a precondition error.

use crate::error::Error;
use crate::map::SkyMap;
use crate::pixels::Scheme;
use crate::quadfile::QuadFile;
use crate::triangles::TriangleList;
use crate::twopt::TwoptTable;
use crate::Pix;
use std::path::Path;
use tracing::warn;

fn check_footing(map: &SkyMap, nside: usize, scheme: Scheme, what: &str) -> Result<(), Error> {
    if map.nside() != nside || map.scheme() != scheme {
        return Err(Error::precondition(format!(
            "map (Nside {}, {:?}) does not match {what} (Nside {}, {:?})",
            map.nside(),
            map.scheme(),
            nside,
            scheme
        )));
    }
    Ok(())
}

/// 0/1 mask weight of a pixel.
#[inline]
fn mask_weight(mask: &SkyMap, p: Pix) -> f64 {
    if mask.value(p) > 0.5 {
        1.0
    } else {
        0.0
    }
}

/// Mean of `m[p_i]·m[p_j]` over the unordered pairs of a two-point table.
pub fn two_point(map: &SkyMap, table: &TwoptTable) -> Result<f64, Error> {
    check_footing(map, table.nside(), table.scheme(), "two-point table")?;
    let mut npair: u64 = 0;
    let mut total = 0.0;
    for i in 0..table.npix() {
        let p1 = table.pixel(i);
        let mut row_sum = 0.0;
        for &k in table.row(i) {
            if k == -1 {
                break;
            }
            let p2 = table.pixel(k as usize);
            if p1 > p2 {
                // the table is symmetric; count each pair once
                continue;
            }
            npair += 1;
            row_sum += map.value(p2);
        }
        total += map.value(p1) * row_sum;
    }
    if npair == 0 {
        warn!(bin_value = table.bin_value(), "bin holds no pixel pairs");
        return Ok(0.0);
    }
    Ok(total / npair as f64)
}

pub fn two_point_masked(map: &SkyMap, mask: &SkyMap, table: &TwoptTable) -> Result<f64, Error> {
    check_footing(map, table.nside(), table.scheme(), "two-point table")?;
    check_footing(mask, table.nside(), table.scheme(), "two-point table")?;
    let mut weight = 0.0;
    let mut total = 0.0;
    for i in 0..table.npix() {
        let p1 = table.pixel(i);
        let w1 = mask_weight(mask, p1);
        let mut row_sum = 0.0;
        let mut row_weight = 0.0;
        for &k in table.row(i) {
            if k == -1 {
                break;
            }
            let p2 = table.pixel(k as usize);
            if p1 > p2 {
                continue;
            }
            let w2 = mask_weight(mask, p2);
            row_sum += w2 * map.value(p2);
            row_weight += w2;
        }
        total += w1 * map.value(p1) * row_sum;
        weight += w1 * row_weight;
    }
    if weight <= 0.0 {
        warn!(bin_value = table.bin_value(), "bin is fully masked");
        return Ok(0.0);
    }
    Ok(total / weight)
}

/// Mean of `m[p₁]·m[p₂]·m[p₃]` over a triangle list.
pub fn three_point(map: &SkyMap, triangles: &TriangleList) -> Result<f64, Error> {
    check_footing(map, triangles.nside(), triangles.scheme(), "triangle list")?;
    if triangles.is_empty() {
        warn!("triangle list is empty");
        return Ok(0.0);
    }
    let mut total = 0.0;
    for i in 0..triangles.len() {
        let [p1, p2, p3] = triangles.get(i);
        total += map.value(p1) * map.value(p2) * map.value(p3);
    }
    Ok(total / triangles.len() as f64)
}

pub fn three_point_masked(
    map: &SkyMap,
    mask: &SkyMap,
    triangles: &TriangleList,
) -> Result<f64, Error> {
    check_footing(map, triangles.nside(), triangles.scheme(), "triangle list")?;
    check_footing(mask, triangles.nside(), triangles.scheme(), "triangle list")?;
    let mut total = 0.0;
    let mut weight = 0.0;
    for i in 0..triangles.len() {
        let [p1, p2, p3] = triangles.get(i);
        let w = mask_weight(mask, p1) * mask_weight(mask, p2) * mask_weight(mask, p3);
        total += w * map.value(p1) * map.value(p2) * map.value(p3);
        weight += w;
    }
    if weight <= 0.0 {
        warn!("triangle list is empty or fully masked");
        return Ok(0.0);
    }
    Ok(total / weight)
}

/// Cursor over the values of one blob; running off the end means the file
/// lied about its structure.
struct BlobCursor<'a> {
    values: &'a [Pix],
    path: &'a Path,
    ind: usize,
}

impl<'a> BlobCursor<'a> {
    fn new(values: &'a [Pix], path: &'a Path) -> Self {
        BlobCursor {
            values,
            path,
            ind: 0,
        }
    }

    #[inline]
    fn take(&mut self) -> Result<Pix, Error> {
        let v = self
            .values
            .get(self.ind)
            .copied()
            .ok_or_else(|| Error::format(self.path, "quadrilateral blob ends mid-record"))?;
        self.ind += 1;
        Ok(v)
    }
}

/// Mean of `m[p₀]·m[p₁]·m[p₂]·m[p₃]` over a quadrilateral list file.
pub fn four_point(map: &SkyMap, quads: &mut QuadFile) -> Result<f64, Error> {
    check_footing(map, quads.nside(), quads.scheme(), "quadrilateral list")?;
    let path = quads.path().to_path_buf();
    let mut nquad: u64 = 0;
    let mut c0 = 0.0;
    while let Some(values) = quads.next_blob()? {
        let mut cur = BlobCursor::new(values, &path);
        let p0 = cur.take()?;
        let n1 = cur.take()?;
        let mut c1 = 0.0;
        for _ in 0..n1 {
            let p1 = cur.take()?;
            let n2 = cur.take()?;
            let mut c2 = 0.0;
            for _ in 0..n2 {
                let p2 = cur.take()?;
                let n3 = cur.take()?;
                nquad += n3 as u64;
                let mut c3 = 0.0;
                for _ in 0..n3 {
                    c3 += map.value(cur.take()?);
                }
                c2 += map.value(p2) * c3;
            }
            c1 += map.value(p1) * c2;
        }
        c0 += map.value(p0) * c1;
    }
    if nquad == 0 {
        warn!(bin_value = quads.bin_value(), "bin holds no quadrilaterals");
        return Ok(0.0);
    }
    Ok(c0 / nquad as f64)
}

pub fn four_point_masked(
    map: &SkyMap,
    mask: &SkyMap,
    quads: &mut QuadFile,
) -> Result<f64, Error> {
    check_footing(map, quads.nside(), quads.scheme(), "quadrilateral list")?;
    check_footing(mask, quads.nside(), quads.scheme(), "quadrilateral list")?;
    let path = quads.path().to_path_buf();
    let mut c0 = 0.0;
    let mut w0 = 0.0;
    while let Some(values) = quads.next_blob()? {
        let mut cur = BlobCursor::new(values, &path);
        let p0 = cur.take()?;
        let n1 = cur.take()?;
        let mut c1 = 0.0;
        let mut w1 = 0.0;
        for _ in 0..n1 {
            let p1 = cur.take()?;
            let n2 = cur.take()?;
            let mut c2 = 0.0;
            let mut w2 = 0.0;
            for _ in 0..n2 {
                let p2 = cur.take()?;
                let n3 = cur.take()?;
                let mut c3 = 0.0;
                let mut w3 = 0.0;
                for _ in 0..n3 {
                    let p3 = cur.take()?;
                    let w = mask_weight(mask, p3);
                    c3 += w * map.value(p3);
                    w3 += w;
                }
                c2 += mask_weight(mask, p2) * map.value(p2) * c3;
                w2 += mask_weight(mask, p2) * w3;
            }
            c1 += mask_weight(mask, p1) * map.value(p1) * c2;
            w1 += mask_weight(mask, p1) * w2;
        }
        c0 += mask_weight(mask, p0) * map.value(p0) * c1;
        w0 += mask_weight(mask, p0) * w1;
    }
    if w0 <= 0.0 {
        warn!(
            bin_value = quads.bin_value(),
            "bin holds no unmasked quadrilaterals"
        );
        return Ok(0.0);
    }
    Ok(c0 / w0)
}

/// The four-point correlation of several maps in one pass over the file.
///
/// The per-level accumulators become arrays indexed by map; the traversal
/// order of the samples matches [`four_point`] map by map.
pub fn four_point_batch(maps: &[SkyMap], quads: &mut QuadFile) -> Result<Vec<f64>, Error> {
    let Some(first) = maps.first() else {
        return Err(Error::precondition("no maps supplied to the batch"));
    };
    for map in maps {
        check_footing(map, quads.nside(), quads.scheme(), "quadrilateral list")?;
        if map.scheme() != first.scheme() {
            return Err(Error::precondition("batch maps disagree on the scheme"));
        }
    }
    let nmaps = maps.len();
    let mut nquad: u64 = 0;
    let mut c0 = vec![0.0; nmaps];
    let mut c1 = vec![0.0; nmaps];
    let mut c2 = vec![0.0; nmaps];
    let mut c3 = vec![0.0; nmaps];
    let path = quads.path().to_path_buf();
    while let Some(values) = quads.next_blob()? {
        let mut cur = BlobCursor::new(values, &path);
        let p0 = cur.take()?;
        let n1 = cur.take()?;
        c1.fill(0.0);
        for _ in 0..n1 {
            let p1 = cur.take()?;
            let n2 = cur.take()?;
            c2.fill(0.0);
            for _ in 0..n2 {
                let p2 = cur.take()?;
                let n3 = cur.take()?;
                nquad += n3 as u64;
                c3.fill(0.0);
                for _ in 0..n3 {
                    let p3 = cur.take()?;
                    for (j, map) in maps.iter().enumerate() {
                        c3[j] += map.value(p3);
                    }
                }
                for (j, map) in maps.iter().enumerate() {
                    c2[j] += map.value(p2) * c3[j];
                }
            }
            for (j, map) in maps.iter().enumerate() {
                c1[j] += map.value(p1) * c2[j];
            }
        }
        for (j, map) in maps.iter().enumerate() {
            c0[j] += map.value(p0) * c1[j];
        }
    }
    if nquad == 0 {
        warn!(bin_value = quads.bin_value(), "bin holds no quadrilaterals");
        return Ok(vec![0.0; nmaps]);
    }
    for v in &mut c0 {
        *v /= nquad as f64;
    }
    Ok(c0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Codec;
    use crate::twopt::TwoptTableBuilder;

    #[test]
    fn two_point_of_constant_map_is_its_square() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.dat");
        let mut b = TwoptTableBuilder::new(1, Scheme::Nest, (0..12).collect(), 0.0);
        b.add_pair(0, 1);
        b.add_pair(0, 2);
        b.add_pair(3, 7);
        b.write_file(&path, Codec::Identity).unwrap();
        let t = TwoptTable::read_file(&path, Codec::Identity).unwrap();

        let map = SkyMap::constant(1, Scheme::Nest, 2.0);
        assert_eq!(two_point(&map, &t).unwrap(), 4.0);

        let mask = SkyMap::constant(1, Scheme::Nest, 1.0);
        assert_eq!(two_point_masked(&map, &mask, &t).unwrap(), 4.0);
    }

    #[test]
    fn empty_table_yields_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.dat");
        TwoptTableBuilder::new(1, Scheme::Nest, (0..12).collect(), 0.0)
            .write_file(&path, Codec::Identity)
            .unwrap();
        let t = TwoptTable::read_file(&path, Codec::Identity).unwrap();
        let map = SkyMap::constant(1, Scheme::Nest, 3.0);
        assert_eq!(two_point(&map, &t).unwrap(), 0.0);
    }

    #[test]
    fn footing_mismatch_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.dat");
        TwoptTableBuilder::new(2, Scheme::Nest, (0..48).collect(), 0.0)
            .write_file(&path, Codec::Identity)
            .unwrap();
        let t = TwoptTable::read_file(&path, Codec::Identity).unwrap();
        let map = SkyMap::constant(1, Scheme::Nest, 1.0);
        assert!(two_point(&map, &t).is_err());
    }
}
