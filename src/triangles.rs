//! Triangle enumeration from two-point tables.
//!
//! All three enumerators walk rows of two-point tables and intersect pairs of
//! sorted, `-1`-terminated rows with monotone cursors. They differ only in
//! their loop structure:
//!
//! - [`GeneralTriangles`] takes three tables (one per edge) and produces
//!   every ordered triple, including all permutations when the tables
//!   coincide;
//! - [`IsoscelesTriangles`] takes the shared-edge table and the odd-edge
//!   table, and deduplicates with `p₁ < p₂`;
//! - [`EquilateralTriangles`] takes a single table and keeps the vertices
//!   strictly increasing, `p₁ < p₂ < p₃`, the ordering the quadrilateral
//!   search relies on.
//!
//! Each record stores the actual pixel values together with its handedness:
//! RIGHT when `(v₁ × v₂) · v₃ > 0` for the pixel-centre unit vectors in
//! stored order, LEFT otherwise.

use crate::error::Error;
use crate::pixels::{Pixelization, Scheme};
use crate::twopt::TwoptTable;
use crate::Pix;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Orientation {
    Right,
    Left,
}

/// Handedness of an ordered triple of unit vectors.
pub fn orientation_of(n1: &[f64; 3], n2: &[f64; 3], n3: &[f64; 3]) -> Orientation {
    let cross = [
        n1[1] * n2[2] - n1[2] * n2[1],
        n1[2] * n2[0] - n1[0] * n2[2],
        n1[0] * n2[1] - n1[1] * n2[0],
    ];
    let val = cross[0] * n3[0] + cross[1] * n3[1] + cross[2] * n3[2];
    if val > 0.0 {
        Orientation::Right
    } else {
        Orientation::Left
    }
}

/// Collect the values present in both rows. Rows are ascending and `-1`
/// terminated, so a linear merge suffices.
fn append_matches(a: &[Pix], b: &[Pix], out: &mut Vec<Pix>) {
    let (mut ia, mut ib) = (0, 0);
    while ia < a.len() && ib < b.len() && a[ia] != -1 && b[ib] != -1 {
        match a[ia].cmp(&b[ib]) {
            std::cmp::Ordering::Equal => {
                out.push(a[ia]);
                ia += 1;
                ib += 1;
            }
            std::cmp::Ordering::Less => ia += 1,
            std::cmp::Ordering::Greater => ib += 1,
        }
    }
}

/// As [`append_matches`], but skip both rows past values below `minval`
/// first. Used to keep equilateral vertices strictly increasing.
fn append_matches_above(minval: Pix, a: &[Pix], b: &[Pix], out: &mut Vec<Pix>) {
    let mut ia = 0;
    while ia < a.len() && a[ia] != -1 && a[ia] < minval {
        ia += 1;
    }
    let mut ib = 0;
    while ib < b.len() && b[ib] != -1 && b[ib] < minval {
        ib += 1;
    }
    append_matches(&a[ia..], &b[ib..], out);
}

/// Shared storage for the three enumerators.
pub struct TriangleList {
    edge_length: [f64; 3],
    nside: usize,
    scheme: Scheme,
    tris: Vec<[Pix; 3]>,
    orient: Vec<Orientation>,
}

impl TriangleList {
    fn new(edge_length: [f64; 3], nside: usize, scheme: Scheme) -> Self {
        TriangleList {
            edge_length,
            nside,
            scheme,
            tris: Vec::new(),
            orient: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.tris.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tris.is_empty()
    }

    #[inline]
    pub fn get(&self, i: usize) -> [Pix; 3] {
        self.tris[i]
    }

    /// Vertex `j` of triangle `i`.
    #[inline]
    pub fn vertex(&self, i: usize, j: usize) -> Pix {
        self.tris[i][j]
    }

    #[inline]
    pub fn orientation(&self, i: usize) -> Orientation {
        self.orient[i]
    }

    /// The bin cosines of the edges, in the order (1↔2, 2↔3, 3↔1).
    pub fn edge_lengths(&self) -> &[f64; 3] {
        &self.edge_length
    }

    pub fn nside(&self) -> usize {
        self.nside
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    fn push(&mut self, pts: [Pix; 3], vecs: &[[f64; 3]], locals: [usize; 3]) {
        self.orient.push(orientation_of(
            &vecs[locals[0]],
            &vecs[locals[1]],
            &vecs[locals[2]],
        ));
        self.tris.push(pts);
    }
}

/// Pixel-centre vectors keyed by local index, rebuilt per enumeration.
fn local_vectors(t: &TwoptTable) -> Result<Vec<[f64; 3]>, Error> {
    let pix = Pixelization::new(t.nside())?;
    Ok(t.pixel_list()
        .iter()
        .map(|&p| pix.pix2vec(p, t.scheme()))
        .collect())
}

fn check_same_footing(a: &TwoptTable, b: &TwoptTable) -> Result<(), Error> {
    if a.nside() != b.nside() || a.scheme() != b.scheme() {
        return Err(Error::precondition(format!(
            "two-point tables disagree on the pixelization: Nside {} vs {}",
            a.nside(),
            b.nside()
        )));
    }
    if a.pixel_list() != b.pixel_list() {
        return Err(Error::precondition(
            "two-point tables were built over different pixel lists",
        ));
    }
    Ok(())
}

/// All triangles with one edge in each of three tables.
///
/// The tables are assumed to belong to distinct bins; fed the same bin three
/// times this produces every vertex permutation as a separate record.
pub struct GeneralTriangles {
    list: TriangleList,
}

impl GeneralTriangles {
    pub fn find(t1: &TwoptTable, t2: &TwoptTable, t3: &TwoptTable) -> Result<Self, Error> {
        check_same_footing(t1, t2)?;
        check_same_footing(t1, t3)?;
        let vecs = local_vectors(t1)?;
        let mut list = TriangleList::new(
            [t1.bin_value(), t3.bin_value(), t2.bin_value()],
            t1.nside(),
            t1.scheme(),
        );

        let mut common = Vec::new();
        for i1 in 0..t1.npix() {
            for &i2 in t1.row(i1) {
                if i2 == -1 {
                    break;
                }
                common.clear();
                append_matches(t2.row(i1), t3.row(i2 as usize), &mut common);
                for &i3 in &common {
                    list.push(
                        [
                            t1.pixel(i1),
                            t1.pixel(i2 as usize),
                            t1.pixel(i3 as usize),
                        ],
                        &vecs,
                        [i1, i2 as usize, i3 as usize],
                    );
                }
            }
        }
        Ok(GeneralTriangles { list })
    }

    pub fn as_list(&self) -> &TriangleList {
        &self.list
    }
}

/// Unique triangles whose edges 2↔3 and 3↔1 share one bin.
pub struct IsoscelesTriangles {
    list: TriangleList,
}

impl IsoscelesTriangles {
    /// `shared` is the table of the two equal sides, `odd` the table of edge
    /// 1↔2.
    pub fn find(shared: &TwoptTable, odd: &TwoptTable) -> Result<Self, Error> {
        check_same_footing(shared, odd)?;
        let vecs = local_vectors(odd)?;
        let mut list = TriangleList::new(
            [odd.bin_value(), shared.bin_value(), shared.bin_value()],
            odd.nside(),
            odd.scheme(),
        );

        let mut common = Vec::new();
        for i1 in 0..odd.npix() {
            let p1 = odd.pixel(i1);
            for &i2 in odd.row(i1) {
                if i2 == -1 {
                    break;
                }
                let p2 = odd.pixel(i2 as usize);
                if p2 < p1 {
                    // the reversed pair names the same triangle
                    continue;
                }
                common.clear();
                append_matches(shared.row(i1), shared.row(i2 as usize), &mut common);
                for &i3 in &common {
                    list.push(
                        [p1, p2, odd.pixel(i3 as usize)],
                        &vecs,
                        [i1, i2 as usize, i3 as usize],
                    );
                }
            }
        }
        Ok(IsoscelesTriangles { list })
    }

    pub fn as_list(&self) -> &TriangleList {
        &self.list
    }
}

/// Unique triangles with all three edges in one bin, stored with strictly
/// increasing vertices.
pub struct EquilateralTriangles {
    list: TriangleList,
}

impl EquilateralTriangles {
    pub fn find(t: &TwoptTable) -> Result<Self, Error> {
        let vecs = local_vectors(t)?;
        let mut list = TriangleList::new(
            [t.bin_value(), t.bin_value(), t.bin_value()],
            t.nside(),
            t.scheme(),
        );

        let mut common = Vec::new();
        for i1 in 0..t.npix() {
            let p1 = t.pixel(i1);
            for &i2 in t.row(i1) {
                if i2 == -1 {
                    break;
                }
                let p2 = t.pixel(i2 as usize);
                if p2 < p1 {
                    continue;
                }
                common.clear();
                // bounding below by i2 keeps the third vertex above the second
                append_matches_above(i2, t.row(i1), t.row(i2 as usize), &mut common);
                for &i3 in &common {
                    list.push(
                        [p1, p2, t.pixel(i3 as usize)],
                        &vecs,
                        [i1, i2 as usize, i3 as usize],
                    );
                }
            }
        }
        Ok(EquilateralTriangles { list })
    }

    pub fn as_list(&self) -> &TriangleList {
        &self.list
    }
}
