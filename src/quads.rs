//! Rhombic quadrilateral enumeration.
//!
//! A rhombic quadrilateral is two equilateral triangles of the same bin
//! joined along one side. The equilateral triangle list is sorted by
//! `(p₁, p₂, p₃)` with strictly increasing vertices, so every rhombus is
//! discovered exactly once: the lexicographically earlier triangle of the
//! pair serves as the base, and a single forward sweep from it visits every
//! companion sharing an edge, grouped into six scanning patterns by which of
//! the companion's vertices match which base vertices. The orientation
//! comparisons keep only companions whose free vertex lies on the far side of
//! the shared edge; a matching pair on the same side is a fold, not a
//! rhombus.
//!
//! [`RhombicQuads`] yields, per base triangle, the list of fourth points.
//! The order of `pts` is the stored order of the base; the orientation of the
//! quadrilateral itself is not preserved. A skip list indexed by pixel value
//! makes it cheap to start the search at the first base triangle with a given
//! leading vertex, which is what the full-sky driver
//! [`RhombicQuadsFullSky`] exploits: it enumerates representatives whose
//! leading vertex lies in one polar and one equatorial base tile and expands
//! each through the grid's rotation and reflection group: eight images for
//! the polar class, sixteen for the equatorial class. Images are emitted as
//! they are generated; duplicates are allowed and left to the consumer.

use crate::error::Error;
use crate::pixels::{
    PixelTransform, Pixelization, Scheme, EQUATORIAL_BASE_TILE, POLAR_BASE_TILE,
};
use crate::triangles::EquilateralTriangles;
use crate::Pix;

/// Incremental rhombus search over an equilateral triangle list.
pub struct RhombicQuads<'a> {
    tris: &'a EquilateralTriangles,
    /// `skip[p]` is the first list index whose leading vertex is `p`,
    /// back-filled for absent pixels so lookups land on the next present one.
    skip: Vec<usize>,
    ind_curr: usize,
    /// inclusive upper bound on the leading vertex of a base triangle
    pix_end: Pix,
}

impl<'a> RhombicQuads<'a> {
    pub fn new(tris: &'a EquilateralTriangles) -> Result<Self, Error> {
        let list = tris.as_list();
        let npix = 12 * list.nside() * list.nside();
        // skip[p] = first index whose leading vertex is >= p; trailing absent
        // pixels land past the end of the list
        let mut skip = vec![usize::MAX; npix];
        for j in (0..list.len()).rev() {
            skip[list.vertex(j, 0) as usize] = j;
        }
        let mut next = list.len();
        for ind in (0..npix).rev() {
            if skip[ind] == usize::MAX {
                skip[ind] = next;
            } else {
                next = skip[ind];
            }
        }

        let mut q = RhombicQuads {
            tris,
            skip,
            ind_curr: 0,
            pix_end: 0,
        };
        q.seek_all();
        Ok(q)
    }

    /// Restart, stepping through every base triangle.
    pub fn seek_all(&mut self) {
        self.ind_curr = 0;
        self.pix_end = self.skip.len() as Pix;
    }

    /// Restart, visiting only base triangles whose leading vertex is `p`.
    pub fn seek_pixel(&mut self, p: Pix) {
        self.ind_curr = self.skip[p as usize];
        self.pix_end = p;
    }

    pub fn nside(&self) -> usize {
        self.tris.as_list().nside()
    }

    pub fn scheme(&self) -> Scheme {
        self.tris.as_list().scheme()
    }

    /// Advance to the next base triangle, filling `pts` with its vertices
    /// and `third` with every fourth point completing a rhombus. The third
    /// list may come back empty. Returns `false` once the search is done.
    pub fn next(&mut self, pts: &mut [Pix; 3], third: &mut Vec<Pix>) -> bool {
        let t = self.tris.as_list();
        let n = t.len();
        // the last triangle has no companions after it
        if self.ind_curr + 1 >= n || t.vertex(self.ind_curr, 0) > self.pix_end {
            return false;
        }
        third.clear();
        *pts = t.get(self.ind_curr);
        let o = t.orientation(self.ind_curr);
        let mut j = self.ind_curr + 1;

        // companions sharing our leading edge (p0, p1); the fourth point is
        // their third vertex
        while j < n && t.vertex(j, 1) == pts[1] && t.vertex(j, 0) == pts[0] {
            if o != t.orientation(j) {
                third.push(t.vertex(j, 2));
            }
            j += 1;
        }
        // companions (p0, d, p2) sharing the edge (p0, p2), with d below p2
        while j < n && t.vertex(j, 1) < pts[2] && t.vertex(j, 0) == pts[0] {
            if o != t.orientation(j) && t.vertex(j, 2) == pts[2] {
                third.push(t.vertex(j, 1));
            }
            j += 1;
        }
        // companions (p0, p2, d) sharing the edge (p0, p2), with d above p2
        while j < n && t.vertex(j, 1) == pts[2] && t.vertex(j, 0) == pts[0] {
            if o == t.orientation(j) {
                third.push(t.vertex(j, 2));
            }
            j += 1;
        }
        // companions (d, p1, p2) whose leading vertex sits between p0 and p1
        while j < n && t.vertex(j, 0) < pts[1] {
            let lead = t.vertex(j, 0);
            while j < n && t.vertex(j, 1) < pts[1] && t.vertex(j, 0) == lead {
                j += 1;
            }
            while j < n && t.vertex(j, 1) == pts[1] && t.vertex(j, 0) == lead {
                if o != t.orientation(j) && t.vertex(j, 2) == pts[2] {
                    third.push(lead);
                }
                j += 1;
            }
            while j < n && t.vertex(j, 0) == lead {
                j += 1;
            }
        }
        // companions (p1, d, p2) sharing the edge (p1, p2), with d below p2
        while j < n && t.vertex(j, 1) < pts[2] && t.vertex(j, 0) == pts[1] {
            if o == t.orientation(j) && t.vertex(j, 2) == pts[2] {
                third.push(t.vertex(j, 1));
            }
            j += 1;
        }
        // companions (p1, p2, d) sharing the edge (p1, p2), with d above p2
        while j < n && t.vertex(j, 1) == pts[2] && t.vertex(j, 0) == pts[1] {
            if o != t.orientation(j) {
                third.push(t.vertex(j, 2));
            }
            j += 1;
        }

        self.ind_curr += 1;
        true
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum BaseClass {
    /// expanded by rotations and the equator reflection: 8 images
    Polar,
    /// also needs the meridian reflection: 16 images
    Equatorial,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Op {
    FindQuads,
    Shift,
    ReflectA,
    ReflectB,
    ReflectAB,
}

/// Full-sky rhombus enumeration by symmetry expansion.
///
/// One call to [`RhombicQuadsFullSky::next`] performs exactly one transition
/// of the state machine: either it advances the underlying single-pixel
/// search to the next representative with at least one fourth point, or it
/// emits the next image of the current representative.
pub struct RhombicQuadsFullSky<'a> {
    inner: RhombicQuads<'a>,
    trans: PixelTransform,
    class: BaseClass,
    pixlist: Vec<Pix>,
    pix_ind: usize,
    op: Op,
    optcount: u8,
    pts_saved: [Pix; 3],
    third_saved: Vec<Pix>,
    pts_latest: [Pix; 3],
    third_latest: Vec<Pix>,
}

impl<'a> RhombicQuadsFullSky<'a> {
    pub fn new(tris: &'a EquilateralTriangles) -> Result<Self, Error> {
        let list = tris.as_list();
        let pix = Pixelization::new(list.nside())?;
        let trans = PixelTransform::new(pix, list.scheme());
        let pixlist = pix.base_tile_pixels(POLAR_BASE_TILE, list.scheme());
        let mut inner = RhombicQuads::new(tris)?;
        inner.seek_pixel(pixlist[0]);
        Ok(RhombicQuadsFullSky {
            inner,
            trans,
            class: BaseClass::Polar,
            pixlist,
            pix_ind: 0,
            op: Op::FindQuads,
            optcount: 0,
            pts_saved: [0; 3],
            third_saved: Vec::new(),
            pts_latest: [0; 3],
            third_latest: Vec::new(),
        })
    }

    /// Move the single-pixel search to the next representative that has at
    /// least one fourth point, crossing into the equatorial class when the
    /// polar tile is exhausted.
    fn advance_base(&mut self) -> bool {
        loop {
            if self.inner.next(&mut self.pts_saved, &mut self.third_saved) {
                if !self.third_saved.is_empty() {
                    return true;
                }
                continue;
            }
            self.pix_ind += 1;
            if self.pix_ind >= self.pixlist.len() {
                if self.class == BaseClass::Equatorial {
                    return false;
                }
                self.class = BaseClass::Equatorial;
                let pix = Pixelization::new(self.inner.nside()).expect("validated nside");
                self.pixlist = pix.base_tile_pixels(EQUATORIAL_BASE_TILE, self.inner.scheme());
                self.pix_ind = 0;
            }
            self.inner.seek_pixel(self.pixlist[self.pix_ind]);
        }
    }

    fn emit(&self, pts: &mut [Pix; 3], third: &mut Vec<Pix>) {
        *pts = self.pts_latest;
        third.clear();
        third.extend_from_slice(&self.third_latest);
    }

    pub fn next(&mut self, pts: &mut [Pix; 3], third: &mut Vec<Pix>) -> bool {
        match self.op {
            Op::FindQuads => {
                if !self.advance_base() {
                    return false;
                }
                self.pts_latest = self.pts_saved;
                self.third_latest = self.third_saved.clone();
                self.op = Op::Shift;
                self.optcount = 0;
            }
            Op::Shift => {
                self.trans.shift_all(&mut self.pts_latest);
                self.trans.shift_all(&mut self.third_latest);
                self.optcount += 1;
                self.op = match (self.optcount, self.class) {
                    (3, _) => Op::ReflectA,
                    (7, BaseClass::Polar) => Op::FindQuads,
                    (7, BaseClass::Equatorial) => Op::ReflectB,
                    (11, _) => Op::ReflectAB,
                    (15, _) => Op::FindQuads,
                    _ => Op::Shift,
                };
            }
            Op::ReflectA => {
                self.pts_latest = self.pts_saved;
                self.third_latest = self.third_saved.clone();
                self.trans.reflect_z0_all(&mut self.pts_latest);
                self.trans.reflect_z0_all(&mut self.third_latest);
                self.optcount += 1;
                self.op = Op::Shift;
            }
            Op::ReflectB => {
                self.pts_latest = self.pts_saved;
                self.third_latest = self.third_saved.clone();
                self.trans.reflect_zaxis_all(&mut self.pts_latest);
                self.trans.reflect_zaxis_all(&mut self.third_latest);
                self.optcount += 1;
                self.op = Op::Shift;
            }
            Op::ReflectAB => {
                self.pts_latest = self.pts_saved;
                self.third_latest = self.third_saved.clone();
                self.trans.reflect_zaxis_all(&mut self.pts_latest);
                self.trans.reflect_zaxis_all(&mut self.third_latest);
                self.trans.reflect_z0_all(&mut self.pts_latest);
                self.trans.reflect_z0_all(&mut self.third_latest);
                self.optcount += 1;
                self.op = Op::Shift;
            }
        }
        self.emit(pts, third);
        true
    }
}
