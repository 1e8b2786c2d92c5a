//! Cross-checks of the triangle enumerators against brute-force scans over
//! all pixel triples.

mod common;

use common::{dot, nest_vectors};
use npointstat::bins::CosBins;
use npointstat::codec::Codec;
use npointstat::pixels::Scheme;
use npointstat::triangles::{
    orientation_of, EquilateralTriangles, GeneralTriangles, IsoscelesTriangles,
};
use npointstat::Pix;
use std::collections::BTreeSet;

const NSIDE: usize = 2;

fn centres() -> Vec<f64> {
    vec![-0.5, 0.5, 0.9]
}

#[test]
fn equilateral_enumeration_matches_brute_force() {
    let dir = tempfile::tempdir().unwrap();
    let bins = CosBins::from_centres(centres()).unwrap();
    let tables = common::build_full_sky_tables(dir.path(), NSIDE, &bins, Codec::Deflate);
    let vecs = nest_vectors(NSIDE);
    let npix = vecs.len();

    let mut found_any = false;
    for (b, table) in tables.iter().enumerate() {
        let triangles = EquilateralTriangles::find(table).unwrap();
        let list = triangles.as_list();
        assert_eq!(list.scheme(), Scheme::Nest);
        assert_eq!(list.edge_lengths(), &[bins.centre(b); 3]);

        // strictly increasing vertices, and the stored orientation is the
        // sign of the triple product of the centre vectors in stored order
        let mut enumerated = BTreeSet::new();
        for i in 0..list.len() {
            let [p1, p2, p3] = list.get(i);
            assert!(p1 < p2 && p2 < p3);
            assert_eq!(
                list.orientation(i),
                orientation_of(
                    &vecs[p1 as usize],
                    &vecs[p2 as usize],
                    &vecs[p3 as usize]
                ),
            );
            // stored once each
            assert!(enumerated.insert([p1, p2, p3]));
        }

        let mut brute = BTreeSet::new();
        for x in 0..npix {
            for y in (x + 1)..npix {
                if bins.bin_index(dot(&vecs[x], &vecs[y])) != Some(b) {
                    continue;
                }
                for z in (y + 1)..npix {
                    if bins.bin_index(dot(&vecs[x], &vecs[z])) == Some(b)
                        && bins.bin_index(dot(&vecs[y], &vecs[z])) == Some(b)
                    {
                        brute.insert([x as Pix, y as Pix, z as Pix]);
                    }
                }
            }
        }
        assert_eq!(enumerated, brute, "bin {b}");
        found_any |= !brute.is_empty();
    }
    // the schedule is chosen so the check is not vacuous
    assert!(found_any);
}

#[test]
fn general_enumeration_of_one_bin_yields_all_permutations() {
    let dir = tempfile::tempdir().unwrap();
    let bins = CosBins::from_centres(centres()).unwrap();
    let tables = common::build_full_sky_tables(dir.path(), NSIDE, &bins, Codec::Deflate);

    for table in &tables {
        let equilateral = EquilateralTriangles::find(table).unwrap();
        let general = GeneralTriangles::find(table, table, table).unwrap();
        assert_eq!(general.as_list().len(), 6 * equilateral.as_list().len());

        // every record of the general list is a permutation of a stored
        // equilateral triple
        let canonical: BTreeSet<[Pix; 3]> = (0..equilateral.as_list().len())
            .map(|i| equilateral.as_list().get(i))
            .collect();
        for i in 0..general.as_list().len() {
            let mut tri = general.as_list().get(i);
            tri.sort_unstable();
            assert!(canonical.contains(&tri));
        }
    }
}

#[test]
fn isosceles_enumeration_matches_brute_force() {
    let dir = tempfile::tempdir().unwrap();
    let bins = CosBins::from_centres(centres()).unwrap();
    let tables = common::build_full_sky_tables(dir.path(), NSIDE, &bins, Codec::Deflate);
    let vecs = nest_vectors(NSIDE);
    let npix = vecs.len();

    let (odd_bin, shared_bin) = (0usize, 1usize);
    let triangles = IsoscelesTriangles::find(&tables[shared_bin], &tables[odd_bin]).unwrap();
    let list = triangles.as_list();
    assert_eq!(
        list.edge_lengths(),
        &[bins.centre(odd_bin), bins.centre(shared_bin), bins.centre(shared_bin)]
    );

    let mut enumerated = BTreeSet::new();
    for i in 0..list.len() {
        let [p1, p2, p3] = list.get(i);
        // the odd-edge pair is deduplicated
        assert!(p1 < p2);
        // each unordered triple shows up at most once
        assert!(enumerated.insert([p1, p2, p3]));
    }

    let mut brute = BTreeSet::new();
    for x in 0..npix {
        for y in (x + 1)..npix {
            if bins.bin_index(dot(&vecs[x], &vecs[y])) != Some(odd_bin) {
                continue;
            }
            for z in 0..npix {
                if z == x || z == y {
                    continue;
                }
                if bins.bin_index(dot(&vecs[x], &vecs[z])) == Some(shared_bin)
                    && bins.bin_index(dot(&vecs[y], &vecs[z])) == Some(shared_bin)
                {
                    brute.insert([x as Pix, y as Pix, z as Pix]);
                }
            }
        }
    }
    assert_eq!(enumerated, brute);
    assert!(!brute.is_empty());
}
