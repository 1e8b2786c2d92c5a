// named mod.rs so the test binaries share it without picking it up as a
// standalone integration test
// https://doc.rust-lang.org/book/ch11-03-test-organization.html#submodules-in-integration-tests

use npointstat::bins::CosBins;
use npointstat::codec::Codec;
use npointstat::pairbin::{build_twopt_tables, TableBuildOptions};
use npointstat::pixels::{Pixelization, Scheme};
use npointstat::twopt::TwoptTable;
use npointstat::util::make_filename;
use npointstat::Pix;
use std::path::Path;

#[allow(dead_code)]
pub fn isclose(actual: f64, ref_val: f64, rtol: f64, atol: f64) -> bool {
    (actual - ref_val).abs() <= (atol + rtol * ref_val.abs())
}

/// Build full-sky two-point tables for every bin in a temp directory and
/// read them all back.
#[allow(dead_code)]
pub fn build_full_sky_tables(
    dir: &Path,
    nside: usize,
    bins: &CosBins,
    codec: Codec,
) -> Vec<TwoptTable> {
    let tmp_prefix = format!("{}/tmp_", dir.display());
    let out_prefix = format!("{}/twopt_", dir.display());
    let pixel_list: Vec<Pix> = (0..(12 * nside * nside) as Pix).collect();
    let opts = TableBuildOptions {
        pair_buffer: 4096,
        clean_tmpfiles: true,
        codec,
    };
    build_twopt_tables(nside, &pixel_list, bins, &tmp_prefix, &out_prefix, &opts).unwrap();
    (0..bins.n_bins())
        .map(|k| TwoptTable::read_file(&make_filename(&out_prefix, k), codec).unwrap())
        .collect()
}

/// Forty bins of width 0.05 with edges on multiples of 0.05. Written out as
/// centres so the count cannot fall prey to floating-point truncation.
#[allow(dead_code)]
pub fn fine_bins() -> CosBins {
    CosBins::from_centres((0..40).map(|k| -0.975 + 0.05 * k as f64).collect()).unwrap()
}

/// Pixel-centre unit vectors of the full sky in NEST order.
#[allow(dead_code)]
pub fn nest_vectors(nside: usize) -> Vec<[f64; 3]> {
    let pix = Pixelization::new(nside).unwrap();
    (0..pix.npix() as Pix)
        .map(|p| pix.pix2vec(p, Scheme::Nest))
        .collect()
}

#[allow(dead_code)]
pub fn dot(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}
