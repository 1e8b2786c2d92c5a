//! Three-point correlation function of a map from the two-point tables,
//! for equilateral triangles or for isosceles triangles with a chosen
//! equal-side length.

use anyhow::{bail, ensure, Result};
use clap::Parser;
use npointstat::codec::Codec;
use npointstat::correlate::{three_point, three_point_masked};
use npointstat::map::SkyMap;
use npointstat::pixels::Pixelization;
use npointstat::triangles::{EquilateralTriangles, IsoscelesTriangles};
use npointstat::twopt::TwoptTable;
use npointstat::util::sequential_file_list;
use npointstat::Error;
use rayon::prelude::*;
use std::path::PathBuf;
use tracing::info;

/// Print one line per bin: theta(rad), cos(theta), C(bin).
#[derive(Parser, Debug)]
#[command(name = "threept_corr", version, about)]
struct Cli {
    /// input map
    map: PathBuf,
    /// prefix of the two-point tables
    twopt_prefix: String,
    /// optional mask map
    mask: Option<PathBuf>,
    /// enumerate isosceles triangles whose equal sides have this length in
    /// degrees (the nearest bin is used); default is equilateral
    #[arg(long, value_name = "DEGREES")]
    isosceles: Option<f64>,
    /// codec the two-point tables were written with
    #[arg(long, default_value = "deflate")]
    codec: Codec,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();
    let cli = Cli::try_parse().unwrap_or_else(|err| {
        let _ = err.print();
        std::process::exit(1);
    });

    let files = sequential_file_list(&cli.twopt_prefix);
    if files.is_empty() {
        bail!("no two-point tables match prefix {:?}", cli.twopt_prefix);
    }
    let header = TwoptTable::read_header(&files[0])?;
    let pix = Pixelization::new(header.nside)?;

    let map = SkyMap::read_file(&cli.map)?;
    ensure!(
        map.nside() == header.nside,
        "map Nside {} does not match table Nside {}",
        map.nside(),
        header.nside
    );
    let map = map.to_scheme(header.scheme, &pix);
    let mask = match &cli.mask {
        Some(path) => {
            let mask = SkyMap::read_file(path)?;
            ensure!(mask.nside() == header.nside, "mask does not match tables");
            Some(mask.to_scheme(header.scheme, &pix))
        }
        None => None,
    };

    // for the isosceles run, pick the bin closest to the requested equal-side
    // length and hold its table across all odd-edge bins
    let equal_table = match cli.isosceles {
        Some(degrees) => {
            let want = degrees.to_radians().cos();
            let mut best = (0usize, f64::INFINITY);
            for (k, path) in files.iter().enumerate() {
                let h = TwoptTable::read_header(path)?;
                let dist = (h.bin_value - want).abs();
                if dist < best.1 {
                    best = (k, dist);
                }
            }
            info!(file = %files[best.0].display(), "equal-side table selected");
            Some(TwoptTable::read_file(&files[best.0], cli.codec)?)
        }
        None => None,
    };

    let results: Vec<(f64, f64)> = files
        .par_iter()
        .map(|path| -> Result<(f64, f64), Error> {
            let table = TwoptTable::read_file(path, cli.codec)?;
            let bin_value = table.bin_value();
            let corr = match &equal_table {
                Some(equal) => {
                    let triangles = IsoscelesTriangles::find(equal, &table)?;
                    match &mask {
                        Some(mask) => three_point_masked(&map, mask, triangles.as_list())?,
                        None => three_point(&map, triangles.as_list())?,
                    }
                }
                None => {
                    let triangles = EquilateralTriangles::find(&table)?;
                    match &mask {
                        Some(mask) => three_point_masked(&map, mask, triangles.as_list())?,
                        None => three_point(&map, triangles.as_list())?,
                    }
                }
            };
            Ok((bin_value, corr))
        })
        .collect::<Result<_, _>>()?;

    for (bin_value, corr) in results {
        let theta = bin_value.clamp(-1.0, 1.0).acos();
        println!("{theta} {bin_value} {corr}");
    }
    Ok(())
}
