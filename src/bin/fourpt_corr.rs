//! Four-point correlation function of a map from the quadrilateral list
//! files.

use anyhow::{bail, ensure, Result};
use clap::Parser;
use npointstat::correlate::{four_point, four_point_masked};
use npointstat::map::SkyMap;
use npointstat::pixels::Pixelization;
use npointstat::quadfile::QuadFile;
use npointstat::util::sequential_file_list;
use npointstat::Error;
use rayon::prelude::*;
use std::path::PathBuf;

/// Print one line per bin: theta(rad), cos(theta), C(bin).
#[derive(Parser, Debug)]
#[command(name = "fourpt_corr", version, about)]
struct Cli {
    /// input map
    map: PathBuf,
    /// prefix of the quadrilateral list files
    quad_prefix: String,
    /// optional mask map
    mask: Option<PathBuf>,
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

    let files = sequential_file_list(&cli.quad_prefix);
    if files.is_empty() {
        bail!("no quadrilateral files match prefix {:?}", cli.quad_prefix);
    }
    let first = QuadFile::open(&files[0])?;
    let nside = first.nside();
    let scheme = first.scheme();
    drop(first);
    let pix = Pixelization::new(nside)?;

    let map = SkyMap::read_file(&cli.map)?;
    ensure!(
        map.nside() == nside,
        "map Nside {} does not match quadrilateral list Nside {nside}",
        map.nside()
    );
    let map = map.to_scheme(scheme, &pix);
    let mask = match &cli.mask {
        Some(path) => {
            let mask = SkyMap::read_file(path)?;
            ensure!(
                mask.nside() == nside,
                "mask Nside {} does not match quadrilateral list Nside {nside}",
                mask.nside()
            );
            Some(mask.to_scheme(scheme, &pix))
        }
        None => None,
    };

    let results: Vec<(f64, f64)> = files
        .par_iter()
        .map(|path| -> Result<(f64, f64), Error> {
            let mut quads = QuadFile::open(path)?;
            let bin_value = quads.bin_value();
            let corr = match &mask {
                Some(mask) => four_point_masked(&map, mask, &mut quads)?,
                None => four_point(&map, &mut quads)?,
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
