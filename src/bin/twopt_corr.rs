//! Two-point correlation function of a map from the two-point tables.

use anyhow::{bail, ensure, Result};
use clap::Parser;
use npointstat::codec::Codec;
use npointstat::correlate::{two_point, two_point_masked};
use npointstat::map::SkyMap;
use npointstat::pixels::Pixelization;
use npointstat::twopt::TwoptTable;
use npointstat::util::sequential_file_list;
use npointstat::Error;
use rayon::prelude::*;
use std::path::PathBuf;

/// Print one line per bin: theta(rad), cos(theta), C(bin).
#[derive(Parser, Debug)]
#[command(name = "twopt_corr", version, about)]
struct Cli {
    /// input map
    map: PathBuf,
    /// prefix of the two-point tables
    twopt_prefix: String,
    /// optional mask map
    mask: Option<PathBuf>,
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
            ensure!(
                mask.nside() == header.nside,
                "mask Nside {} does not match table Nside {}",
                mask.nside(),
                header.nside
            );
            Some(mask.to_scheme(header.scheme, &pix))
        }
        None => None,
    };

    let results: Vec<(f64, f64)> = files
        .par_iter()
        .map(|path| -> Result<(f64, f64), Error> {
            let table = TwoptTable::read_file(path, cli.codec)?;
            let corr = match &mask {
                Some(mask) => two_point_masked(&map, mask, &table)?,
                None => two_point(&map, &table)?,
            };
            Ok((table.bin_value(), corr))
        })
        .collect::<Result<_, _>>()?;

    for (bin_value, corr) in results {
        let theta = bin_value.clamp(-1.0, 1.0).acos();
        println!("{theta} {bin_value} {corr}");
    }
    Ok(())
}
