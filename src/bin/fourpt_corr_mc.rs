//! Four-point correlation functions of a batch of synthetic Gaussian maps,
//! one pass over each quadrilateral list file.

use anyhow::{bail, Result};
use clap::Parser;
use npointstat::correlate::four_point_batch;
use npointstat::map::SkyMap;
use npointstat::quadfile::QuadFile;
use npointstat::util::sequential_file_list;
use npointstat::Error;
use rand_xoshiro::rand_core::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use tracing::info;

/// First output line lists the bin centres; each following line is one map.
#[derive(Parser, Debug)]
#[command(name = "fourpt_corr_mc", version, about)]
struct Cli {
    /// prefix of the quadrilateral list files
    quad_prefix: String,
    /// number of Monte-Carlo maps to generate
    nmaps: usize,
    /// seed of the map generator
    #[arg(long, default_value_t = 4711)]
    seed: u64,
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
    if cli.nmaps == 0 {
        bail!("nmaps must be positive");
    }

    let files = sequential_file_list(&cli.quad_prefix);
    if files.is_empty() {
        bail!("no quadrilateral files match prefix {:?}", cli.quad_prefix);
    }
    let first = QuadFile::open(&files[0])?;
    let nside = first.nside();
    let scheme = first.scheme();
    drop(first);

    info!(nmaps = cli.nmaps, nside, "synthesizing maps");
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(cli.seed);
    let maps: Vec<SkyMap> = (0..cli.nmaps)
        .map(|_| SkyMap::gaussian_noise(nside, scheme, &mut rng))
        .collect();

    let results: Vec<(f64, Vec<f64>)> = files
        .par_iter()
        .map(|path| -> Result<(f64, Vec<f64>), Error> {
            let mut quads = QuadFile::open(path)?;
            let bin_value = quads.bin_value();
            let corr = four_point_batch(&maps, &mut quads)?;
            Ok((bin_value, corr))
        })
        .collect::<Result<_, _>>()?;

    let centres: Vec<String> = results.iter().map(|(bv, _)| bv.to_string()).collect();
    println!("{}", centres.join(" "));
    for j in 0..cli.nmaps {
        let row: Vec<String> = results.iter().map(|(_, c)| c[j].to_string()).collect();
        println!("{}", row.join(" "));
    }
    Ok(())
}
