//! Build the per-bin two-point tables from a parameter file.

use anyhow::{bail, Result};
use clap::Parser;
use npointstat::bins::{read_centres_file, BinSpec};
use npointstat::codec::Codec;
use npointstat::map::SkyMap;
use npointstat::pairbin::{build_twopt_tables, TableBuildOptions};
use npointstat::params::ParamFile;
use npointstat::pixels::{Pixelization, Scheme};
use npointstat::Pix;
use std::path::PathBuf;

/// Classify all pixel pairs into separation bins and write one two-point
/// table per bin.
#[derive(Parser, Debug)]
#[command(name = "create_twopt_tables", version, about)]
struct Cli {
    /// parameter file with keys Nside, maskfile, dcosbin, dtheta,
    /// cosbinfile, tmpfile_prefix, twoptfile_prefix, clean_tmpfiles, codec
    paramfile: PathBuf,
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
    let params = ParamFile::read(&cli.paramfile)?;

    let nside_param: Option<usize> = params.get_opt("Nside")?;
    let maskfile: Option<String> = params.get_opt("maskfile")?;
    let (nside, pixel_list): (usize, Vec<Pix>) = match maskfile {
        Some(file) => {
            let mask = SkyMap::read_file(file.as_ref())?;
            let pix = Pixelization::new(mask.nside())?;
            let mask = mask.to_scheme(Scheme::Nest, &pix);
            (mask.nside(), mask.mask_pixel_list())
        }
        None => match nside_param {
            Some(nside) => {
                let pix = Pixelization::new(nside)?;
                (nside, (0..pix.npix() as Pix).collect())
            }
            None => bail!("maskfile or Nside must be set in the parameter file"),
        },
    };

    let schedule = if let Some(file) = params.get_opt::<String>("cosbinfile")? {
        BinSpec::Centres(read_centres_file(file.as_ref())?)
    } else if let Some(dcos) = params.get_opt::<f64>("dcosbin")? {
        BinSpec::DeltaCos(dcos)
    } else if let Some(dtheta) = params.get_opt::<f64>("dtheta")? {
        BinSpec::DeltaThetaDeg(dtheta)
    } else {
        bail!("cosbinfile, dcosbin, or dtheta must be set in the parameter file");
    };
    let bins = schedule.build()?;

    let tmp_prefix: String = params.get("tmpfile_prefix")?;
    let out_prefix: String = params.get("twoptfile_prefix")?;
    let opts = TableBuildOptions {
        clean_tmpfiles: params.get_or("clean_tmpfiles", false)?,
        codec: params.get_or("codec", Codec::Deflate)?,
        ..TableBuildOptions::default()
    };

    build_twopt_tables(nside, &pixel_list, &bins, &tmp_prefix, &out_prefix, &opts)?;
    Ok(())
}
