//! Enumerate full-sky rhombic quadrilaterals for every bin and spool them to
//! quadrilateral list files.

use anyhow::{bail, Result};
use clap::Parser;
use npointstat::codec::Codec;
use npointstat::quadfile::QuadFileWriter;
use npointstat::quads::RhombicQuadsFullSky;
use npointstat::triangles::EquilateralTriangles;
use npointstat::twopt::TwoptTable;
use npointstat::util::{make_filename, sequential_file_list};
use npointstat::{Error, Pix};
use rayon::prelude::*;
use tracing::info;

/// Turn each two-point table into a rhombic quadrilateral list file.
#[derive(Parser, Debug)]
#[command(name = "create_quad_files", version, about)]
struct Cli {
    /// prefix of the input two-point tables
    twopt_prefix: String,
    /// prefix of the output quadrilateral files
    quad_prefix: String,
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

    files
        .par_iter()
        .enumerate()
        .try_for_each(|(k, path)| -> Result<(), Error> {
            let table = TwoptTable::read_file(path, cli.codec)?;
            let triangles = EquilateralTriangles::find(&table)?;
            info!(
                bin = k,
                n_triangles = triangles.as_list().len(),
                "enumerating quadrilaterals"
            );

            let mut writer = QuadFileWriter::create(
                make_filename(&cli.quad_prefix, k),
                table.nside(),
                table.scheme(),
                table.bin_value(),
            )?;
            let mut quads = RhombicQuadsFullSky::new(&triangles)?;
            let mut pts: [Pix; 3] = [0; 3];
            let mut third: Vec<Pix> = Vec::with_capacity(128);
            while quads.next(&mut pts, &mut third) {
                writer.push_set(&pts, &third)?;
            }
            writer.finish()?;
            info!(bin = k, "quadrilateral file written");
            Ok(())
        })?;
    Ok(())
}
