//! The pair-binning driver: from a pixel list and a bin schedule to one
//! serialized two-point table per bin.
//!
//! Classification is a single serial sweep over all unordered pixel pairs.
//! Pixels are visited in NEST order, so consecutive dot products drift
//! slowly through the bin schedule and the directional walk almost always
//! terminates immediately; each pair is spilled to the scratch file of its
//! bin. The sweep also fixes the order in which every scratch file is
//! written, which is what keeps the table rows sorted without ever running a
//! sort. The drain stage is independent per bin and fans out over a
//! work-stealing pool.

use crate::bins::{BinWalker, CosBins};
use crate::codec::Codec;
use crate::error::Error;
use crate::pairfile::{PairFileReader, PairFileWriter, DEFAULT_PAIR_BUFFER};
use crate::pixels::{Pixelization, Scheme};
use crate::twopt::TwoptTableBuilder;
use crate::util::make_filename;
use crate::Pix;
use rayon::prelude::*;
use tracing::info;

pub struct TableBuildOptions {
    /// scratch-file buffer capacity, in pairs
    pub pair_buffer: usize,
    /// unlink each scratch file once its bin is drained
    pub clean_tmpfiles: bool,
    pub codec: Codec,
}

impl Default for TableBuildOptions {
    fn default() -> Self {
        TableBuildOptions {
            pair_buffer: DEFAULT_PAIR_BUFFER,
            clean_tmpfiles: false,
            codec: Codec::Deflate,
        }
    }
}

/// Classify every unordered pair of `pixel_list` into `bins` and write one
/// two-point table file per bin.
///
/// `pixel_list` holds NEST pixel indices, ascending: either the full sphere
/// or the pixels kept by a mask. Scratch files are named
/// `<tmp_prefix>NNNNN.dat`, tables `<out_prefix>NNNNN.dat`.
pub fn build_twopt_tables(
    nside: usize,
    pixel_list: &[Pix],
    bins: &CosBins,
    tmp_prefix: &str,
    out_prefix: &str,
    opts: &TableBuildOptions,
) -> Result<(), Error> {
    let pix = Pixelization::new(nside)?;
    let npix = pixel_list.len();
    if npix == 0 {
        return Err(Error::precondition("the pixel list is empty"));
    }
    if pixel_list.windows(2).any(|w| w[1] <= w[0])
        || pixel_list[npix - 1] as usize >= pix.npix()
    {
        return Err(Error::precondition(
            "the pixel list must be ascending and within the sphere",
        ));
    }

    info!(
        nside,
        npix,
        n_bins = bins.n_bins(),
        "classifying pixel pairs"
    );

    let vecs: Vec<[f64; 3]> = pixel_list
        .iter()
        .map(|&p| pix.pix2vec(p, Scheme::Nest))
        .collect();

    let mut scratch: Vec<PairFileWriter> = (0..bins.n_bins())
        .map(|k| PairFileWriter::create(make_filename(tmp_prefix, k), opts.pair_buffer))
        .collect::<Result<_, _>>()?;

    // Serial on purpose: the walk state carries between iterations, and the
    // file order doubles as the row sort order.
    let mut walker = BinWalker::new();
    for i in 0..npix {
        for j in i + 1..npix {
            let dp = vecs[i][0] * vecs[j][0] + vecs[i][1] * vecs[j][1] + vecs[i][2] * vecs[j][2];
            let ibin = walker.locate(bins, dp);
            scratch[ibin].append(i as Pix, j as Pix)?;
        }
    }
    for writer in scratch {
        writer.finish()?;
    }
    info!("scratch files written; assembling tables");

    (0..bins.n_bins())
        .into_par_iter()
        .with_min_len(2)
        .try_for_each(|k| -> Result<(), Error> {
            let tmp_path = make_filename(tmp_prefix, k);
            let mut reader = PairFileReader::open(&tmp_path, opts.pair_buffer)?;
            let mut builder =
                TwoptTableBuilder::new(nside, Scheme::Nest, pixel_list.to_vec(), bins.centre(k));
            while let Some((i, j)) = reader.read_next_pair()? {
                builder.add_pair(i, j);
            }
            builder.write_file(&make_filename(out_prefix, k), opts.codec)?;
            if opts.clean_tmpfiles {
                std::fs::remove_file(&tmp_path).map_err(|e| Error::io(&tmp_path, e))?;
            }
            info!(bin = k, "table written");
            Ok(())
        })?;

    info!("two-point tables complete");
    Ok(())
}
