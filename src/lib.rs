//! N-point angular correlation functions of scalar fields on a pixelated
//! sphere.
//!
//! The pipeline runs leaf first: pixel pairs are classified into `cos θ`
//! bins and stored as per-bin two-point tables ([`pairbin`], [`twopt`]);
//! triangle enumerators intersect table rows to list triples with prescribed
//! edge bins ([`triangles`]); the rhombic quadrilateral search expands an
//! equilateral triangle list into four-point tuples, either directly or
//! through the grid's symmetry group ([`quads`]), and spools them to a
//! compact recursive file ([`quadfile`]); the aggregators ([`correlate`])
//! replay any of those tuple sets against one or more maps. Everything is
//! per bin, so the tools fan the bins out over a thread pool.

pub mod bins;
pub mod codec;
pub mod correlate;
pub mod error;
pub mod map;
pub mod pairbin;
pub mod pairfile;
pub mod params;
pub mod pixels;
pub mod quadfile;
pub mod quads;
pub mod triangles;
pub mod twopt;
pub mod util;

pub use error::Error;

/// The integer type of pixel indices in tables and files.
pub type Pix = i32;
