//! Angular separation bins on `cos θ`.
//!
//! A bin schedule is given either as explicit bin centres, as a spacing in
//! `cos θ`, or as a spacing in degrees. Centres are converted to edges by
//! taking midpoints; the outermost edges are pushed slightly past `±1` so a
//! dot product that is numerically a hair outside `[-1, 1]` still lands in a
//! bin. Intervals are half open: a value exactly on an interior edge belongs
//! to the bin above it.

use crate::error::Error;
use std::io::BufRead;
use std::path::Path;

/// How far the outermost edges extend past the poles.
const EDGE_MARGIN: f64 = 0.1;

/// A bin schedule before edge construction.
#[derive(Clone, Debug)]
pub enum BinSpec {
    /// explicit `cos θ` bin centres, strictly increasing
    Centres(Vec<f64>),
    /// uniform spacing in `cos θ`
    DeltaCos(f64),
    /// uniform spacing in degrees
    DeltaThetaDeg(f64),
}

impl BinSpec {
    pub fn build(&self) -> Result<CosBins, Error> {
        match self {
            BinSpec::Centres(centres) => CosBins::from_centres(centres.clone()),
            BinSpec::DeltaCos(d) => {
                if !(*d > 0.0 && *d <= 2.0) {
                    return Err(Error::config(format!("dcosbin must be in (0, 2], got {d}")));
                }
                let nbin = (2.0 / d) as usize;
                let centres = (0..nbin).map(|k| -1.0 + d / 2.0 + k as f64 * d).collect();
                CosBins::from_centres(centres)
            }
            BinSpec::DeltaThetaDeg(d) => {
                if !(*d > 0.0 && *d <= 180.0) {
                    return Err(Error::config(format!(
                        "dtheta must be in (0, 180] degrees, got {d}"
                    )));
                }
                let nbin = (180.0 / d) as usize;
                // descending in theta so the centres ascend in cos(theta)
                let theta: Vec<f64> = (0..nbin).map(|k| 180.0 - d / 2.0 - k as f64 * d).collect();
                let centres = theta.iter().map(|t| (t.to_radians()).cos()).collect();
                // equal width in theta, so the edges come from theta midpoints
                // rather than centre midpoints
                let mut edges = Vec::with_capacity(nbin + 1);
                edges.push(-1.0 - EDGE_MARGIN);
                for j in 0..nbin - 1 {
                    edges.push((0.5 * (theta[j] + theta[j + 1])).to_radians().cos());
                }
                edges.push(1.0 + EDGE_MARGIN);
                CosBins::new(centres, edges)
            }
        }
    }
}

/// A validated bin schedule: `centres.len()` bins delimited by
/// `centres.len() + 1` strictly increasing edges.
#[derive(Clone, Debug)]
pub struct CosBins {
    centres: Vec<f64>,
    edges: Vec<f64>,
}

impl CosBins {
    pub fn from_centres(centres: Vec<f64>) -> Result<Self, Error> {
        let mut edges = Vec::with_capacity(centres.len() + 1);
        edges.push(-1.0 - EDGE_MARGIN);
        for j in 0..centres.len().saturating_sub(1) {
            edges.push(0.5 * (centres[j] + centres[j + 1]));
        }
        edges.push(1.0 + EDGE_MARGIN);
        CosBins::new(centres, edges)
    }

    fn new(centres: Vec<f64>, edges: Vec<f64>) -> Result<Self, Error> {
        if centres.is_empty() {
            return Err(Error::config("the bin list is empty"));
        }
        if centres
            .iter()
            .any(|c| !c.is_finite() || *c < -1.0 || *c > 1.0)
        {
            return Err(Error::config("bin centres must be finite and in [-1, 1]"));
        }
        if edges.len() != centres.len() + 1 {
            return Err(Error::config("bin edge/centre count mismatch"));
        }
        if edges.windows(2).any(|w| w[1] <= w[0]) {
            return Err(Error::config("bin centres must be strictly increasing"));
        }
        Ok(CosBins { centres, edges })
    }

    pub fn n_bins(&self) -> usize {
        self.centres.len()
    }

    pub fn centre(&self, k: usize) -> f64 {
        self.centres[k]
    }

    pub fn centres(&self) -> &[f64] {
        &self.centres
    }

    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Bin index of `value` under the half-open convention, or `None` outside
    /// the outermost edges.
    pub fn bin_index(&self, value: f64) -> Option<usize> {
        if value < self.edges[0] || value >= self.edges[self.edges.len() - 1] {
            return None;
        }
        let index = self
            .edges
            .binary_search_by(|probe| probe.total_cmp(&value))
            // Ok is an exact match (value on an edge goes up), Err a lower bound
            .unwrap_or_else(|i| i - 1);
        Some(index)
    }
}

/// Stateful bin lookup for streams of slowly varying values.
///
/// Consecutive pixel pairs in NEST order are spatially close, so their dot
/// products usually land in the same bin or the one next door; walking from
/// the previous hit beats a fresh search. The walk lands in the same half-open
/// bin that [`CosBins::bin_index`] reports, regardless of approach direction.
pub struct BinWalker {
    ibin: usize,
}

impl BinWalker {
    pub fn new() -> Self {
        BinWalker { ibin: 0 }
    }

    /// Locate the bin of `value`. The outer edges extend past `±1`, so any
    /// valid dot product terminates the walk.
    pub fn locate(&mut self, bins: &CosBins, value: f64) -> usize {
        let edges = bins.edges();
        while value < edges[self.ibin] {
            self.ibin -= 1;
        }
        while value >= edges[self.ibin + 1] {
            self.ibin += 1;
        }
        self.ibin
    }
}

impl Default for BinWalker {
    fn default() -> Self {
        BinWalker::new()
    }
}

/// Read bin centres from a text file: first column, `#` starts a comment.
pub fn read_centres_file(path: &Path) -> Result<Vec<f64>, Error> {
    let file = std::fs::File::open(path).map_err(|e| Error::io(path, e))?;
    let mut centres = Vec::new();
    for line in std::io::BufReader::new(file).lines() {
        let line = line.map_err(|e| Error::io(path, e))?;
        let line = line.split('#').next().unwrap_or("").trim().to_string();
        if line.is_empty() {
            continue;
        }
        let first = line.split_whitespace().next().unwrap();
        let value: f64 = first
            .parse()
            .map_err(|_| Error::format(path, format!("bad bin centre {first:?}")))?;
        centres.push(value);
    }
    Ok(centres)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edges_from_centres() {
        let bins = CosBins::from_centres(vec![-0.5, 0.5]).unwrap();
        assert_eq!(bins.edges(), &[-1.1, 0.0, 1.1]);
        assert_eq!(bins.n_bins(), 2);
    }

    #[test]
    fn delta_cos_schedule() {
        let bins = BinSpec::DeltaCos(0.5).build().unwrap();
        assert_eq!(bins.n_bins(), 4);
        assert!((bins.centre(0) - -0.75).abs() < 1e-15);
        assert!((bins.centre(3) - 0.75).abs() < 1e-15);
    }

    #[test]
    fn delta_theta_schedule() {
        let bins = BinSpec::DeltaThetaDeg(45.0).build().unwrap();
        assert_eq!(bins.n_bins(), 4);
        // centres ascend in cos(theta)
        for w in bins.centres().windows(2) {
            assert!(w[1] > w[0]);
        }
        // interior edges are cosines of theta midpoints
        assert!((bins.edges()[1] - (135.0f64).to_radians().cos()).abs() < 1e-15);
    }

    #[test]
    fn rejects_bad_schedules() {
        assert!(CosBins::from_centres(vec![]).is_err());
        assert!(CosBins::from_centres(vec![0.5, -0.5]).is_err());
        assert!(CosBins::from_centres(vec![0.0, 2.0]).is_err());
        assert!(BinSpec::DeltaCos(0.0).build().is_err());
        assert!(BinSpec::DeltaThetaDeg(-1.0).build().is_err());
    }

    #[test]
    fn half_open_intervals() {
        let bins = CosBins::from_centres(vec![-0.5, 0.5]).unwrap();
        // a value exactly on the interior edge belongs to the upper bin
        assert_eq!(bins.bin_index(0.0), Some(1));
        assert_eq!(bins.bin_index(-1e-12), Some(0));
        assert_eq!(bins.bin_index(-1.0), Some(0));
        assert_eq!(bins.bin_index(1.0), Some(1));
        assert_eq!(bins.bin_index(-1.2), None);
        assert_eq!(bins.bin_index(1.2), None);
    }

    #[test]
    fn walker_matches_bin_index() {
        let bins = BinSpec::DeltaCos(0.25).build().unwrap();
        let mut walker = BinWalker::new();
        let samples = [-1.0, 0.99, -0.3, -0.300001, 0.0, 0.125, -1.0, 1.0];
        for &v in &samples {
            assert_eq!(Some(walker.locate(&bins, v)), bins.bin_index(v), "v={v}");
        }
        // exactly on an interior edge, from both directions
        let edge = bins.edges()[3];
        assert_eq!(walker.locate(&bins, -0.9), bins.bin_index(-0.9).unwrap());
        assert_eq!(walker.locate(&bins, edge), 3);
        assert_eq!(walker.locate(&bins, 0.9), bins.bin_index(0.9).unwrap());
        assert_eq!(walker.locate(&bins, edge), 3);
    }

    #[test]
    fn centres_file_parsing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bins.txt");
        std::fs::write(&path, "# schedule\n-0.5 extra columns\n\n0.5 # trailing\n").unwrap();
        assert_eq!(read_centres_file(&path).unwrap(), vec![-0.5, 0.5]);
    }
}
