//! Result containers: 1D series and site-resolved spectral maps.

use serde::{Deserialize, Serialize};

/// Ordered (x, value) pairs, e.g. (energy, LDOS) or (chemical potential,
/// conductivity). Length equals the requested sample count, independent of
/// the Hamiltonian dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl Series {
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Self {
        debug_assert_eq!(x.len(), y.len());
        Self { x, y }
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.x.iter().copied().zip(self.y.iter().copied())
    }
}

/// Local density of states resolved per site: one value vector over the
/// shared energy grid for every requested site index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialLdos {
    pub energies: Vec<f64>,
    pub sites: Vec<usize>,
    /// values[i][k] = LDOS at sites[i], energies[k].
    pub values: Vec<Vec<f64>>,
}

impl SpatialLdos {
    /// LDOS curve for a site index, if it was requested.
    pub fn site(&self, site: usize) -> Option<&[f64]> {
        let pos = self.sites.iter().position(|&s| s == site)?;
        Some(&self.values[pos])
    }
}
