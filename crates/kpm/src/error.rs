//! Error types for the KPM engine.
//!
//! All conditions are detected eagerly at call boundaries, before any
//! recurrence work begins; no partial results are ever returned.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum KpmError {
    /// Spectral bounds estimation found a (near-)zero spectral range, so
    /// rescaling into [-1, 1] is undefined.
    #[error("degenerate spectrum: |E_max - E_min| = {range:.3e} is too small to rescale")]
    DegenerateSpectrum { range: f64 },

    /// Requested or derived Chebyshev moment count is out of range.
    #[error("invalid moment count {requested} (must be in 1..={max})")]
    InvalidMomentCount { requested: usize, max: usize },

    /// Energy or chemical potential outside the valid rescaled domain; the
    /// density reconstruction is singular at and beyond the window edges.
    #[error("energy {energy} outside the spectral window [{e_min}, {e_max}]")]
    EnergyOutOfBounds { energy: f64, e_min: f64, e_max: f64 },

    /// Starting vector, operator, or Hamiltonian dimensions disagree.
    #[error("dimension mismatch: {context} is {got}, expected {expected}")]
    DimensionMismatch {
        context: &'static str,
        got: usize,
        expected: usize,
    },

    /// The caller's cancellation flag was raised between iterations.
    #[error("calculation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, KpmError>;
