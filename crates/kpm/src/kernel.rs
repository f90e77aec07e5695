//! Damping kernels for the truncated Chebyshev series.
//!
//! Truncating the infinite expansion at M moments produces Gibbs
//! oscillations; multiplying moment n by a damping coefficient g_n trades
//! them for a controlled broadening. All kernels here use the convention
//! g_0 = 1 — the halving of the zeroth term happens once, inside the
//! reconstruction sums, so the constant term is never double-counted.

use crate::error::{KpmError, Result};
use crate::moments::MAX_MOMENTS;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Choice of damping applied to the truncated moment sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DampingKernel {
    /// Gaussian-like broadening; the default and best general choice.
    Jackson,
    /// Lorentzian-shaped broadening, suited to Green's-function quantities.
    /// λ ≈ 4 is typical.
    Lorentz { lambda: f64 },
    /// No damping: maximal resolution, oscillation-prone. Diagnostics only.
    Dirichlet,
}

impl Default for DampingKernel {
    fn default() -> Self {
        Self::Jackson
    }
}

impl DampingKernel {
    /// Lorentz kernel with the customary λ = 4.
    pub fn lorentz() -> Self {
        Self::Lorentz { lambda: 4.0 }
    }

    /// Damping coefficients g_0 .. g_{M-1} for `num_moments` = M.
    pub fn coefficients(&self, num_moments: usize) -> Result<Vec<f64>> {
        if num_moments < 1 || num_moments > MAX_MOMENTS {
            return Err(KpmError::InvalidMomentCount {
                requested: num_moments,
                max: MAX_MOMENTS,
            });
        }
        let m = num_moments as f64;
        let g = match *self {
            Self::Jackson => {
                // g_n = [(M-n+1)cos(πn/(M+1)) + sin(πn/(M+1))cot(π/(M+1))] / (M+1)
                let q = PI / (m + 1.0);
                let cot_q = 1.0 / q.tan();
                (0..num_moments)
                    .map(|n| {
                        let nf = n as f64;
                        ((m - nf + 1.0) * (q * nf).cos() + (q * nf).sin() * cot_q) / (m + 1.0)
                    })
                    .collect()
            }
            Self::Lorentz { lambda } => (0..num_moments)
                .map(|n| (lambda * (1.0 - n as f64 / m)).sinh() / lambda.sinh())
                .collect(),
            Self::Dirichlet => vec![1.0; num_moments],
        };
        Ok(g)
    }

    /// Number of moments needed for a target broadening, in rescaled units
    /// (ε = broadening / a).
    ///
    /// Jackson's effective Gaussian width at the band center is π/M;
    /// Lorentz's Lorentzian half-width is λ/M. Monotonically non-increasing
    /// in ε, clamped to at least 2 moments and at most [`MAX_MOMENTS`].
    pub fn required_num_moments(&self, scaled_broadening: f64) -> Result<usize> {
        if !(scaled_broadening > 0.0) {
            return Err(KpmError::InvalidMomentCount {
                requested: 0,
                max: MAX_MOMENTS,
            });
        }
        let raw = match *self {
            Self::Jackson | Self::Dirichlet => PI / scaled_broadening,
            Self::Lorentz { lambda } => lambda / scaled_broadening,
        };
        let m = (raw.ceil() as usize).max(2);
        if m > MAX_MOMENTS {
            return Err(KpmError::InvalidMomentCount {
                requested: m,
                max: MAX_MOMENTS,
            });
        }
        Ok(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_g0_is_one_for_all_kernels() {
        for kernel in [
            DampingKernel::Jackson,
            DampingKernel::lorentz(),
            DampingKernel::Dirichlet,
        ] {
            let g = kernel.coefficients(32).unwrap();
            assert!((g[0] - 1.0).abs() < 1e-12, "{kernel:?}: g_0 = {}", g[0]);
        }
    }

    #[test]
    fn test_jackson_decreasing_and_positive() {
        let g = DampingKernel::Jackson.coefficients(64).unwrap();
        for n in 1..g.len() {
            assert!(g[n] <= g[n - 1] + 1e-12, "g not decreasing at n={n}");
            assert!(g[n] > -1e-12, "g negative at n={n}: {}", g[n]);
        }
        // The last coefficient should be strongly damped.
        assert!(g[63] < 0.01, "g_63 = {}", g[63]);
    }

    #[test]
    fn test_lorentz_endpoint() {
        // g_n at n = M would be sinh(0)/sinh(λ) = 0; at n = M-1 it is small.
        let g = DampingKernel::lorentz().coefficients(100).unwrap();
        assert!(g[99] < 0.01, "g_99 = {}", g[99]);
    }

    #[test]
    fn test_dirichlet_all_ones() {
        let g = DampingKernel::Dirichlet.coefficients(16).unwrap();
        assert!(g.iter().all(|&x| (x - 1.0).abs() < 1e-15));
    }

    #[test]
    fn test_required_num_moments_jackson() {
        let m = DampingKernel::Jackson.required_num_moments(0.1).unwrap();
        assert_eq!(m, (PI / 0.1).ceil() as usize);
    }

    #[test]
    fn test_required_num_moments_monotone() {
        for kernel in [DampingKernel::Jackson, DampingKernel::lorentz()] {
            let mut prev = usize::MAX;
            for &eps in &[0.01, 0.02, 0.05, 0.1, 0.5, 1.0] {
                let m = kernel.required_num_moments(eps).unwrap();
                assert!(m <= prev, "{kernel:?}: M({eps}) = {m} > {prev}");
                prev = m;
            }
        }
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(
            DampingKernel::Jackson.coefficients(0),
            Err(KpmError::InvalidMomentCount { .. })
        ));
        assert!(matches!(
            DampingKernel::Jackson.required_num_moments(0.0),
            Err(KpmError::InvalidMomentCount { .. })
        ));
        assert!(matches!(
            DampingKernel::Jackson.required_num_moments(1e-9),
            Err(KpmError::InvalidMomentCount { .. })
        ));
    }
}
