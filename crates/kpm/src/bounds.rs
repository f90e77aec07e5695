//! Spectral bounds estimation and energy rescaling.
//!
//! Chebyshev polynomials are only defined on [-1, 1], so the Hamiltonian
//! spectrum must be mapped inside that interval before the recurrence runs.
//! The extremal eigenvalues are bracketed with a short Lanczos iteration
//! (no reorthogonalization — extremal Ritz values converge first and loss
//! of orthogonality only produces harmless ghost copies), then padded by a
//! small margin: eigenvalues outside the estimated range make the
//! recurrence diverge, so the margin trades a little energy resolution for
//! robustness.

use crate::error::{KpmError, Result};
use kpm_math::{random_phase_vector, CVec, Complex64, CsrMatrix, RMat};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Relative margin applied to each end of the estimated spectral range.
const BOUNDS_MARGIN: f64 = 0.01;

/// Safety factor keeping the rescaled spectrum strictly inside (-1, 1):
/// a = (E_max - E_min) / (2 - SCALE_TOLERANCE).
const SCALE_TOLERANCE: f64 = 0.01;

/// Spectral range below which rescaling is considered undefined.
const DEGENERATE_RANGE: f64 = 1e-12;

/// Linear map taking the spectrum of H into (-1, 1): H̃ = (H - b·I) / a.
///
/// Computed once per Hamiltonian and reused by every calculation on it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalingFactors {
    /// Scale: a = (E_max - E_min) / (2 - tolerance).
    pub a: f64,
    /// Shift: b = (E_max + E_min) / 2.
    pub b: f64,
    /// Lower spectral bound the factors were derived from (margin included).
    pub e_min: f64,
    /// Upper spectral bound the factors were derived from (margin included).
    pub e_max: f64,
}

impl ScalingFactors {
    /// Derive scaling factors from known spectral bounds.
    ///
    /// Fails with [`KpmError::DegenerateSpectrum`] when the range is
    /// (near-)zero, e.g. for a zero matrix or any multiple of the identity.
    pub fn from_bounds(e_min: f64, e_max: f64) -> Result<Self> {
        let range = e_max - e_min;
        if !(range > DEGENERATE_RANGE) {
            return Err(KpmError::DegenerateSpectrum { range });
        }
        Ok(Self {
            a: range / (2.0 - SCALE_TOLERANCE),
            b: (e_max + e_min) / 2.0,
            e_min,
            e_max,
        })
    }

    /// Map an energy into the rescaled domain: x = (E - b) / a.
    ///
    /// Rejects |x| ≥ 1 — the density reconstruction carries a
    /// 1/√(1-x²) factor that is singular at and beyond the window edges.
    pub fn rescale_energy(&self, energy: f64) -> Result<f64> {
        let x = (energy - self.b) / self.a;
        if x.abs() >= 1.0 {
            return Err(KpmError::EnergyOutOfBounds {
                energy,
                e_min: self.e_min,
                e_max: self.e_max,
            });
        }
        Ok(x)
    }
}

/// Estimate the spectral bounds of a Hermitian matrix and derive
/// [`ScalingFactors`], without full diagonalization.
///
/// Runs up to `max_steps` Lanczos iterations (a few dozen suffice for the
/// extremes) from a seeded random-phase start, diagonalizes the small
/// tridiagonal matrix, and widens the resulting bracket by
/// [`BOUNDS_MARGIN`] on each end.
pub fn estimate_bounds(h: &CsrMatrix, max_steps: usize, seed: u64) -> Result<ScalingFactors> {
    let n = h.dim();
    if n == 0 {
        return Err(KpmError::DegenerateSpectrum { range: 0.0 });
    }
    let m = max_steps.max(2).min(n);

    let mut rng = StdRng::seed_from_u64(seed);
    let mut v = random_phase_vector(n, &mut rng);
    v /= Complex64::new((n as f64).sqrt(), 0.0);

    let mut v_prev = CVec::zeros(n);
    let mut w = CVec::zeros(n);
    let mut beta_prev = 0.0;

    let mut alpha: Vec<f64> = Vec::with_capacity(m);
    let mut beta: Vec<f64> = Vec::with_capacity(m);

    let mut prev_extremes = (f64::MAX, f64::MIN);

    for j in 0..m {
        h.matvec(&v, &mut w);

        // α_j = ⟨v_j| H |v_j⟩, real for Hermitian H
        let a_j = v.dotc(&w).re;
        alpha.push(a_j);

        // w = H v_j - α_j v_j - β_{j-1} v_{j-1}
        for i in 0..n {
            w[i] -= a_j * v[i] + beta_prev * v_prev[i];
        }

        let b_next = w.norm();
        if b_next < 1e-12 {
            // Invariant subspace: the tridiagonal matrix is already exact.
            break;
        }

        // Periodic convergence check on the extremal Ritz values.
        if (j + 1) % 8 == 0 || j == m - 1 {
            let (lo, hi) = tridiagonal_extremes(&alpha, &beta);
            let scale = (hi - lo).abs().max(1.0);
            if (lo - prev_extremes.0).abs() < 1e-6 * scale
                && (hi - prev_extremes.1).abs() < 1e-6 * scale
            {
                break;
            }
            prev_extremes = (lo, hi);
        }

        beta.push(b_next);
        std::mem::swap(&mut v_prev, &mut v);
        for i in 0..n {
            v[i] = w[i] / b_next;
        }
        beta_prev = b_next;
    }

    let (mut e_min, mut e_max) = tridiagonal_extremes(&alpha, &beta);

    // Lanczos brackets from the inside; pad both ends.
    let pad = BOUNDS_MARGIN * (e_max - e_min);
    e_min -= pad;
    e_max += pad;

    ScalingFactors::from_bounds(e_min, e_max)
}

/// Extremal eigenvalues of the symmetric tridiagonal matrix (α, β).
fn tridiagonal_extremes(alpha: &[f64], beta: &[f64]) -> (f64, f64) {
    let m = alpha.len();
    let mut t = RMat::zeros(m, m);
    for i in 0..m {
        t[(i, i)] = alpha[i];
        if i > 0 && i - 1 < beta.len() {
            t[(i, i - 1)] = beta[i - 1];
            t[(i - 1, i)] = beta[i - 1];
        }
    }
    let eig = t.symmetric_eigen();
    let mut lo = f64::MAX;
    let mut hi = f64::MIN;
    for &e in eig.eigenvalues.iter() {
        lo = lo.min(e);
        hi = hi.max(e);
    }
    (lo, hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dimer(t: f64) -> CsrMatrix {
        CsrMatrix::from_real_triplets(2, &[(0, 1, t), (1, 0, t)])
    }

    fn chain(n: usize, t: f64) -> CsrMatrix {
        let mut trip = Vec::new();
        for i in 0..n - 1 {
            trip.push((i, i + 1, t));
            trip.push((i + 1, i, t));
        }
        CsrMatrix::from_real_triplets(n, &trip)
    }

    #[test]
    fn test_dimer_bounds() {
        // H = [[0, 1], [1, 0]] has eigenvalues ±1; a 2-step Krylov space is exact.
        let sf = estimate_bounds(&dimer(1.0), 64, 0).unwrap();
        assert!((sf.e_min + 1.0).abs() < 0.05, "e_min = {}", sf.e_min);
        assert!((sf.e_max - 1.0).abs() < 0.05, "e_max = {}", sf.e_max);
        assert!(sf.b.abs() < 1e-10, "b = {}", sf.b);
    }

    #[test]
    fn test_chain_bounds_cover_spectrum() {
        // Open chain spectrum: 2t·cos(kπ/(n+1)) ⊂ (-2t, 2t).
        let n = 64;
        let sf = estimate_bounds(&chain(n, 1.0), 80, 1).unwrap();
        let edge = 2.0 * (std::f64::consts::PI / (n as f64 + 1.0)).cos();
        assert!(sf.e_min <= -edge + 1e-6, "e_min = {} > {}", sf.e_min, -edge);
        assert!(sf.e_max >= edge - 1e-6, "e_max = {} < {edge}", sf.e_max);
        // And not wildly overestimated.
        assert!(sf.e_max < 2.5 && sf.e_min > -2.5);
    }

    #[test]
    fn test_diagonal_matrix_bounds() {
        let m = CsrMatrix::from_real_triplets(
            4,
            &[(0, 0, -3.0), (1, 1, 0.5), (2, 2, 2.0), (3, 3, 7.0)],
        );
        let sf = estimate_bounds(&m, 32, 2).unwrap();
        assert!(sf.e_min <= -3.0 + 1e-6 && sf.e_min > -3.5);
        assert!(sf.e_max >= 7.0 - 1e-6 && sf.e_max < 7.5);
    }

    #[test]
    fn test_zero_matrix_degenerate() {
        let m = CsrMatrix::from_real_triplets(3, &[]);
        let err = estimate_bounds(&m, 16, 0).unwrap_err();
        assert!(matches!(err, KpmError::DegenerateSpectrum { .. }));
    }

    #[test]
    fn test_identity_degenerate() {
        let m = CsrMatrix::from_real_triplets(3, &[(0, 0, 1.0), (1, 1, 1.0), (2, 2, 1.0)]);
        let err = estimate_bounds(&m, 16, 0).unwrap_err();
        assert!(matches!(err, KpmError::DegenerateSpectrum { .. }));
    }

    #[test]
    fn test_scaling_formula() {
        let sf = ScalingFactors::from_bounds(-2.0, 4.0).unwrap();
        assert!((sf.a - 6.0 / 1.99).abs() < 1e-12);
        assert!((sf.b - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_rescale_energy_inside_window() {
        let sf = ScalingFactors::from_bounds(-1.0, 1.0).unwrap();
        let x = sf.rescale_energy(1.0).unwrap();
        assert!(x < 1.0 && x > 0.99 / 1.01, "x = {x}");
        assert!(sf.rescale_energy(0.0).unwrap().abs() < 1e-12);
    }

    #[test]
    fn test_rescale_energy_out_of_bounds() {
        let sf = ScalingFactors::from_bounds(-1.0, 1.0).unwrap();
        let err = sf.rescale_energy(2.0).unwrap_err();
        assert!(matches!(err, KpmError::EnergyOutOfBounds { .. }));
    }
}
