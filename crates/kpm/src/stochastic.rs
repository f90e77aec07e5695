//! Stochastic trace estimation.
//!
//! Whole-system quantities (DOS, conductivity) need Tr[Op·T_n(H̃)], which
//! is approximated by averaging ⟨r|Op T_n(H̃)|r⟩ over R random-phase
//! vectors. Unit-modulus, zero-mean, uncorrelated components make the
//! estimator unbiased; its variance shrinks as O(1/(R·N)), so larger
//! systems need fewer vectors.
//!
//! All random vectors are drawn up front from one seeded generator, and
//! partial results are reduced in index order, so a given seed produces
//! bit-identical output regardless of the rayon thread count.

use crate::error::{KpmError, Result};
use crate::moments::{diagonal_moments, moment_matrix, MomentMatrix, MomentSequence};
use crate::rescale::RescaledHamiltonian;
use kpm_math::{random_phase_vector, CMat, CVec, Complex64, CsrMatrix};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};

fn draw_vectors(n: usize, num_random: usize, seed: u64) -> Vec<CVec> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..num_random.max(1))
        .map(|_| random_phase_vector(n, &mut rng))
        .collect()
}

fn check_cancel(cancel: Option<&AtomicBool>) -> Result<()> {
    if let Some(flag) = cancel {
        if flag.load(Ordering::Relaxed) {
            return Err(KpmError::Cancelled);
        }
    }
    Ok(())
}

/// Averaged diagonal moments (1/R) Σ_r ⟨r|T_n(H̃)|r⟩ ≈ Tr[T_n(H̃)].
///
/// `num_random` is clamped to at least 1. The optional cancellation flag
/// is polled once per random vector; on cancellation the whole calculation
/// fails without returning partial sums.
pub fn stochastic_trace_moments(
    h: &RescaledHamiltonian<'_>,
    num_random: usize,
    num_moments: usize,
    seed: u64,
    cancel: Option<&AtomicBool>,
) -> Result<MomentSequence> {
    let vectors = draw_vectors(h.dim(), num_random, seed);
    let per_vector: Vec<MomentSequence> = vectors
        .par_iter()
        .map(|r| {
            check_cancel(cancel)?;
            diagonal_moments(h, r, num_moments)
        })
        .collect::<Result<_>>()?;

    Ok(average_sequences(&per_vector))
}

/// Averaged double moments (1/R) Σ_r ⟨r|Op_l T_n Op_r T_m|r⟩ for the
/// Kubo-Bastin conductivity path.
pub fn stochastic_moment_matrix(
    h: &RescaledHamiltonian<'_>,
    op_left: &CsrMatrix,
    op_right: &CsrMatrix,
    num_random: usize,
    num_moments: usize,
    seed: u64,
    cancel: Option<&AtomicBool>,
) -> Result<MomentMatrix> {
    let vectors = draw_vectors(h.dim(), num_random, seed);
    let per_vector: Vec<MomentMatrix> = vectors
        .par_iter()
        .map(|r| {
            check_cancel(cancel)?;
            moment_matrix(h, op_left, op_right, r, num_moments)
        })
        .collect::<Result<_>>()?;

    let inv_r = Complex64::new(1.0 / per_vector.len() as f64, 0.0);
    let order = per_vector[0].order();
    let mut mu = CMat::zeros(order, order);
    for mm in &per_vector {
        mu += &mm.mu;
    }
    mu *= inv_r;
    Ok(MomentMatrix { mu })
}

/// Mean of the per-vector sequences, reduced in index order.
fn average_sequences(sequences: &[MomentSequence]) -> MomentSequence {
    let num_moments = sequences[0].len();
    let inv_r = 1.0 / sequences.len() as f64;
    let mut mu = vec![Complex64::new(0.0, 0.0); num_moments];
    for seq in sequences {
        for (acc, &m) in mu.iter_mut().zip(&seq.mu) {
            *acc += m;
        }
    }
    for m in &mut mu {
        *m *= inv_r;
    }
    MomentSequence { mu }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::ScalingFactors;
    use crate::kernel::DampingKernel;
    use crate::reconstruct::reconstruct_density;
    use std::sync::atomic::AtomicBool;

    fn chain(n: usize, t: f64) -> CsrMatrix {
        let mut trip = Vec::new();
        for i in 0..n - 1 {
            trip.push((i, i + 1, t));
            trip.push((i + 1, i, t));
        }
        CsrMatrix::from_real_triplets(n, &trip)
    }

    fn chain_setup(n: usize) -> (CsrMatrix, ScalingFactors) {
        let h = chain(n, 1.0);
        let sf = ScalingFactors::from_bounds(-2.05, 2.05).unwrap();
        (h, sf)
    }

    #[test]
    fn test_mu0_approximates_dimension() {
        // μ_0 = (1/R) Σ ⟨r|r⟩ = N exactly for unit-modulus phases.
        let (h, sf) = chain_setup(32);
        let resc = RescaledHamiltonian::new(&h, sf);
        let seq = stochastic_trace_moments(&resc, 4, 8, 0, None).unwrap();
        assert!(
            (seq.mu[0].re - 32.0).abs() < 1e-10,
            "μ_0 = {}",
            seq.mu[0]
        );
    }

    #[test]
    fn test_seed_reproducible() {
        let (h, sf) = chain_setup(16);
        let resc = RescaledHamiltonian::new(&h, sf);
        let a = stochastic_trace_moments(&resc, 3, 16, 7, None).unwrap();
        let b = stochastic_trace_moments(&resc, 3, 16, 7, None).unwrap();
        assert_eq!(a.mu, b.mu);
    }

    #[test]
    fn test_cancellation() {
        let (h, sf) = chain_setup(16);
        let resc = RescaledHamiltonian::new(&h, sf);
        let flag = AtomicBool::new(true);
        let err = stochastic_trace_moments(&resc, 4, 16, 0, Some(&flag)).unwrap_err();
        assert_eq!(err, KpmError::Cancelled);
    }

    #[test]
    fn test_more_vectors_reduce_scatter() {
        // Quadrupling R should roughly halve the run-to-run standard
        // deviation of the estimated DOS at a fixed energy.
        let (h, sf) = chain_setup(64);
        let resc = RescaledHamiltonian::new(&h, sf);
        let g = DampingKernel::Jackson.coefficients(64).unwrap();

        let dos_at_zero = |num_random: usize, seed: u64| -> f64 {
            let seq = stochastic_trace_moments(&resc, num_random, 64, seed, None).unwrap();
            let damped = seq.damped(&g).unwrap();
            reconstruct_density(&damped, sf, &[0.3]).unwrap().y[0]
        };

        let std_dev = |num_random: usize| -> f64 {
            let samples: Vec<f64> = (0..12).map(|s| dos_at_zero(num_random, 1000 + s)).collect();
            let mean = samples.iter().sum::<f64>() / samples.len() as f64;
            (samples.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>()
                / samples.len() as f64)
                .sqrt()
        };

        let s1 = std_dev(2);
        let s4 = std_dev(8);
        assert!(
            s4 < 0.85 * s1,
            "scatter did not shrink: R=2 gives {s1}, R=8 gives {s4}"
        );
    }
}
