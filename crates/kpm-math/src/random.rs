//! Random-phase vectors for stochastic trace estimation.

use crate::{CVec, Complex64};
use rand::Rng;
use std::f64::consts::TAU;

/// Vector with unit-modulus components exp(iθ_j), θ_j uniform in [0, 2π).
///
/// Components are independent, zero-mean, and uncorrelated, which makes
/// E[⟨r|A|r⟩] = Tr[A] for any fixed operator A. Note ⟨r|r⟩ = N, not 1.
pub fn random_phase_vector<R: Rng>(n: usize, rng: &mut R) -> CVec {
    CVec::from_iterator(
        n,
        (0..n).map(|_| {
            let theta = rng.gen_range(0.0..TAU);
            Complex64::from_polar(1.0, theta)
        }),
    )
}
