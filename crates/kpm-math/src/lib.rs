//! Numeric primitives for the KPM spectral engine.
//!
//! Provides the complex dense-vector aliases and the Hermitian sparse
//! matrix used by the Chebyshev recurrence in `kpm`.

pub mod csr;
pub mod random;

pub use csr::CsrMatrix;
pub use random::random_phase_vector;

use nalgebra as na;
pub use num_complex::Complex64;

/// Dense complex vector.
pub type CVec = na::DVector<Complex64>;
/// Dense complex matrix.
pub type CMat = na::DMatrix<Complex64>;
/// Dense real vector.
pub type RVec = na::DVector<f64>;
/// Dense real matrix.
pub type RMat = na::DMatrix<f64>;

/// Unit basis vector |i⟩ of length `n`.
pub fn basis_vector(n: usize, i: usize) -> CVec {
    let mut v = CVec::zeros(n);
    v[i] = Complex64::new(1.0, 0.0);
    v
}
