//! Kernel Polynomial Method engine for spectral quantities on large
//! sparse Hermitian Hamiltonians.
//!
//! Expands spectral functions in damped Chebyshev series instead of
//! diagonalizing: the spectrum is rescaled into (-1, 1), moments
//! μ_n = ⟨β|Op T_n(H̃)|α⟩ are generated by a three-term recurrence at one
//! sparse matvec per step, and a damping kernel controls the truncation
//! broadening. Whole-system traces (DOS, conductivity) are estimated
//! stochastically over random-phase vectors.
//!
//! # Modules
//!
//! - [`bounds`]: Lanczos spectral-bounds estimate and energy rescaling
//! - [`rescale`]: lazily applied H̃ = (H - b·I)/a operator
//! - [`kernel`]: Jackson / Lorentz / Dirichlet damping kernels
//! - [`moments`]: Chebyshev recurrence, batched and double expansions
//! - [`reconstruct`]: moments → LDOS/DOS, Green's function, conductivity
//! - [`stochastic`]: random-phase trace estimation
//! - [`series`]: result containers
//! - [`engine`]: the [`Kpm`] calculator facade
//!
//! # Example
//!
//! ```
//! use kpm::{Kpm, KpmConfig};
//! use kpm_math::CsrMatrix;
//!
//! // Two-site dimer, H = [[0, t], [t, 0]] with t = 1 eV.
//! let h = CsrMatrix::from_real_triplets(2, &[(0, 1, 1.0), (1, 0, 1.0)]);
//! let kpm = Kpm::new(&h);
//! let ldos = kpm.ldos(&[-1.0, 0.0, 1.0], 0.1, 0).unwrap();
//! assert!(ldos.y[1] < ldos.y[2]); // midgap ≪ band edge
//! ```

pub mod bounds;
pub mod engine;
pub mod error;
pub mod kernel;
pub mod moments;
pub mod reconstruct;
pub mod rescale;
pub mod series;
pub mod stochastic;

pub use bounds::{estimate_bounds, ScalingFactors};
pub use engine::{Kpm, KpmConfig};
pub use error::{KpmError, Result};
pub use kernel::DampingKernel;
pub use moments::{MomentMatrix, MomentSequence, MAX_MOMENTS};
pub use series::{Series, SpatialLdos};
