//! Chebyshev moment generation via the three-term recurrence.
//!
//! The moments of the expansion are
//!
//!   μ_n = ⟨β| Op T_n(H̃) |α⟩
//!
//! computed from
//!
//!   |t_0⟩ = |α⟩
//!   |t_1⟩ = H̃|t_0⟩
//!   |t_{n+1}⟩ = 2H̃|t_n⟩ - |t_{n-1}⟩
//!
//! Exactly one sparse matrix-vector product per step, so M moments cost
//! O(M·nnz). All validation happens before the first matvec.

use crate::error::{KpmError, Result};
use crate::rescale::RescaledHamiltonian;
use kpm_math::{CMat, CVec, Complex64, CsrMatrix};
use rayon::prelude::*;

/// Practical ceiling on the moment count; beyond this the expansion cost
/// dwarfs any realistic resolution gain.
pub const MAX_MOMENTS: usize = 1_000_000;

/// Chebyshev moments μ_0 .. μ_{M-1} for one (α, β, Op) triple.
///
/// Transient: produced per call and consumed once by reconstruction.
#[derive(Debug, Clone)]
pub struct MomentSequence {
    pub mu: Vec<Complex64>,
}

impl MomentSequence {
    pub fn len(&self) -> usize {
        self.mu.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mu.is_empty()
    }

    /// Moments with damping coefficients applied elementwise.
    pub fn damped(&self, coefficients: &[f64]) -> Result<Vec<Complex64>> {
        check_len("damping coefficients", coefficients.len(), self.mu.len())?;
        Ok(self
            .mu
            .iter()
            .zip(coefficients)
            .map(|(&mu, &g)| mu * g)
            .collect())
    }
}

/// Double-indexed moments μ_nm for operator-weighted double expansions
/// (Kubo-Bastin conductivity).
#[derive(Debug, Clone)]
pub struct MomentMatrix {
    /// μ_nm, row n (left index), column m (right index), both 0..order.
    pub mu: CMat,
}

impl MomentMatrix {
    pub fn order(&self) -> usize {
        self.mu.nrows()
    }
}

fn check_len(context: &'static str, got: usize, expected: usize) -> Result<()> {
    if got != expected {
        return Err(KpmError::DimensionMismatch {
            context,
            got,
            expected,
        });
    }
    Ok(())
}

fn check_moment_count(num_moments: usize) -> Result<()> {
    if num_moments < 1 || num_moments > MAX_MOMENTS {
        return Err(KpmError::InvalidMomentCount {
            requested: num_moments,
            max: MAX_MOMENTS,
        });
    }
    Ok(())
}

/// Diagonal moments μ_n = ⟨α| T_n(H̃) |α⟩.
///
/// Fast path for β = α and identity operator: each step needs only the
/// recurrence matvec and one dot product.
pub fn diagonal_moments(
    h: &RescaledHamiltonian<'_>,
    alpha: &CVec,
    num_moments: usize,
) -> Result<MomentSequence> {
    generalized_moments(h, alpha, None, None, num_moments)
}

/// Generalized moments μ_n = ⟨β| Op T_n(H̃) |α⟩.
///
/// `beta` defaults to α (diagonal moments), `op` to the identity.
pub fn generalized_moments(
    h: &RescaledHamiltonian<'_>,
    alpha: &CVec,
    beta: Option<&CVec>,
    op: Option<&CsrMatrix>,
    num_moments: usize,
) -> Result<MomentSequence> {
    check_moment_count(num_moments)?;
    let n = h.dim();
    check_len("starting vector α", alpha.len(), n)?;
    if let Some(beta) = beta {
        check_len("ending vector β", beta.len(), n)?;
    }
    if let Some(op) = op {
        check_len("operator dimension", op.dim(), n)?;
    }

    let bra = beta.unwrap_or(alpha);
    let mut mu = Vec::with_capacity(num_moments);

    // Scratch for Op|t_n⟩ on the generalized path only.
    let mut op_buf = op.map(|_| CVec::zeros(n));
    let mut project = |t: &CVec| -> Complex64 {
        match (op, op_buf.as_mut()) {
            (Some(op), Some(buf)) => {
                op.matvec(t, buf);
                bra.dotc(buf)
            }
            _ => bra.dotc(t),
        }
    };

    // t_0 = α
    let mut t_prev = alpha.clone();
    mu.push(project(&t_prev));
    if num_moments == 1 {
        return Ok(MomentSequence { mu });
    }

    // t_1 = H̃ α
    let mut t_cur = CVec::zeros(n);
    h.apply(&t_prev, &mut t_cur);
    mu.push(project(&t_cur));

    let mut w = CVec::zeros(n);
    for _ in 2..num_moments {
        // t_{n+1} = 2 H̃ t_n - t_{n-1}
        h.apply(&t_cur, &mut w);
        for i in 0..n {
            w[i] = 2.0 * w[i] - t_prev[i];
        }
        std::mem::swap(&mut t_prev, &mut t_cur);
        std::mem::swap(&mut t_cur, &mut w);
        mu.push(project(&t_cur));
    }

    Ok(MomentSequence { mu })
}

/// Diagonal moments for a batch of starting vectors.
///
/// The vectors are independent, so the batch runs on the rayon pool; the
/// output order matches the input order regardless of thread count.
pub fn batch_diagonal_moments(
    h: &RescaledHamiltonian<'_>,
    alphas: &[CVec],
    num_moments: usize,
) -> Result<Vec<MomentSequence>> {
    check_moment_count(num_moments)?;
    for alpha in alphas {
        check_len("starting vector α", alpha.len(), h.dim())?;
    }
    alphas
        .par_iter()
        .map(|alpha| diagonal_moments(h, alpha, num_moments))
        .collect()
}

/// Double moments μ_nm = ⟨r| Op_l T_n(H̃) Op_r T_m(H̃) |r⟩.
///
/// The left Chebyshev ladder φ_n = T_n(H̃) Op_l |r⟩ is stored in full
/// (M vectors of length N) while the right ladder is streamed, so the cost
/// is 2M matvecs with Op applications plus M² dot products; the stored
/// ladder makes M·N the binding memory constraint.
pub fn moment_matrix(
    h: &RescaledHamiltonian<'_>,
    op_left: &CsrMatrix,
    op_right: &CsrMatrix,
    r: &CVec,
    num_moments: usize,
) -> Result<MomentMatrix> {
    check_moment_count(num_moments)?;
    let n = h.dim();
    check_len("starting vector", r.len(), n)?;
    check_len("left operator dimension", op_left.dim(), n)?;
    check_len("right operator dimension", op_right.dim(), n)?;

    // Left ladder seeded with Op_l |r⟩ (Op_l is Hermitian, so
    // ⟨r| Op_l T_n(H̃) = φ_n† with φ_n = T_n(H̃) Op_l |r⟩).
    let mut seed = CVec::zeros(n);
    op_left.matvec(r, &mut seed);
    let left = chebyshev_ladder(h, &seed, num_moments);

    let mut mu = CMat::zeros(num_moments, num_moments);

    // Right ladder from |r⟩, streamed.
    let mut t_prev = r.clone();
    let mut t_cur = CVec::zeros(n);
    let mut w = CVec::zeros(n);
    let mut q = CVec::zeros(n);

    for m in 0..num_moments {
        if m == 1 {
            h.apply(&t_prev, &mut t_cur);
        } else if m >= 2 {
            h.apply(&t_cur, &mut w);
            for i in 0..n {
                w[i] = 2.0 * w[i] - t_prev[i];
            }
            std::mem::swap(&mut t_prev, &mut t_cur);
            std::mem::swap(&mut t_cur, &mut w);
        }
        let x_m = if m == 0 { &t_prev } else { &t_cur };

        op_right.matvec(x_m, &mut q);
        for (ni, phi) in left.iter().enumerate() {
            mu[(ni, m)] = phi.dotc(&q);
        }
    }

    Ok(MomentMatrix { mu })
}

/// Full Chebyshev vector ladder t_0 .. t_{M-1} from a seed vector.
fn chebyshev_ladder(h: &RescaledHamiltonian<'_>, seed: &CVec, num_moments: usize) -> Vec<CVec> {
    let n = h.dim();
    let mut ladder = Vec::with_capacity(num_moments);
    ladder.push(seed.clone());
    if num_moments == 1 {
        return ladder;
    }
    let mut t1 = CVec::zeros(n);
    h.apply(seed, &mut t1);
    ladder.push(t1);
    for m in 2..num_moments {
        let mut next = CVec::zeros(n);
        h.apply(&ladder[m - 1], &mut next);
        for i in 0..n {
            next[i] = 2.0 * next[i] - ladder[m - 2][i];
        }
        ladder.push(next);
    }
    ladder
}
