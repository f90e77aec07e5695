//! High-level KPM calculator.
//!
//! [`Kpm`] borrows a Hermitian sparse Hamiltonian for the duration of a
//! calculation, estimates and caches the spectral rescaling once, and
//! exposes the physical quantities: LDOS, spatial LDOS, DOS, Green's
//! function, Kubo-Bastin conductivity, and raw moment access.

use crate::bounds::{estimate_bounds, ScalingFactors};
use crate::error::{KpmError, Result};
use crate::kernel::DampingKernel;
use crate::moments::{batch_diagonal_moments, generalized_moments, MomentSequence};
use crate::reconstruct::{reconstruct_conductivity, reconstruct_density, reconstruct_greens};
use crate::rescale::RescaledHamiltonian;
use crate::series::{Series, SpatialLdos};
use crate::stochastic::{stochastic_moment_matrix, stochastic_trace_moments};
use kpm_math::{basis_vector, CVec, Complex64, CsrMatrix};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Tuning knobs for a [`Kpm`] calculator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KpmConfig {
    /// Damping kernel applied to every truncated expansion.
    pub kernel: DampingKernel,
    /// Random vectors for stochastic traces (DOS, conductivity). Larger
    /// systems converge with fewer vectors; variance ~ 1/(R·N).
    pub num_random: usize,
    /// Explicit moment-count override; `None` derives the count from the
    /// requested broadening via the kernel.
    pub num_moments: Option<usize>,
    /// Known spectral bounds (E_min, E_max); `None` runs the Lanczos
    /// estimator on first use.
    pub bounds: Option<(f64, f64)>,
    /// Maximum Lanczos steps for bounds estimation.
    pub lanczos_steps: usize,
    /// Seed for every stochastic element (bounds start vector included).
    pub seed: u64,
}

impl Default for KpmConfig {
    fn default() -> Self {
        Self {
            kernel: DampingKernel::Jackson,
            num_random: 10,
            num_moments: None,
            bounds: None,
            lanczos_steps: 64,
            seed: 0,
        }
    }
}

/// KPM calculator bound to one Hamiltonian.
///
/// Scaling factors are computed lazily on first use and cached; the
/// Hamiltonian is held by read-only reference, so it may be shared with
/// other calculators or worker threads for the calculator's lifetime.
pub struct Kpm<'a> {
    h: &'a CsrMatrix,
    config: KpmConfig,
    scale: OnceCell<ScalingFactors>,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a> Kpm<'a> {
    pub fn new(h: &'a CsrMatrix) -> Self {
        Self::with_config(h, KpmConfig::default())
    }

    pub fn with_config(h: &'a CsrMatrix, config: KpmConfig) -> Self {
        Self {
            h,
            config,
            scale: OnceCell::new(),
            cancel: None,
        }
    }

    /// Install a cooperative cancellation flag, polled between
    /// random-vector iterations of long stochastic calculations.
    pub fn set_cancel_flag(&mut self, flag: Arc<AtomicBool>) {
        self.cancel = Some(flag);
    }

    /// Rescaling for this Hamiltonian (estimated once, then cached).
    pub fn scaling_factors(&self) -> Result<ScalingFactors> {
        self.scale
            .get_or_try_init(|| match self.config.bounds {
                Some((e_min, e_max)) => ScalingFactors::from_bounds(e_min, e_max),
                None => estimate_bounds(self.h, self.config.lanczos_steps, self.config.seed),
            })
            .map(|&s| s)
    }

    /// Moment count for a target broadening: explicit override if set,
    /// otherwise the kernel's requirement at ε = broadening / a.
    fn num_moments(&self, broadening: f64, scale: ScalingFactors) -> Result<usize> {
        match self.config.num_moments {
            Some(m) => Ok(m),
            None => self.config.kernel.required_num_moments(broadening / scale.a),
        }
    }

    fn rescaled(&self) -> Result<RescaledHamiltonian<'a>> {
        Ok(RescaledHamiltonian::new(self.h, self.scaling_factors()?))
    }

    fn site_vector(&self, site: usize) -> Result<CVec> {
        if site >= self.h.dim() {
            return Err(KpmError::DimensionMismatch {
                context: "site index",
                got: site,
                expected: self.h.dim(),
            });
        }
        Ok(basis_vector(self.h.dim(), site))
    }

    /// Raw moments μ_n = ⟨β|Op T_n(H̃)|α⟩ for callers that post-process
    /// the expansion themselves.
    pub fn moments(
        &self,
        alpha: &CVec,
        beta: Option<&CVec>,
        op: Option<&CsrMatrix>,
        num_moments: usize,
    ) -> Result<MomentSequence> {
        generalized_moments(&self.rescaled()?, alpha, beta, op, num_moments)
    }

    /// Local density of states at one site over an energy grid.
    pub fn ldos(&self, energies: &[f64], broadening: f64, site: usize) -> Result<Series> {
        let scale = self.scaling_factors()?;
        let num_moments = self.num_moments(broadening, scale)?;
        let alpha = self.site_vector(site)?;

        let seq = generalized_moments(&self.rescaled()?, &alpha, None, None, num_moments)?;
        let g = self.config.kernel.coefficients(num_moments)?;
        reconstruct_density(&seq.damped(&g)?, scale, energies)
    }

    /// LDOS for a batch of sites sharing one energy grid and broadening.
    ///
    /// Sites are independent, so the moment batches run in parallel; the
    /// output follows the input site order.
    pub fn spatial_ldos(
        &self,
        energies: &[f64],
        broadening: f64,
        sites: &[usize],
    ) -> Result<SpatialLdos> {
        let scale = self.scaling_factors()?;
        let num_moments = self.num_moments(broadening, scale)?;
        let g = self.config.kernel.coefficients(num_moments)?;

        let alphas: Vec<CVec> = sites
            .iter()
            .map(|&s| self.site_vector(s))
            .collect::<Result<_>>()?;
        let sequences = batch_diagonal_moments(&self.rescaled()?, &alphas, num_moments)?;

        let mut values = Vec::with_capacity(sites.len());
        for seq in &sequences {
            values.push(reconstruct_density(&seq.damped(&g)?, scale, energies)?.y);
        }
        Ok(SpatialLdos {
            energies: energies.to_vec(),
            sites: sites.to_vec(),
            values,
        })
    }

    /// Total density of states via stochastic trace estimation.
    ///
    /// Normalized so that ∫ DOS(E) dE ≈ N (one state per site).
    pub fn dos(&self, energies: &[f64], broadening: f64) -> Result<Series> {
        let scale = self.scaling_factors()?;
        let num_moments = self.num_moments(broadening, scale)?;

        let seq = stochastic_trace_moments(
            &self.rescaled()?,
            self.config.num_random,
            num_moments,
            self.config.seed,
            self.cancel.as_deref(),
        )?;
        let g = self.config.kernel.coefficients(num_moments)?;
        reconstruct_density(&seq.damped(&g)?, scale, energies)
    }

    /// Matrix element G_ij(E) of the retarded Green's function.
    ///
    /// The Lorentz kernel matches the Lorentzian broadening this
    /// reconstruction implies; Jackson works but mixes broadening shapes.
    pub fn greens(
        &self,
        row: usize,
        col: usize,
        energies: &[f64],
        broadening: f64,
    ) -> Result<Vec<Complex64>> {
        let scale = self.scaling_factors()?;
        let num_moments = self.num_moments(broadening, scale)?;
        let alpha = self.site_vector(col)?;
        let beta = self.site_vector(row)?;

        let seq =
            generalized_moments(&self.rescaled()?, &alpha, Some(&beta), None, num_moments)?;
        let g = self.config.kernel.coefficients(num_moments)?;
        reconstruct_greens(&seq.damped(&g)?, scale, energies)
    }

    /// Kubo-Bastin conductivity over chemical potentials, at temperature
    /// `kt` (energy units; `0` is the sharp-step limit).
    ///
    /// `velocity` is the Hermitian velocity operator in the same basis as
    /// the Hamiltonian. Uses stochastic double moments averaged over
    /// `num_random` vectors.
    pub fn conductivity(
        &self,
        velocity: &CsrMatrix,
        chemical_potentials: &[f64],
        broadening: f64,
        kt: f64,
    ) -> Result<Series> {
        let scale = self.scaling_factors()?;
        let num_moments = self.num_moments(broadening, scale)?;

        let mm = stochastic_moment_matrix(
            &self.rescaled()?,
            velocity,
            velocity,
            self.config.num_random,
            num_moments,
            self.config.seed,
            self.cancel.as_deref(),
        )?;
        let g = self.config.kernel.coefficients(num_moments)?;
        let quadrature_points = (2 * num_moments).max(256);
        reconstruct_conductivity(&mm, &g, scale, chemical_potentials, kt, quadrature_points)
    }
}
