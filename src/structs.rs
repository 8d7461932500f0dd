use crate::prelude::*;

/* #region solver inputs */

/// Full integrals and the occupied/virtual boundary.
#[derive(Debug, Clone)]
pub struct CCSDInfo {
    /// One-electron (Fock) matrix, `(norb, norb)`.
    pub fock: Tsr,
    /// Antisymmetrized two-electron integrals `<pq||rs>`, `(norb,)×4`.
    pub eri: Tsr,
    pub space: OrbitalSpace,
}

impl CCSDInfo {
    pub fn nocc(&self) -> usize {
        self.space.nocc()
    }

    pub fn nvir(&self) -> usize {
        self.space.nvir()
    }

    pub fn norb(&self) -> usize {
        self.space.norb()
    }
}

/// Reciprocal orbital-energy differences used to precondition the update.
///
/// - `e_ai[a,i] = 1 / (eps_i - eps_a)`
/// - `e_abij[a,b,i,j] = 1 / (eps_i + eps_j - eps_a - eps_b)`
#[derive(Debug, Clone)]
pub struct Denominators {
    pub e_ai: Tsr,
    pub e_abij: Tsr,
}

impl Denominators {
    /// Build from orbital energies of length `norb`.
    ///
    /// Degenerate occupied/virtual pairs give infinite entries; the kernel
    /// reports those as non-finite amplitudes.
    pub fn from_orbital_energies(mo_energy: &Tsr, space: &OrbitalSpace) -> CCResult<Self> {
        if mo_energy.shape().as_slice() != [space.norb()] {
            return Err(CCError::Shape(format!(
                "orbital energies have shape {:?}, expected [{}]",
                mo_energy.shape(),
                space.norb()
            )));
        }
        let so = slice!(0, space.nocc());
        let sv = slice!(space.nocc(), space.norb());

        // d_ai = eps_i - eps_a
        let d_ai = mo_energy.i((None, so)) - mo_energy.i((sv, None));
        let d_abij = d_ai.i((.., None, .., None)) + d_ai.i((None, .., None, ..));

        Ok(Self { e_ai: d_ai.mapv(|x| 1.0 / x), e_abij: d_abij.mapv(|x| 1.0 / x) })
    }

    /// Build from the diagonal of the Fock matrix.
    pub fn from_fock_diagonal(fock: &Tsr, space: &OrbitalSpace) -> CCResult<Self> {
        if fock.shape().as_slice() != [space.norb(), space.norb()] {
            return Err(CCError::Shape(format!(
                "fock has shape {:?}, expected [{n}, {n}]",
                fock.shape(),
                n = space.norb()
            )));
        }
        let mo_energy = fock.diagonal(None).to_owned();
        Self::from_orbital_energies(&mo_energy, space)
    }

    pub fn validate(&self, space: &OrbitalSpace) -> CCResult<()> {
        if self.e_ai.shape() != &space.t1_shape() || self.e_abij.shape() != &space.t2_shape() {
            return Err(CCError::Shape(format!(
                "denominators have shapes {:?} and {:?}, expected {:?} and {:?}",
                self.e_ai.shape(),
                self.e_abij.shape(),
                space.t1_shape(),
                space.t2_shape()
            )));
        }
        Ok(())
    }
}

/* #endregion */

/* #region configuration */

#[derive(Debug, Clone)]
pub struct CCSDConfig {
    /// Maximum number of iterations. Zero returns the input amplitudes.
    pub max_iter: usize,

    /// Convergence threshold on the absolute energy change between iterations.
    pub stopping_eps: f64,

    /// DIIS history size; `None` disables extrapolation.
    pub diis_size: Option<usize>,

    /// Number of DIIS updates before extrapolation begins.
    pub diis_start_cycle: usize,
}

impl Default for CCSDConfig {
    fn default() -> Self {
        Self { max_iter: 100, stopping_eps: 1.0e-12, diis_size: None, diis_start_cycle: 4 }
    }
}

impl CCSDConfig {
    pub fn validate(&self) -> CCResult<()> {
        if !(self.stopping_eps.is_finite() && self.stopping_eps >= 0.0) {
            return Err(CCError::Config(format!("stopping_eps must be finite and >= 0, got {}", self.stopping_eps)));
        }
        if self.diis_size == Some(0) {
            return Err(CCError::Config("diis_size must be >= 1 when DIIS is enabled".to_string()));
        }
        Ok(())
    }
}

/* #endregion */

/* #region results */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CCSDStatus {
    /// Energy change fell below `stopping_eps`.
    Converged,
    /// `max_iter` iterations ran without meeting the criterion.
    Exhausted,
}

#[derive(Debug, Clone)]
pub struct CCSDResults {
    pub t1: Tsr,
    pub t2: Tsr,
    /// Total CCSD energy of the returned amplitudes.
    pub energy: f64,
    pub status: CCSDStatus,
    pub niter: usize,
    pub energy_history: Vec<f64>,
}

impl CCSDResults {
    pub fn converged(&self) -> bool {
        self.status == CCSDStatus::Converged
    }
}

/* #endregion */
