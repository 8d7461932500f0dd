use crate::integrals::eri_antisymmetry_error;
use crate::prelude::*;

/* #region amplitude layout */

/// Flat concatenation of `(t1, t2)`, the vector space DIIS works in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmplitudeLayout {
    pub t1_shape: Vec<usize>,
    pub t2_shape: Vec<usize>,
}

impl AmplitudeLayout {
    pub fn new(space: &OrbitalSpace) -> Self {
        Self { t1_shape: space.t1_shape(), t2_shape: space.t2_shape() }
    }

    pub fn t1_size(&self) -> usize {
        self.t1_shape.iter().product()
    }

    pub fn size(&self) -> usize {
        self.t1_size() + self.t2_shape.iter().product::<usize>()
    }

    pub fn validate(&self, t1: &Tsr, t2: &Tsr) -> CCResult<()> {
        if t1.shape() != &self.t1_shape || t2.shape() != &self.t2_shape {
            return Err(CCError::Shape(format!(
                "amplitudes have shapes {:?} and {:?}, expected {:?} and {:?}",
                t1.shape(),
                t2.shape(),
                self.t1_shape,
                self.t2_shape
            )));
        }
        Ok(())
    }

    pub fn zeros(&self, device: &DeviceTsr) -> (Tsr, Tsr) {
        (rt::zeros((self.t1_shape.clone(), device)), rt::zeros((self.t2_shape.clone(), device)))
    }

    pub fn pack(&self, t1: &Tsr, t2: &Tsr) -> Tsr {
        let n1 = self.t1_size();
        let mut cat: Tsr = rt::zeros(([self.size()], t1.device()));
        cat.i_mut(..n1).assign(t1.reshape(-1));
        cat.i_mut(n1..).assign(t2.reshape(-1));
        cat
    }

    pub fn unpack(&self, cat: &Tsr) -> (Tsr, Tsr) {
        let n1 = self.t1_size();
        let t1 = cat.i(..n1).into_shape(&self.t1_shape);
        let t2 = cat.i(n1..).into_shape(&self.t2_shape);
        (t1, t2)
    }
}

/* #endregion */

/* #region iteration */

/// First-order amplitudes `t1 = f_vo e_ai`, `t2 = <ab||ij> e_abij`.
///
/// The doubles part is the MP2 guess; its correlation energy is logged.
pub fn get_ccsd_initial_guess(info: &CCSDInfo, denom: &Denominators) -> CCResult<(Tsr, Tsr)> {
    denom.validate(&info.space)?;
    let (fock, eri) = integral_maps(&info.fock, &info.eri, &info.space)?;

    let t1 = &fock.vo * &denom.e_ai;
    let t2 = &eri.vvoo * &denom.e_abij;

    let e_corr = get_correlation_energy(&t1, &t2, &fock, &eri)?;
    info!("Initial correlation energy (first order): {e_corr:.15}");
    Ok((t1, t2))
}

/// Solve the CCSD amplitude equations by preconditioned fixed-point
/// iteration, optionally accelerated by DIIS.
///
/// Each step forms `t_new = (r(t) + t / e) * e`, where `e` holds the
/// reciprocal denominators. Iteration stops once the energy changes by less
/// than `config.stopping_eps`; after `config.max_iter` steps the last
/// amplitudes are returned with [`CCSDStatus::Exhausted`].
pub fn ccsd_kernel(
    info: &CCSDInfo,
    denom: &Denominators,
    t1: Tsr,
    t2: Tsr,
    config: &CCSDConfig,
) -> CCResult<CCSDResults> {
    let time_outer = std::time::Instant::now();

    config.validate()?;
    denom.validate(&info.space)?;
    let layout = AmplitudeLayout::new(&info.space);
    layout.validate(&t1, &t2)?;
    info!("CCSD: {} spin-orbitals ({} occupied, {} virtual)", info.norb(), info.nocc(), info.nvir());

    let timer = std::time::Instant::now();
    let (fock, eri) = integral_maps(&info.fock, &info.eri, &info.space)?;
    let antisym_error = eri_antisymmetry_error(&info.eri);
    if antisym_error > 1.0e-10 {
        warn!("two-electron integrals violate pairwise antisymmetry by {antisym_error:.3e}");
    }
    debug!("Time elapsed (integral partition): {:?}", timer.elapsed());

    // plain orbital-energy differences
    let fock_e_ai = denom.e_ai.mapv(|x| 1.0 / x);
    let fock_e_abij = denom.e_abij.mapv(|x| 1.0 / x);

    let mut diis_obj = match config.diis_size {
        Some(space) => {
            let flags = DIISIncoreFlags { space, start_cycle: config.diis_start_cycle, ..Default::default() };
            Some(DIISIncore::new(flags, info.fock.device())?)
        },
        None => None,
    };
    let mut old_vec = diis_obj.as_ref().map(|_| layout.pack(&t1, &t2));

    let (mut t1, mut t2) = (t1, t2);
    let mut old_energy = get_ccsd_energy_from_blocks(&t1, &t2, &fock, &eri)?;
    let mut energy_history = Vec::with_capacity(config.max_iter);
    info!("CCSD initial energy: {old_energy:.15}");

    for niter in 0..config.max_iter {
        let timer = std::time::Instant::now();

        let (mut rt1, mut rt2) = get_ccsd_residuals(&t1, &t2, &fock, &eri)?;
        let norm_r1 = rt1.l2_norm();
        let norm_r2 = rt2.l2_norm();
        debug!("Time elapsed (residuals): {:?}", timer.elapsed());

        rt1 += &fock_e_ai * &t1;
        rt2 += &fock_e_abij * &t2;
        let mut t1_new = &rt1 * &denom.e_ai;
        let mut t2_new = &rt2 * &denom.e_abij;

        if let (Some(diis_obj), Some(old_vec)) = (diis_obj.as_mut(), old_vec.as_mut()) {
            let timer = std::time::Instant::now();
            let t_vec = layout.pack(&t1_new, &t2_new);
            let err = &*old_vec - &t_vec;
            let t_vec = diis_obj.update(t_vec, err)?;
            (t1_new, t2_new) = layout.unpack(&t_vec);
            *old_vec = t_vec;
            debug!("Time elapsed (diis update): {:?}", timer.elapsed());
        }

        if !(t1_new.l2_norm().is_finite() && t2_new.l2_norm().is_finite()) {
            return Err(CCError::NonFinite { iteration: niter });
        }

        let energy = get_ccsd_energy_from_blocks(&t1_new, &t2_new, &fock, &eri)?;
        let delta_e = (old_energy - energy).abs();
        energy_history.push(energy);
        info!(
            "Iteration {niter:>4}  E = {energy:>22.15}  dE = {delta_e:>10.3e}  |r1| = {norm_r1:>10.3e}  |r2| = {norm_r2:>10.3e}"
        );

        t1 = t1_new;
        t2 = t2_new;
        old_energy = energy;
        debug!("Time elapsed (ccsd iteration): {:?}", timer.elapsed());

        if delta_e < config.stopping_eps {
            info!("CCSD converged in {} iterations, E = {energy:.15}", niter + 1);
            debug!("Time elapsed (ccsd kernel): {:?}", time_outer.elapsed());
            return Ok(CCSDResults {
                t1,
                t2,
                energy,
                status: CCSDStatus::Converged,
                niter: niter + 1,
                energy_history,
            });
        }
    }

    if let Some(diis_obj) = diis_obj.as_ref().filter(|d| d.nfallback() > 0) {
        warn!("DIIS fell back to plain iteration {} times", diis_obj.nfallback());
    }
    warn!("CCSD did not converge in {} iterations", config.max_iter);
    debug!("Time elapsed (ccsd kernel): {:?}", time_outer.elapsed());
    Ok(CCSDResults {
        t1,
        t2,
        energy: old_energy,
        status: CCSDStatus::Exhausted,
        niter: config.max_iter,
        energy_history,
    })
}

/* #endregion */

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::{SyntheticSystem, synthetic_amplitudes, synthetic_system, tensor_from_fn};
    use approx::assert_abs_diff_eq;
    use itertools::{Itertools, iproduct};

    fn setup(nocc: usize, nvir: usize, coupling: f64) -> (CCSDInfo, Denominators) {
        let SyntheticSystem { fock, eri, space, .. } = synthetic_system(nocc, nvir, coupling);
        let denom = Denominators::from_fock_diagonal(&fock, &space).unwrap();
        (CCSDInfo { fock, eri, space }, denom)
    }

    fn assert_t2_antisymmetric(t2: &Tsr) {
        let (nv, no) = (t2.shape()[0], t2.shape()[2]);
        for (a, b, i, j) in iproduct!(0..nv, 0..nv, 0..no, 0..no) {
            assert_abs_diff_eq!(t2[[a, b, i, j]], -t2[[b, a, i, j]], epsilon = 1e-12);
            assert_abs_diff_eq!(t2[[a, b, i, j]], -t2[[a, b, j, i]], epsilon = 1e-12);
        }
    }

    /// Lowest eigenvalue of the Hamiltonian over all two-electron determinants `|pq>`, `p < q`.
    ///
    /// Core hamiltonian `h_pq = f_pq - sum_i <pi||qi>`; matrix elements
    /// `<pq|H|rs> = h_pr d_qs - h_ps d_qr - h_qr d_ps + h_qs d_pr + <pq||rs>`.
    fn two_electron_ground_state(info: &CCSDInfo) -> f64 {
        let (norb, nocc) = (info.norb(), info.nocc());
        let (fock, eri) = (&info.fock, &info.eri);
        let hcore = tensor_from_fn(&[norb, norb], |idx| {
            let (p, q) = (idx[0], idx[1]);
            fock[[p, q]] - (0..nocc).map(|i| eri[[p, i, q, i]]).sum::<f64>()
        });

        let pairs = (0..norb).tuple_combinations::<(usize, usize)>().collect_vec();
        let delta = |x: usize, y: usize| if x == y { 1.0 } else { 0.0 };
        let ham = tensor_from_fn(&[pairs.len(), pairs.len()], |idx| {
            let ((p, q), (r, s)) = (pairs[idx[0]], pairs[idx[1]]);
            hcore[[p, r]] * delta(q, s) - hcore[[p, s]] * delta(q, r) - hcore[[q, r]] * delta(p, s)
                + hcore[[q, s]] * delta(p, r)
                + eri[[p, q, r, s]]
        });

        let (w, _): (Tsr, Tsr) = rt::linalg::eigh(&ham).into();
        w.raw().iter().fold(f64::INFINITY, |acc, &x| acc.min(x))
    }

    fn run(info: &CCSDInfo, denom: &Denominators, config: &CCSDConfig) -> CCSDResults {
        let (t1, t2) = AmplitudeLayout::new(&info.space).zeros(info.fock.device());
        ccsd_kernel(info, denom, t1, t2, config).unwrap()
    }

    #[test]
    fn test_amplitude_layout() {
        let space = OrbitalSpace::new(5, 2).unwrap();
        let layout = AmplitudeLayout::new(&space);
        let (t1, t2) = synthetic_amplitudes(&space, 0.3);

        let cat = layout.pack(&t1, &t2);
        assert_eq!(cat.size(), 3 * 2 + 3 * 3 * 2 * 2);
        assert_abs_diff_eq!(cat[[1]], t1[[0, 1]], epsilon = 1e-15);
        assert_abs_diff_eq!(cat[[6 + 5]], t2[[0, 1, 0, 1]], epsilon = 1e-15);

        let (t1_back, t2_back) = layout.unpack(&cat);
        assert_abs_diff_eq!((&t1_back - &t1).l2_norm(), 0.0, epsilon = 1e-15);
        assert_abs_diff_eq!((&t2_back - &t2).l2_norm(), 0.0, epsilon = 1e-15);
    }

    #[test]
    fn test_ccsd_converges_to_stationary_amplitudes() {
        let (info, denom) = setup(2, 2, 0.1);
        let config = CCSDConfig { max_iter: 200, ..Default::default() };
        let results = run(&info, &denom, &config);

        assert!(results.converged());
        assert_eq!(results.energy_history.len(), results.niter);
        assert_abs_diff_eq!(results.energy, *results.energy_history.last().unwrap(), epsilon = 1e-15);

        let (fock, eri) = integral_maps(&info.fock, &info.eri, &info.space).unwrap();
        let (rt1, rt2) = get_ccsd_residuals(&results.t1, &results.t2, &fock, &eri).unwrap();
        assert!(rt1.l2_norm() < 1e-9, "|r1| = {}", rt1.l2_norm());
        assert!(rt2.l2_norm() < 1e-9, "|r2| = {}", rt2.l2_norm());
        assert_t2_antisymmetric(&results.t2);

        let e_ref = get_reference_energy(&info.fock, &info.eri, &info.space).unwrap();
        let e_corr = get_correlation_energy(&results.t1, &results.t2, &fock, &eri).unwrap();
        assert_abs_diff_eq!(results.energy, e_ref + e_corr, epsilon = 1e-12);
        assert!(e_corr < 0.0);
    }

    #[test]
    fn test_ccsd_diis_agrees_with_plain_iteration() {
        let (info, denom) = setup(2, 2, 0.1);
        let plain = run(&info, &denom, &CCSDConfig { max_iter: 200, ..Default::default() });
        let diis_1 = run(&info, &denom, &CCSDConfig { max_iter: 200, diis_size: Some(1), ..Default::default() });
        let diis_6 = run(&info, &denom, &CCSDConfig { max_iter: 200, diis_size: Some(6), ..Default::default() });

        assert!(plain.converged() && diis_1.converged() && diis_6.converged());
        assert_abs_diff_eq!(plain.energy, diis_1.energy, epsilon = 1e-8);
        assert_abs_diff_eq!(plain.energy, diis_6.energy, epsilon = 1e-8);

        let (fock, eri) = integral_maps(&info.fock, &info.eri, &info.space).unwrap();
        for results in [&plain, &diis_1, &diis_6] {
            assert_t2_antisymmetric(&results.t2);
            let (rt1, rt2) = get_ccsd_residuals(&results.t1, &results.t2, &fock, &eri).unwrap();
            assert!(rt1.l2_norm() < 1e-9, "|r1| = {}", rt1.l2_norm());
            assert!(rt2.l2_norm() < 1e-9, "|r2| = {}", rt2.l2_norm());
        }
    }

    #[test]
    fn test_ccsd_two_electron_exact() {
        // CCSD is exact for two electrons: compare with the determinant-space ground state
        for nvir in [2, 4] {
            let (info, denom) = setup(2, nvir, 0.1);
            for diis_size in [None, Some(6)] {
                let config = CCSDConfig { max_iter: 300, diis_size, ..Default::default() };
                let results = run(&info, &denom, &config);
                assert!(results.converged());
                let e_fci = two_electron_ground_state(&info);
                assert_abs_diff_eq!(results.energy, e_fci, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_ccsd_larger_system_with_diis() {
        let (info, denom) = setup(4, 4, 0.1);
        let config = CCSDConfig { max_iter: 200, diis_size: Some(8), ..Default::default() };
        let results = run(&info, &denom, &config);
        assert!(results.converged());

        let plain = run(&info, &denom, &CCSDConfig { max_iter: 200, ..Default::default() });
        assert_abs_diff_eq!(plain.energy, results.energy, epsilon = 1e-8);
    }

    #[test]
    fn test_ccsd_initial_guess() {
        let (info, denom) = setup(2, 2, 0.1);
        let (t1, t2) = get_ccsd_initial_guess(&info, &denom).unwrap();
        let config = CCSDConfig { max_iter: 200, ..Default::default() };
        let from_guess = ccsd_kernel(&info, &denom, t1, t2, &config).unwrap();
        let from_zero = run(&info, &denom, &config);
        assert!(from_guess.converged());
        assert_abs_diff_eq!(from_guess.energy, from_zero.energy, epsilon = 1e-8);
    }

    #[test]
    fn test_ccsd_exhausted() {
        let (info, denom) = setup(2, 2, 0.1);
        let results = run(&info, &denom, &CCSDConfig { max_iter: 1, ..Default::default() });
        assert_eq!(results.status, CCSDStatus::Exhausted);
        assert_eq!(results.niter, 1);
        assert_eq!(results.energy_history.len(), 1);
        assert_eq!(results.t1.shape(), &vec![info.nvir(), info.nocc()]);
        assert_eq!(results.t2.shape(), &vec![info.nvir(), info.nvir(), info.nocc(), info.nocc()]);

        // no iteration: input amplitudes and their energy come back
        let results = run(&info, &denom, &CCSDConfig { max_iter: 0, ..Default::default() });
        assert_eq!(results.status, CCSDStatus::Exhausted);
        assert_eq!(results.t1.l2_norm(), 0.0);
        let e_ref = get_reference_energy(&info.fock, &info.eri, &info.space).unwrap();
        assert_abs_diff_eq!(results.energy, e_ref, epsilon = 1e-14);
    }

    #[test]
    fn test_ccsd_degenerate_denominator() {
        let (info, _) = setup(2, 2, 0.1);
        // highest occupied and lowest virtual orbitals degenerate
        let eps = [-1.0, 0.5, 0.5, 1.0];
        let mo_energy = tensor_from_fn(&[4], |idx| eps[idx[0]]);
        let denom = Denominators::from_orbital_energies(&mo_energy, &info.space).unwrap();

        let (t1, t2) = AmplitudeLayout::new(&info.space).zeros(info.fock.device());
        let result = ccsd_kernel(&info, &denom, t1, t2, &CCSDConfig::default());
        assert!(matches!(result, Err(CCError::NonFinite { iteration: 0 })));
    }

    #[test]
    fn test_ccsd_rejects_bad_input() {
        let (info, denom) = setup(2, 2, 0.1);
        let device = info.fock.device();
        let t1: Tsr = rt::zeros(([2, 3], device));
        let t2: Tsr = rt::zeros(([2, 2, 2, 2], device));
        let result = ccsd_kernel(&info, &denom, t1, t2, &CCSDConfig::default());
        assert!(matches!(result, Err(CCError::Shape(_))));

        let (t1, t2) = AmplitudeLayout::new(&info.space).zeros(device);
        let config = CCSDConfig { diis_size: Some(0), ..Default::default() };
        assert!(matches!(ccsd_kernel(&info, &denom, t1, t2, &config), Err(CCError::Config(_))));
    }
}
