#![allow(clippy::deref_addrof)]

pub mod prelude;

pub mod ccsd;
pub mod contract;
pub mod diis;
pub mod energy;
pub mod error;
pub mod integrals;
pub mod residuals;
pub mod structs;
pub mod util;

#[cfg(test)]
pub(crate) mod test_util;

#[test]
fn playground_ccsd() {
    use crate::prelude::*;
    use crate::test_util::synthetic_system;

    let sys = synthetic_system(4, 6, 0.15);
    let ccsd_info = CCSDInfo { fock: sys.fock, eri: sys.eri, space: sys.space };
    let denom = Denominators::from_orbital_energies(&sys.mo_energy, &ccsd_info.space).unwrap();
    let (t1, t2) = get_ccsd_initial_guess(&ccsd_info, &denom).unwrap();
    let cc_config = CCSDConfig { diis_size: Some(8), ..Default::default() };

    let ccsd_results = ccsd_kernel(&ccsd_info, &denom, t1, t2, &cc_config).unwrap();
    let e_ref = get_reference_energy(&ccsd_info.fock, &ccsd_info.eri, &ccsd_info.space).unwrap();
    println!("CCSD Corr Energy: {}", ccsd_results.energy - e_ref);
    assert!(ccsd_results.converged());
}

#[test]
fn playground_ccsd_from_npy() {
    use crate::prelude::*;

    // opt-in: point CCSD_NPY_DIR at a directory holding fock.npy, eri.npy and nocc.txt
    let Ok(dir) = std::env::var("CCSD_NPY_DIR") else {
        return;
    };
    let dir = std::path::Path::new(&dir);
    let nocc: usize = std::fs::read_to_string(dir.join("nocc.txt")).unwrap().trim().parse().unwrap();
    let ccsd_info = util::ccsd_info_from_npy(dir.join("fock.npy"), dir.join("eri.npy"), nocc).unwrap();
    let denom = Denominators::from_fock_diagonal(&ccsd_info.fock, &ccsd_info.space).unwrap();
    let (t1, t2) = AmplitudeLayout::new(&ccsd_info.space).zeros(ccsd_info.fock.device());
    let cc_config = CCSDConfig { diis_size: Some(8), ..Default::default() };

    let ccsd_results = ccsd_kernel(&ccsd_info, &denom, t1, t2, &cc_config).unwrap();
    let e_ref = get_reference_energy(&ccsd_info.fock, &ccsd_info.eri, &ccsd_info.space).unwrap();
    println!("CCSD Corr Energy: {}", ccsd_results.energy - e_ref);
}
