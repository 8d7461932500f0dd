//! CCSD energy functional `<0| exp(-T) H exp(T) |0>`, reference terms included.

use crate::prelude::*;
use itertools::Itertools;

fn get_reference_energy_from_blocks(fock: &FockBlocks, eri: &EriBlocks) -> f64 {
    let nocc = fock.oo.shape()[0];
    let e_fock = fock.oo.diagonal(None).sum_all();
    let e_eri = (0..nocc).cartesian_product(0..nocc).map(|(j, i)| eri.oooo[[j, i, j, i]]).sum::<f64>();
    e_fock - 0.5 * e_eri
}

/// Energy from pre-partitioned integrals; this is the form used inside the
/// iteration.
pub fn get_ccsd_energy_from_blocks(t1: &Tsr, t2: &Tsr, fock: &FockBlocks, eri: &EriBlocks) -> CCResult<f64> {
    let e_ref = get_reference_energy_from_blocks(fock, eri);
    let e_t1 = einsum_scalar("ia,ai->", &[&fock.ov, t1])?;
    let e_t2 = einsum_scalar("jiab,abji->", &[&eri.oovv, t2])?;
    let e_t1t1 = einsum_scalar("jiab,ai,bj->", &[&eri.oovv, t1, t1])?;
    Ok(e_ref + e_t1 + 0.25 * e_t2 - 0.5 * e_t1t1)
}

/// Total CCSD energy for amplitudes `t1[a,i]`, `t2[a,b,i,j]`.
///
/// ```text
/// E = sum_i f_ii + sum_ia f_ia t_ai - 1/2 sum_ij <ij||ij>
///     + 1/4 sum <ji||ab> t_abji - 1/2 sum <ji||ab> t_ai t_bj
/// ```
pub fn get_ccsd_energy(t1: &Tsr, t2: &Tsr, fock: &Tsr, eri: &Tsr, space: &OrbitalSpace) -> CCResult<f64> {
    let (fock_blocks, eri_blocks) = integral_maps(fock, eri, space)?;
    get_ccsd_energy_from_blocks(t1, t2, &fock_blocks, &eri_blocks)
}

/// Energy of the reference determinant (zero amplitudes).
pub fn get_reference_energy(fock: &Tsr, eri: &Tsr, space: &OrbitalSpace) -> CCResult<f64> {
    let (fock_blocks, eri_blocks) = integral_maps(fock, eri, space)?;
    Ok(get_reference_energy_from_blocks(&fock_blocks, &eri_blocks))
}

pub fn get_correlation_energy(t1: &Tsr, t2: &Tsr, fock: &FockBlocks, eri: &EriBlocks) -> CCResult<f64> {
    Ok(get_ccsd_energy_from_blocks(t1, t2, fock, eri)? - get_reference_energy_from_blocks(fock, eri))
}

/// T1 diagnostic, `|t1| / sqrt(nocc)` over spin-orbitals.
pub fn t1_diagnostic(t1: &Tsr) -> f64 {
    let nocc = t1.shape()[1];
    t1.l2_norm() / (nocc as f64).sqrt()
}
