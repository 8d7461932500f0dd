//! Spin-orbital CCSD residuals.
//!
//! Amplitude layout is `t1[a,i]`, `t2[a,b,i,j]`; integral blocks are named by
//! their occupied/virtual pattern (`eri.vovv[a,k,c,d] = <ak||cd>`). Each
//! doubles term is added through its permutation operator, so `rt2` stays
//! antisymmetric in `(a,b)` and `(i,j)`.

use crate::prelude::*;

/// Intermediates shared between stages, released after their last consumer.
#[derive(Debug, Default)]
pub struct ResidualIntermediates {
    /// `x_ov[k,c] = <jk||bc> t1[b,j]`
    pub x_ov: Option<Tsr>,
    /// `x_ooov[i,j,k,c] = t1[b,i] <jk||bc>`
    pub x_ooov: Option<Tsr>,
}

fn add_singles(mut rt1: TsrMut, coef: f64, subscripts: &str, operands: &[&Tsr]) -> CCResult<()> {
    rt1 += coef * einsum(subscripts, operands)?;
    Ok(())
}

fn add_doubles(rt2: TsrMut, coef: f64, group: PermGroup, subscripts: &str, operands: &[&Tsr]) -> CCResult<()> {
    let term = einsum(subscripts, operands)?;
    accumulate_antisym(rt2, &term, coef, group)
}

fn take(slot: &mut Option<Tsr>, name: &str) -> CCResult<Tsr> {
    slot.take().ok_or_else(|| CCError::Shape(format!("intermediate `{name}` is not available")))
}

/// Singles terms without intermediates (after the bare `f_vo`).
pub fn get_rt1_direct(mut rt1: TsrMut, t1: &Tsr, t2: &Tsr, fock: &FockBlocks, eri: &EriBlocks) -> CCResult<()> {
    add_singles(rt1.view_mut(), -1.0, "ji,aj->ai", &[&fock.oo, t1])?;
    add_singles(rt1.view_mut(), 1.0, "ab,bi->ai", &[&fock.vv, t1])?;
    add_singles(rt1.view_mut(), -1.0, "jb,baij->ai", &[&fock.ov, t2])?;
    add_singles(rt1.view_mut(), -1.0, "ajbi,bj->ai", &[&eri.vovo, t1])?;
    add_singles(rt1.view_mut(), 0.5, "jkbi,bakj->ai", &[&eri.oovo, t2])?;
    add_singles(rt1.view_mut(), 0.5, "ajbc,bcij->ai", &[&eri.vovv, t2])?;
    add_singles(rt1.view_mut(), -0.5, "jkbc,bcik,aj->ai", &[&eri.oovv, t2, t1])?;
    Ok(())
}

/// Doubles terms without intermediates (after the bare `<ab||ij>`).
pub fn get_rt2_direct(mut rt2: TsrMut, t1: &Tsr, t2: &Tsr, fock: &FockBlocks, eri: &EriBlocks) -> CCResult<()> {
    use PermGroup::*;

    // linear in amplitudes
    add_doubles(rt2.view_mut(), -1.0, Vir, "akij,bk->abij", &[&eri.vooo, t1])?;
    add_doubles(rt2.view_mut(), -1.0, Occ, "kj,abik->abij", &[&fock.oo, t2])?;
    add_doubles(rt2.view_mut(), 1.0, Occ, "abcj,ci->abij", &[&eri.vvvo, t1])?;
    add_doubles(rt2.view_mut(), 1.0, Vir, "ac,cbij->abij", &[&fock.vv, t2])?;
    add_doubles(rt2.view_mut(), -0.5, Identity, "klij,ablk->abij", &[&eri.oooo, t2])?;
    add_doubles(rt2.view_mut(), -1.0, VirOcc, "akcj,cbik->abij", &[&eri.vovo, t2])?;
    add_doubles(rt2.view_mut(), 0.5, Identity, "abcd,cdij->abij", &[&eri.vvvv, t2])?;

    // quadratic
    add_doubles(rt2.view_mut(), 1.0, Identity, "bl,klij,ak->abij", &[t1, &eri.oooo, t1])?;
    add_doubles(rt2.view_mut(), 0.5, Occ, "klcd,cdjk,abil->abij", &[&eri.oovv, t2, t2])?;
    add_doubles(rt2.view_mut(), -1.0, Vir, "kc,cbij,ak->abij", &[&fock.ov, t2, t1])?;
    add_doubles(rt2.view_mut(), -1.0, VirOcc, "akcj,ci,bk->abij", &[&eri.vovo, t1, t1])?;
    add_doubles(rt2.view_mut(), 0.5, Identity, "klcd,calk,dbij->abij", &[&eri.oovv, t2, t2])?;
    add_doubles(rt2.view_mut(), 0.5, Identity, "klcd,dblk,caij->abij", &[&eri.oovv, t2, t2])?;
    add_doubles(rt2.view_mut(), -1.0, Identity, "abcd,cj,di->abij", &[&eri.vvvv, t1, t1])?;
    add_doubles(rt2.view_mut(), 1.0, VirOcc, "klcj,cbil,ak->abij", &[&eri.oovo, t2, t1])?;
    add_doubles(rt2.view_mut(), -0.5, Vir, "akcd,cdij,bk->abij", &[&eri.vovv, t2, t1])?;
    add_doubles(rt2.view_mut(), -1.0, Occ, "klcd,cajk,dbil->abij", &[&eri.oovv, t2, t2])?;
    Ok(())
}

/// Contractions of `<oo||vv>` with `t1` feeding several later stages.
pub fn get_residual_intermediates(intermediates: &mut ResidualIntermediates, t1: &Tsr, eri: &EriBlocks) -> CCResult<()> {
    intermediates.x_ov = Some(einsum("jkbc,bj->kc", &[&eri.oovv, t1])?);
    intermediates.x_ooov = Some(einsum("bi,jkbc->ijkc", &[t1, &eri.oovv])?);
    Ok(())
}

/// Terms going through `x_ov`, `x_ooov` and the `vv` intermediate.
pub fn get_rt_ov_vv(
    mut rt1: TsrMut,
    mut rt2: TsrMut,
    intermediates: &ResidualIntermediates,
    t1: &Tsr,
    t2: &Tsr,
    eri: &EriBlocks,
) -> CCResult<()> {
    use PermGroup::*;

    let x_ov = intermediates.x_ov.as_ref().ok_or_else(|| CCError::Shape("intermediate `x_ov` is not available".into()))?;
    let x_ooov =
        intermediates.x_ooov.as_ref().ok_or_else(|| CCError::Shape("intermediate `x_ooov` is not available".into()))?;

    add_singles(rt1.view_mut(), -1.0, "caik,kc->ai", &[t2, x_ov])?;
    add_doubles(rt2.view_mut(), -1.0, Vir, "dbij,ld,al->abij", &[t2, x_ov, t1])?;

    add_singles(rt1.view_mut(), -0.5, "cakj,ijkc->ai", &[t2, x_ooov])?;
    add_doubles(rt2.view_mut(), -1.0, VirOcc, "dbil,jkld,ak->abij", &[t2, x_ooov, t1])?;

    // x_vv[a,c] = <aj||bc> t1[b,j]
    let x_vv = einsum("ajbc,bj->ac", &[&eri.vovv, t1])?;
    add_singles(rt1.view_mut(), -1.0, "ac,ci->ai", &[&x_vv, t1])?;
    add_doubles(rt2.view_mut(), -1.0, Vir, "ad,dbij->abij", &[&x_vv, t2])?;
    Ok(())
}

/// Terms going through the two `oo` intermediates; releases `x_ov`.
pub fn get_rt_oo(
    mut rt1: TsrMut,
    mut rt2: TsrMut,
    intermediates: &mut ResidualIntermediates,
    t1: &Tsr,
    t2: &Tsr,
    fock: &FockBlocks,
    eri: &EriBlocks,
) -> CCResult<()> {
    use PermGroup::*;

    let x_ov = take(&mut intermediates.x_ov, "x_ov")?;
    let mut x_oo = einsum("ci,kc->ik", &[t1, &x_ov])?;
    x_oo += einsum("jkbi,bj->ik", &[&eri.oovo, t1])?;
    drop(x_ov);
    add_singles(rt1.view_mut(), -1.0, "ak,ik->ai", &[t1, &x_oo])?;
    add_doubles(rt2.view_mut(), -1.0, Occ, "abil,jl->abij", &[t2, &x_oo])?;
    drop(x_oo);

    // x_fo[i,j] = t1[b,i] f[j,b]
    let x_fo = einsum("bi,jb->ij", &[t1, &fock.ov])?;
    add_singles(rt1.view_mut(), -1.0, "aj,ij->ai", &[t1, &x_fo])?;
    add_doubles(rt2.view_mut(), -1.0, Occ, "abik,jk->abij", &[t2, &x_fo])?;
    Ok(())
}

/// Terms going through the three `oooo` intermediates; releases `x_ooov`.
pub fn get_rt2_oooo(
    mut rt2: TsrMut,
    intermediates: &mut ResidualIntermediates,
    t1: &Tsr,
    t2: &Tsr,
    eri: &EriBlocks,
) -> CCResult<()> {
    use PermGroup::*;

    let x_ooov = take(&mut intermediates.x_ooov, "x_ooov")?;
    let x_oooo = einsum("di,jkld->ijkl", &[t1, &x_ooov])?;
    drop(x_ooov);
    add_doubles(rt2.view_mut(), 0.5, Identity, "ablk,ijkl->abij", &[t2, &x_oooo])?;
    add_doubles(rt2.view_mut(), -1.0, Identity, "ak,ijkl,bl->abij", &[t1, &x_oooo, t1])?;
    drop(x_oooo);

    let x_oooo = einsum("cdij,klcd->ijkl", &[t2, &eri.oovv])?;
    add_doubles(rt2.view_mut(), -0.25, Identity, "ablk,ijkl->abij", &[t2, &x_oooo])?;
    add_doubles(rt2.view_mut(), 0.5, Identity, "ak,ijkl,bl->abij", &[t1, &x_oooo, t1])?;
    drop(x_oooo);

    let x_oooo = einsum("klcj,ci->klji", &[&eri.oovo, t1])?;
    add_doubles(rt2.view_mut(), -0.5, Occ, "ablk,klji->abij", &[t2, &x_oooo])?;
    add_doubles(rt2.view_mut(), 1.0, Occ, "ak,klji,bl->abij", &[t1, &x_oooo, t1])?;
    Ok(())
}

/// Terms going through the `vovo` intermediate.
pub fn get_rt2_vovo(mut rt2: TsrMut, t1: &Tsr, t2: &Tsr, eri: &EriBlocks) -> CCResult<()> {
    use PermGroup::*;

    // x_vovo[a,k,d,j] = <ak||cd> t1[c,j]
    let x_vovo = einsum("akcd,cj->akdj", &[&eri.vovv, t1])?;
    add_doubles(rt2.view_mut(), 1.0, VirOcc, "akdj,dbik->abij", &[&x_vovo, t2])?;
    add_doubles(rt2.view_mut(), 1.0, Vir, "akdj,di,bk->abij", &[&x_vovo, t1, t1])?;
    Ok(())
}

/// CCSD residuals `(rt1, rt2)` for amplitudes `t1[a,i]`, `t2[a,b,i,j]`.
///
/// At zero amplitudes the result is `(f_vo, <ab||ij>)`.
pub fn get_ccsd_residuals(t1: &Tsr, t2: &Tsr, fock: &FockBlocks, eri: &EriBlocks) -> CCResult<(Tsr, Tsr)> {
    if t1.shape() != fock.vo.shape() || t2.shape() != eri.vvoo.shape() {
        return Err(CCError::Shape(format!(
            "amplitudes have shapes {:?} and {:?}, expected {:?} and {:?}",
            t1.shape(),
            t2.shape(),
            fock.vo.shape(),
            eri.vvoo.shape()
        )));
    }

    let mut rt1 = fock.vo.to_owned();
    let mut rt2 = eri.vvoo.to_owned();
    let mut intermediates = ResidualIntermediates::default();

    let timer = std::time::Instant::now();
    get_rt1_direct(rt1.view_mut(), t1, t2, fock, eri)?;
    debug!("Time elapsed (rt1 direct): {:?}", timer.elapsed());

    let timer = std::time::Instant::now();
    get_rt2_direct(rt2.view_mut(), t1, t2, fock, eri)?;
    debug!("Time elapsed (rt2 direct): {:?}", timer.elapsed());

    let timer = std::time::Instant::now();
    get_residual_intermediates(&mut intermediates, t1, eri)?;
    get_rt_ov_vv(rt1.view_mut(), rt2.view_mut(), &intermediates, t1, t2, eri)?;
    get_rt_oo(rt1.view_mut(), rt2.view_mut(), &mut intermediates, t1, t2, fock, eri)?;
    debug!("Time elapsed (ov, vv, oo intermediates): {:?}", timer.elapsed());

    let timer = std::time::Instant::now();
    get_rt2_oooo(rt2.view_mut(), &mut intermediates, t1, t2, eri)?;
    get_rt2_vovo(rt2.view_mut(), t1, t2, eri)?;
    debug!("Time elapsed (oooo, vovo intermediates): {:?}", timer.elapsed());

    Ok((rt1, rt2))
}
