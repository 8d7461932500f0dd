//! Occupied/virtual partition of the one- and two-electron integrals.

use crate::prelude::*;

/// Occupied/virtual boundary of the spin-orbital space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrbitalSpace {
    norb: usize,
    nocc: usize,
}

impl OrbitalSpace {
    pub fn new(norb: usize, nocc: usize) -> CCResult<Self> {
        if nocc == 0 || nocc >= norb {
            return Err(CCError::Shape(format!(
                "occupied count {nocc} must lie in 1..{norb} for {norb} spin-orbitals"
            )));
        }
        Ok(Self { norb, nocc })
    }

    pub fn nocc(&self) -> usize {
        self.nocc
    }

    pub fn nvir(&self) -> usize {
        self.norb - self.nocc
    }

    pub fn norb(&self) -> usize {
        self.norb
    }

    /// Shape of the singles amplitudes, `(nvir, nocc)`.
    pub fn t1_shape(&self) -> Vec<usize> {
        vec![self.nvir(), self.nocc]
    }

    /// Shape of the doubles amplitudes, `(nvir, nvir, nocc, nocc)`.
    pub fn t2_shape(&self) -> Vec<usize> {
        vec![self.nvir(), self.nvir(), self.nocc, self.nocc]
    }
}

#[derive(Debug, Clone)]
pub struct FockBlocks {
    pub oo: Tsr,
    pub ov: Tsr,
    pub vo: Tsr,
    pub vv: Tsr,
}

impl FockBlocks {
    pub fn get(&self, name: &str) -> Option<&Tsr> {
        match name {
            "oo" => Some(&self.oo),
            "ov" => Some(&self.ov),
            "vo" => Some(&self.vo),
            "vv" => Some(&self.vv),
            _ => None,
        }
    }
}

/// Blocks of `<pq||rs>` read by the residual equations.
#[derive(Debug, Clone)]
pub struct EriBlocks {
    pub oooo: Tsr,
    pub oovo: Tsr,
    pub oovv: Tsr,
    pub vooo: Tsr,
    pub vovo: Tsr,
    pub vovv: Tsr,
    pub vvoo: Tsr,
    pub vvvo: Tsr,
    pub vvvv: Tsr,
}

impl EriBlocks {
    pub fn get(&self, name: &str) -> Option<&Tsr> {
        match name {
            "oooo" => Some(&self.oooo),
            "oovo" => Some(&self.oovo),
            "oovv" => Some(&self.oovv),
            "vooo" => Some(&self.vooo),
            "vovo" => Some(&self.vovo),
            "vovv" => Some(&self.vovv),
            "vvoo" => Some(&self.vvoo),
            "vvvo" => Some(&self.vvvo),
            "vvvv" => Some(&self.vvvv),
            _ => None,
        }
    }
}

fn check_shape(name: &str, tsr: &Tsr, expected: &[usize]) -> CCResult<()> {
    if tsr.shape().as_slice() != expected {
        return Err(CCError::Shape(format!("{name} has shape {:?}, expected {:?}", tsr.shape(), expected)));
    }
    Ok(())
}

/// Slice the full Fock matrix and antisymmetrized integrals into the
/// occupied/virtual blocks, once.
pub fn integral_maps(fock: &Tsr, eri: &Tsr, space: &OrbitalSpace) -> CCResult<(FockBlocks, EriBlocks)> {
    let norb = space.norb();
    check_shape("fock", fock, &[norb, norb])?;
    check_shape("eri", eri, &[norb, norb, norb, norb])?;

    let so = slice!(0, space.nocc());
    let sv = slice!(space.nocc(), norb);

    let fock_blocks = FockBlocks {
        oo: fock.i((so, so)).to_owned(),
        ov: fock.i((so, sv)).to_owned(),
        vo: fock.i((sv, so)).to_owned(),
        vv: fock.i((sv, sv)).to_owned(),
    };

    let eri_blocks = EriBlocks {
        oooo: eri.i((so, so, so, so)).to_owned(),
        oovo: eri.i((so, so, sv, so)).to_owned(),
        oovv: eri.i((so, so, sv, sv)).to_owned(),
        vooo: eri.i((sv, so, so, so)).to_owned(),
        vovo: eri.i((sv, so, sv, so)).to_owned(),
        vovv: eri.i((sv, so, sv, sv)).to_owned(),
        vvoo: eri.i((sv, sv, so, so)).to_owned(),
        vvvo: eri.i((sv, sv, sv, so)).to_owned(),
        vvvv: eri.i((sv, sv, sv, sv)).to_owned(),
    };

    Ok((fock_blocks, eri_blocks))
}

/// Largest violation of `g[p,q,r,s] = -g[q,p,r,s] = -g[p,q,s,r]`.
pub fn eri_antisymmetry_error(eri: &Tsr) -> f64 {
    let max_abs = |tsr: Tsr| tsr.raw().iter().fold(0.0_f64, |acc, x| acc.max(x.abs()));
    let bra = max_abs(eri + eri.swapaxes(0, 1));
    let ket = max_abs(eri + eri.swapaxes(2, 3));
    bra.max(ket)
}
