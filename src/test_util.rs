//! Deterministic model Hamiltonians for tests.

use crate::prelude::*;
use itertools::Itertools;

/// Row-major tensor filled element-wise from its index.
pub fn tensor_from_fn(shape: &[usize], f: impl Fn(&[usize]) -> f64) -> Tsr {
    let device = DeviceTsr::default();
    let data = shape.iter().map(|&n| 0..n).multi_cartesian_product().map(|idx| f(&idx)).collect_vec();
    rt::asarray((data, shape.to_vec().c(), &device))
}

pub fn tensor_from_vec(data: Vec<f64>) -> Tsr {
    let device = DeviceTsr::default();
    let n = data.len();
    rt::asarray((data, vec![n].c(), &device))
}

pub struct SyntheticSystem {
    pub fock: Tsr,
    pub eri: Tsr,
    pub mo_energy: Tsr,
    pub space: OrbitalSpace,
}

/// Small gapped system with a symmetric Fock matrix (weak off-diagonal
/// coupling) and pairwise-antisymmetric two-electron integrals of magnitude
/// `coupling`.
pub fn synthetic_system(nocc: usize, nvir: usize, coupling: f64) -> SyntheticSystem {
    let norb = nocc + nvir;
    let space = OrbitalSpace::new(norb, nocc).unwrap();

    let eps = (0..norb)
        .map(|p| if p < nocc { -1.2 + 0.15 * p as f64 } else { 0.6 + 0.2 * (p - nocc) as f64 })
        .collect_vec();
    let mo_energy = tensor_from_fn(&[norb], |idx| eps[idx[0]]);

    let fock = tensor_from_fn(&[norb, norb], |idx| {
        let (p, q) = (idx[0], idx[1]);
        let off = 0.02 * (0.9 * (p * q + p + q) as f64).cos();
        if p == q { eps[p] + off } else { off }
    });

    // h(pq|rs) + h(rs|pq), then antisymmetrize both pairs
    let h = |p: usize, q: usize, r: usize, s: usize| (0.37 * (1 + p + 2 * q + 3 * r + 5 * s) as f64).sin();
    let sym = |p: usize, q: usize, r: usize, s: usize| h(p, q, r, s) + h(r, s, p, q);
    let eri = tensor_from_fn(&[norb, norb, norb, norb], |idx| {
        let (p, q, r, s) = (idx[0], idx[1], idx[2], idx[3]);
        0.25 * coupling * (sym(p, q, r, s) - sym(q, p, r, s) - sym(p, q, s, r) + sym(q, p, s, r))
    });

    SyntheticSystem { fock, eri, mo_energy, space }
}

/// Nonzero amplitudes with the required antisymmetry of `t2`.
pub fn synthetic_amplitudes(space: &OrbitalSpace, scale: f64) -> (Tsr, Tsr) {
    let t1 = tensor_from_fn(&space.t1_shape(), |idx| scale * (1.3 * idx[0] as f64 + 0.7 * idx[1] as f64 + 0.2).cos());
    let base = |a: usize, b: usize, i: usize, j: usize| (0.5 + 0.3 * a as f64 + 0.8 * b as f64 + 1.1 * i as f64 + 1.7 * j as f64).sin();
    let t2 = tensor_from_fn(&space.t2_shape(), |idx| {
        let (a, b, i, j) = (idx[0], idx[1], idx[2], idx[3]);
        scale * (base(a, b, i, j) - base(b, a, i, j) - base(a, b, j, i) + base(b, a, j, i))
    });
    (t1, t2)
}
