//! Einsum-style tensor contraction and antisymmetric permutation accumulation.
//!
//! Contractions are evaluated as transpose → reshape → GEMM → reshape →
//! transpose, so the heavy lifting is the device matmul (`%`), which is
//! multi-threaded by the rstsr backend. Every call returns a complete tensor.
//!
//! Subscripts follow a restricted Einstein convention: each label is a single
//! ASCII letter, appears at most once per operand, and exactly twice over all
//! operands and the output. A label shared by two operands is summed; a label
//! shared by an operand and the output survives. Traces, batch labels and
//! implicit reductions are rejected.

use crate::prelude::*;
use itertools::Itertools;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/* #region subscripts */

/// Parsed contraction specification such as `"akij,bk->abij"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscripts {
    pub inputs: Vec<Vec<char>>,
    pub output: Vec<char>,
}

impl FromStr for Subscripts {
    type Err = CCError;

    fn from_str(s: &str) -> CCResult<Self> {
        let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        let (lhs, rhs) = compact.split_once("->").ok_or_else(|| CCError::subscripts(s, "missing `->`"))?;

        let inputs: Vec<Vec<char>> = lhs.split(',').map(|op| op.chars().collect()).collect();
        let output: Vec<char> = rhs.chars().collect();

        if inputs.iter().any(|op| op.is_empty()) {
            return Err(CCError::subscripts(s, "empty operand"));
        }
        if let Some(c) = inputs.iter().flatten().chain(output.iter()).find(|c| !c.is_ascii_alphabetic()) {
            return Err(CCError::subscripts(s, format!("label `{c}` is not an ASCII letter")));
        }
        for term in inputs.iter().chain(std::iter::once(&output)) {
            if let Some(c) = term.iter().duplicates().next() {
                return Err(CCError::subscripts(s, format!("label `{c}` repeated within `{}`", term.iter().join(""))));
            }
        }
        let counts = inputs.iter().flatten().chain(output.iter()).counts();
        if let Some((c, n)) = counts.iter().sorted().find(|(_, n)| **n != 2) {
            return Err(CCError::subscripts(s, format!("label `{c}` appears {n} time(s), expected exactly 2")));
        }

        Ok(Self { inputs, output })
    }
}

impl fmt::Display for Subscripts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inputs = self.inputs.iter().map(|op| op.iter().join("")).join(",");
        write!(f, "{}->{}", inputs, self.output.iter().join(""))
    }
}

impl Subscripts {
    /// Contract `operands` according to these subscripts.
    pub fn contract(&self, operands: &[&Tsr]) -> CCResult<Tsr> {
        let extents = self.label_extents(operands)?;
        match operands {
            [a] => {
                let perm = self.output.iter().map(|c| axis_of(&self.inputs[0], *c, self)).collect::<CCResult<Vec<_>>>()?;
                Ok(a.transpose(&perm).to_owned())
            },
            [a, b] => contract_pair(a, &self.inputs[0], b, &self.inputs[1], &self.output, self),
            [_, _, _] => contract_triple(operands, self, &extents),
            _ => Err(CCError::subscripts(
                &self.to_string(),
                format!("{} operands given, one to three are supported", operands.len()),
            )),
        }
    }

    /// Extent of every label, checked against the operand shapes.
    fn label_extents(&self, operands: &[&Tsr]) -> CCResult<HashMap<char, usize>> {
        if operands.len() != self.inputs.len() {
            return Err(CCError::Shape(format!(
                "`{self}` expects {} operands, got {}",
                self.inputs.len(),
                operands.len()
            )));
        }

        let mut extents = HashMap::new();
        for (n, (labels, op)) in self.inputs.iter().zip(operands).enumerate() {
            if op.ndim() != labels.len() {
                return Err(CCError::Shape(format!(
                    "`{self}`: operand {n} has rank {}, subscripts need rank {}",
                    op.ndim(),
                    labels.len()
                )));
            }
            for (&c, &dim) in labels.iter().zip(op.shape().iter()) {
                let known = *extents.entry(c).or_insert(dim);
                if known != dim {
                    return Err(CCError::Shape(format!(
                        "`{self}`: label `{c}` has extent {known} and {dim} in different operands"
                    )));
                }
            }
        }
        Ok(extents)
    }
}

fn axis_of(labels: &[char], c: char, subs: &Subscripts) -> CCResult<usize> {
    labels
        .iter()
        .position(|&x| x == c)
        .ok_or_else(|| CCError::subscripts(&subs.to_string(), format!("label `{c}` not found")))
}

/* #endregion */

/* #region contraction */

/// Contract a tensor network given as einsum subscripts.
///
/// ```norun
/// // rt1 -= f(j,i) t1(a,j)
/// rt1 -= einsum("ji,aj->ai", &[&f_oo, &t1])?;
/// ```
///
/// A full contraction (empty output) yields a length-1 tensor; see
/// [`einsum_scalar`].
pub fn einsum(subscripts: &str, operands: &[&Tsr]) -> CCResult<Tsr> {
    let subs: Subscripts = subscripts.parse()?;
    subs.contract(operands)
}

/// Full contraction to a scalar, e.g. `"ia,ai->"`.
pub fn einsum_scalar(subscripts: &str, operands: &[&Tsr]) -> CCResult<f64> {
    let subs: Subscripts = subscripts.parse()?;
    if !subs.output.is_empty() {
        return Err(CCError::subscripts(subscripts, "scalar contraction must have an empty output"));
    }
    let result = subs.contract(operands)?;
    Ok(result[[0]])
}

/// Pairwise contraction by GEMM.
fn contract_pair(a: &Tsr, la: &[char], b: &Tsr, lb: &[char], lo: &[char], subs: &Subscripts) -> CCResult<Tsr> {
    // (axis, label) of surviving axes; (axis in a, axis in b) of summed ones
    let a_free = la.iter().enumerate().filter(|(_, c)| !lb.contains(*c)).collect_vec();
    let b_free = lb.iter().enumerate().filter(|(_, c)| !la.contains(*c)).collect_vec();
    let summed = la
        .iter()
        .enumerate()
        .filter_map(|(ia, c)| lb.iter().position(|x| x == c).map(|ib| (ia, ib)))
        .collect_vec();

    let perm_a = a_free.iter().map(|(ax, _)| *ax).chain(summed.iter().map(|(ia, _)| *ia)).collect_vec();
    let perm_b = summed.iter().map(|(_, ib)| *ib).chain(b_free.iter().map(|(ax, _)| *ax)).collect_vec();

    let m = a_free.iter().map(|(ax, _)| a.shape()[*ax]).product::<usize>();
    let n = b_free.iter().map(|(ax, _)| b.shape()[*ax]).product::<usize>();
    let k = summed.iter().map(|(ia, _)| a.shape()[*ia]).product::<usize>();

    let a_mat = a.transpose(&perm_a).into_shape([m, k]);
    let b_mat = b.transpose(&perm_b).into_shape([k, n]);
    let c_mat: Tsr = &a_mat % &b_mat;

    if lo.is_empty() {
        return Ok(c_mat.into_shape([1]));
    }

    let mid_labels = a_free.iter().chain(b_free.iter()).map(|(_, c)| **c).collect_vec();
    let mid_shape = a_free
        .iter()
        .map(|(ax, _)| a.shape()[*ax])
        .chain(b_free.iter().map(|(ax, _)| b.shape()[*ax]))
        .collect_vec();
    let perm_out = lo.iter().map(|c| axis_of(&mid_labels, *c, subs)).collect::<CCResult<Vec<_>>>()?;

    let c = c_mat.into_shape(&mid_shape);
    if perm_out.iter().enumerate().all(|(n, &ax)| n == ax) {
        Ok(c)
    } else {
        Ok(c.transpose(&perm_out).to_owned())
    }
}

/// Three-operand chain: contract the pair with the smallest intermediate first.
fn contract_triple(operands: &[&Tsr], subs: &Subscripts, extents: &HashMap<char, usize>) -> CCResult<Tsr> {
    let lo = &subs.output;
    let mut best: Option<(usize, [usize; 3], Vec<char>)> = None;
    for [x, y, z] in [[0, 1, 2], [0, 2, 1], [1, 2, 0]] {
        let (lx, ly, lz) = (&subs.inputs[x], &subs.inputs[y], &subs.inputs[z]);
        let inter = lx.iter().chain(ly.iter()).filter(|&&c| lz.contains(&c) || lo.contains(&c)).copied().collect_vec();
        let size = inter.iter().map(|c| extents[c]).product::<usize>();
        if best.as_ref().is_none_or(|(best_size, _, _)| size < *best_size) {
            best = Some((size, [x, y, z], inter));
        }
    }
    let Some((_, [x, y, z], inter)) = best else {
        return Err(CCError::subscripts(&subs.to_string(), "no contraction order found"));
    };

    let scr = contract_pair(operands[x], &subs.inputs[x], operands[y], &subs.inputs[y], &inter, subs)?;
    if inter.is_empty() {
        // the pair reduced to a scalar; the remaining operand carries the output
        let perm = lo.iter().map(|c| axis_of(&subs.inputs[z], *c, subs)).collect::<CCResult<Vec<_>>>()?;
        return Ok(scr[[0]] * operands[z].transpose(&perm));
    }
    contract_pair(&scr, &inter, operands[z], &subs.inputs[z], lo, subs)
}

/* #endregion */

/* #region antisymmetric permutation */

const ABIJ: [usize; 4] = [0, 1, 2, 3];
const BAIJ: [usize; 4] = [1, 0, 2, 3];
const ABJI: [usize; 4] = [0, 1, 3, 2];
const BAJI: [usize; 4] = [1, 0, 3, 2];

/// Permutation operator attached to a doubles term in the `abij` layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermGroup {
    /// No permutation.
    Identity,
    /// P(a,b): term minus its virtual-pair transpose.
    Vir,
    /// P(i,j): term minus its occupied-pair transpose.
    Occ,
    /// P(i,j) P(a,b): four layouts with alternating sign.
    VirOcc,
}

impl PermGroup {
    /// Transpose patterns generated by this operator, with their signs.
    pub fn layouts(self) -> &'static [([usize; 4], f64)] {
        match self {
            PermGroup::Identity => &[(ABIJ, 1.0)],
            PermGroup::Vir => &[(ABIJ, 1.0), (BAIJ, -1.0)],
            PermGroup::Occ => &[(ABIJ, 1.0), (ABJI, -1.0)],
            PermGroup::VirOcc => &[(ABIJ, 1.0), (ABJI, -1.0), (BAIJ, -1.0), (BAJI, 1.0)],
        }
    }
}

/// `acc += coef * Σ sign · transpose(term)` over the layouts of `group`.
pub fn accumulate_antisym(mut acc: TsrMut, term: &Tsr, coef: f64, group: PermGroup) -> CCResult<()> {
    if term.ndim() != 4 || acc.shape() != term.shape() {
        return Err(CCError::Shape(format!(
            "permutation accumulation needs equal rank-4 shapes, got {:?} and {:?}",
            acc.shape(),
            term.shape()
        )));
    }
    for &(axes, sign) in group.layouts() {
        if axes == ABIJ {
            acc += (coef * sign) * term;
        } else {
            acc += (coef * sign) * term.transpose(axes);
        }
    }
    Ok(())
}

/* #endregion */
