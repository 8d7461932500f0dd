use crate::prelude::*;
use std::collections::HashMap;

pub struct DIISIncoreFlags {
    /// Maximum number of vectors in the DIIS space. Default is 6.
    pub space: usize,

    /// Minimum number of vectors in the DIIS space for extrapolation. Default is 1.
    pub min_space: usize,

    /// Number of updates that only record the vector before extrapolation
    /// starts. Default is 4.
    pub start_cycle: usize,
}

impl Default for DIISIncoreFlags {
    fn default() -> Self {
        Self { space: 6, min_space: 1, start_cycle: 4 }
    }
}

pub struct DIISIncoreIntermediates {
    /// The previous index of the inserted vector.
    prev: Option<usize>,

    /// Error vector overlap matrix for DIIS
    ///
    /// This overlap matrix follows convention that
    /// - the first row and column is auxiliary vector `[0, 1, ..., 1]`;
    /// - the rest of the matrix is the overlap matrix of the error vectors.
    ///
    /// Thus, internal index is 1-based.
    ovlp: Tsr,

    /// Error vectors for DIIS.
    ///
    /// Mapping: idx_internal -> err
    err_map: HashMap<usize, Tsr>,

    /// Vectors to be extrapolated for DIIS
    ///
    /// Mapping: idx_internal -> vec
    vec_map: HashMap<usize, Tsr>,

    /// Mapping of internal index.
    ///
    /// Mapping: idx_internal -> iteration
    niter_map: HashMap<usize, usize>,

    /// Number of `update` calls so far.
    ncall: usize,

    /// Number of extrapolations abandoned for an ill-conditioned subspace.
    nfallback: usize,
}

pub struct DIISIncore {
    pub flags: DIISIncoreFlags,
    pub intermediates: DIISIncoreIntermediates,
}

/// Relative eigenvalue threshold of the bordered matrix below which the
/// subspace is treated as singular.
const DIIS_SINGULAR_THRESHOLD: f64 = 1.0e-14;

impl DIISIncore {
    /// Initialize DIIS object.
    pub fn new(flags: DIISIncoreFlags, device: &DeviceTsr) -> CCResult<Self> {
        if flags.space == 0 || flags.min_space == 0 {
            return Err(CCError::Config(format!(
                "DIIS space ({}) and min_space ({}) must be >= 1",
                flags.space, flags.min_space
            )));
        }

        let mut ovlp: Tsr = rt::zeros(([flags.space + 1, flags.space + 1], device));
        ovlp.i_mut((0, 1..)).fill(1.0);
        ovlp.i_mut((1.., 0)).fill(1.0);
        let intermediates = DIISIncoreIntermediates {
            prev: None,
            ovlp,
            err_map: HashMap::new(),
            vec_map: HashMap::new(),
            niter_map: HashMap::new(),
            ncall: 0,
            nfallback: 0,
        };

        Ok(Self { flags, intermediates })
    }

    pub fn len(&self) -> usize {
        self.intermediates.err_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intermediates.err_map.is_empty()
    }

    /// Number of extrapolations that fell back to the plain iterate.
    pub fn nfallback(&self) -> usize {
        self.intermediates.nfallback
    }

    /// Iteration numbers currently held, ascending.
    pub fn iterations(&self) -> Vec<usize> {
        let mut niters = self.intermediates.niter_map.values().copied().collect::<Vec<_>>();
        niters.sort_unstable();
        niters
    }

    /// Compute the next index to be inserted.
    ///
    /// Free slots are filled first; once full, the slot holding the oldest
    /// iteration is reused.
    pub fn get_head(&self) -> usize {
        let cur_space = self.intermediates.err_map.len();
        if cur_space < self.flags.space {
            return cur_space + 1;
        }
        self.intermediates.niter_map.iter().min_by_key(|(_, niter)| **niter).map(|(idx, _)| *idx).unwrap_or(1)
    }

    /// Pop the given index and clear its overlap row and column.
    pub fn pop_head(&mut self, head: usize) {
        self.intermediates.err_map.remove(&head);
        self.intermediates.vec_map.remove(&head);
        self.intermediates.niter_map.remove(&head);

        let ovlp = &mut self.intermediates.ovlp;
        ovlp.i_mut((head, 1..)).fill(0.0);
        ovlp.i_mut((1.., head)).fill(0.0);
    }

    /// Insert a vector and its error to the DIIS space.
    pub fn insert(&mut self, vec: Tsr, err: Tsr, iteration: usize) -> CCResult<()> {
        if vec.size() != err.size() {
            return Err(CCError::Shape(format!(
                "DIIS vector has {} elements but its error has {}",
                vec.size(),
                err.size()
            )));
        }
        if let Some(stored) = self.intermediates.vec_map.values().next() {
            if stored.size() != vec.size() {
                return Err(CCError::Shape(format!(
                    "DIIS vector has {} elements, the stored ones have {}",
                    vec.size(),
                    stored.size()
                )));
            }
        }

        // 1. evict if necessary
        let head = self.get_head();
        if self.intermediates.err_map.len() >= self.flags.space {
            self.pop_head(head);
        }

        // 2. insert the vector and update information
        self.intermediates.err_map.insert(head, err.into_shape(-1));
        self.intermediates.vec_map.insert(head, vec.into_shape(-1));
        self.intermediates.niter_map.insert(head, iteration);
        self.intermediates.prev = Some(head);

        // 3. update the overlap matrix
        let num_space = self.intermediates.err_map.len();
        let err_map = &self.intermediates.err_map;
        let err_cur = &err_map[&head];
        let ovlp_cur = (1..=num_space)
            .into_par_iter()
            .map(|idx| err_map.get(&idx).map(|err| (err_cur % err).to_scalar()).unwrap_or(0.0))
            .collect::<Vec<f64>>();
        let ovlp = &mut self.intermediates.ovlp;
        for (n, val) in ovlp_cur.into_iter().enumerate() {
            ovlp[[head, n + 1]] = val;
            ovlp[[n + 1, head]] = val;
        }
        Ok(())
    }

    /// Most recently inserted vector.
    fn latest(&self) -> CCResult<Tsr> {
        self.intermediates
            .prev
            .and_then(|prev| self.intermediates.vec_map.get(&prev))
            .map(|vec| vec.to_owned())
            .ok_or_else(|| CCError::Shape("no vectors in the DIIS space".to_string()))
    }

    fn fallback(&mut self, reason: &str) -> CCResult<Tsr> {
        warn!("DIIS extrapolation skipped ({reason}), using the latest iterate");
        self.intermediates.nfallback += 1;
        self.latest()
    }

    /// Extrapolate the vector from the DIIS space.
    pub fn extrapolate(&mut self) -> CCResult<Tsr> {
        // 1. get the number of vectors in the DIIS space
        let num_space = self.intermediates.err_map.len();
        if num_space == 0 || num_space < self.flags.min_space {
            return self.latest();
        }

        // 2. bordered matrix, error block scaled by its largest diagonal
        let device = self.intermediates.ovlp.device().clone();
        let dim = num_space + 1;
        let scale = (1..dim).map(|idx| self.intermediates.ovlp[[idx, idx]]).fold(0.0_f64, f64::max);
        if !(scale.is_finite() && scale > 0.0) {
            return self.fallback("error vectors vanish or are not finite");
        }
        let mut h = self.intermediates.ovlp.i((..dim, ..dim)).to_owned();
        let block = h.i((1.., 1..)).mapv(|x| x / scale);
        h.i_mut((1.., 1..)).assign(&block);

        // 3. solve h c = g with g = [1, 0, ..., 0] through the eigendecomposition
        let (w, v): (Tsr, Tsr) = rt::linalg::eigh(&h).into();
        let w_abs_max = w.raw().iter().fold(0.0_f64, |acc, x| acc.max(x.abs()));
        let w_abs_min = w.raw().iter().fold(f64::INFINITY, |acc, x| acc.min(x.abs()));
        if !(w_abs_min > DIIS_SINGULAR_THRESHOLD * w_abs_max) {
            return self.fallback("subspace is singular");
        }
        let w = w.mapv(|x| 1.0 / x);

        let mut g: Tsr = rt::zeros(([dim], &device));
        g[[0]] = 1.0;

        // DIIS coefficients
        let c = (v.view() * w) % v.t() % g;
        let coef = (1..dim).map(|idx| c[[idx]]).collect::<Vec<f64>>();
        if coef.iter().any(|x| !x.is_finite()) {
            return self.fallback("coefficients are not finite");
        }
        debug!("DIIS coefficients: {coef:?}");

        // 4. extrapolate the vector
        let mut vec = self.intermediates.vec_map[&1].zeros_like();
        for (n, c) in coef.into_iter().enumerate() {
            vec += &self.intermediates.vec_map[&(n + 1)] * c;
        }

        Ok(vec)
    }

    /// Record `(vec, err)` and return the next iterate.
    ///
    /// The returned tensor has the shape of `vec`. During the first
    /// `start_cycle` calls it is `vec` itself.
    pub fn update(&mut self, vec: Tsr, err: Tsr) -> CCResult<Tsr> {
        let shape = vec.shape().to_vec();
        let iteration = self.intermediates.ncall;
        self.intermediates.ncall += 1;

        self.insert(vec, err, iteration)?;
        let vec = if iteration < self.flags.start_cycle { self.latest()? } else { self.extrapolate()? };
        Ok(vec.into_shape(&shape))
    }
}
