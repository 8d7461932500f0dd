#![allow(unused)]

/* #region for API callers */

pub use crate::ccsd::{AmplitudeLayout, ccsd_kernel, get_ccsd_initial_guess};
pub use crate::contract::{PermGroup, Subscripts, accumulate_antisym, einsum, einsum_scalar};
pub use crate::diis::{DIISIncore, DIISIncoreFlags};
pub use crate::energy::{
    get_ccsd_energy, get_ccsd_energy_from_blocks, get_correlation_energy, get_reference_energy, t1_diagnostic,
};
pub use crate::error::{CCError, CCResult};
pub use crate::integrals::{EriBlocks, FockBlocks, OrbitalSpace, integral_maps};
pub use crate::residuals::get_ccsd_residuals;
pub use crate::structs::{CCSDConfig, CCSDInfo, CCSDResults, CCSDStatus, Denominators};

/* #endregion */

/* #region for developers */

// RSTSR backend specification
#[cfg(not(feature = "use_openblas"))]
pub type DeviceTsr = DeviceFaer;
#[cfg(feature = "use_openblas")]
pub type DeviceTsr = DeviceOpenBLAS;

pub(crate) use log::{debug, info, warn};
pub(crate) use rayon::prelude::*;
pub use rstsr::prelude::*;

pub(crate) use crate::*;

pub type Tsr<D = IxD> = Tensor<f64, DeviceTsr, D>;
pub type TsrView<'a, D = IxD> = TensorView<'a, f64, DeviceTsr, D>;
pub type TsrMut<'a, D = IxD> = TensorMut<'a, f64, DeviceTsr, D>;

/* #endregion */
