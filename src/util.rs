use crate::prelude::*;
use std::path::Path;

/// Read a `.npy` array of `f64` into a tensor.
///
/// Both C- and Fortran-ordered files are accepted; the element at a given
/// index is the same as in numpy either way.
///
/// # Usage
///
/// ```norun
/// let eri = tensor_from_npy("eri.npy")?;
/// ```
pub fn tensor_from_npy(path: impl AsRef<Path>) -> CCResult<Tsr> {
    let path = path.as_ref();
    let npy_error = |reason: String| CCError::Npy { file: path.display().to_string(), reason };

    let device = DeviceTsr::default();
    let bytes = std::fs::read(path)?;
    let npy = npyz::NpyFile::new(&bytes[..]).map_err(|e| npy_error(e.to_string()))?;
    let shape = npy.shape().iter().map(|&x| x as usize).collect::<Vec<usize>>();
    let order = npy.order();
    let data: Vec<f64> = npy.into_vec().map_err(|e| npy_error(e.to_string()))?;
    if data.len() != shape.iter().product::<usize>() {
        return Err(npy_error(format!("{} elements do not fill shape {shape:?}", data.len())));
    }

    let tsr = match order {
        npyz::Order::C => rt::asarray((data, shape.c(), &device)),
        npyz::Order::Fortran => rt::asarray((data, shape.f(), &device)),
    };
    Ok(tsr)
}

/// Read the Fock matrix and antisymmetrized integrals and check them against
/// the occupied count.
pub fn ccsd_info_from_npy(fock: impl AsRef<Path>, eri: impl AsRef<Path>, nocc: usize) -> CCResult<CCSDInfo> {
    let fock = tensor_from_npy(fock)?;
    let eri = tensor_from_npy(eri)?;
    let norb = fock.shape().first().copied().unwrap_or(0);
    let space = OrbitalSpace::new(norb, nocc)?;
    // partition once to validate all shapes up front
    integral_maps(&fock, &eri, &space)?;
    Ok(CCSDInfo { fock, eri, space })
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// Minimal version-1.0 `.npy` file for a little-endian f64 array.
    fn npy_bytes(shape: &[usize], fortran_order: bool, data: &[f64]) -> Vec<u8> {
        let shape_str = match shape {
            [n] => format!("({n},)"),
            _ => format!("({})", shape.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(", ")),
        };
        let order = if fortran_order { "True" } else { "False" };
        let mut header = format!("{{'descr': '<f8', 'fortran_order': {order}, 'shape': {shape_str}, }}");
        // magic (6) + version (2) + header length (2) + header, padded to 64 with a trailing newline
        while (10 + header.len() + 1) % 64 != 0 {
            header.push(' ');
        }
        header.push('\n');

        let mut bytes = b"\x93NUMPY\x01\x00".to_vec();
        bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
        bytes.extend_from_slice(header.as_bytes());
        for x in data {
            bytes.extend_from_slice(&x.to_le_bytes());
        }
        bytes
    }

    fn write_tmp(name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("rstsr-so-ccsd-{}-{name}", std::process::id()));
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_tensor_from_npy_orders() {
        let data = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];

        let path = write_tmp("c.npy", &npy_bytes(&[2, 3], false, &data));
        let tsr = tensor_from_npy(&path).unwrap();
        assert_eq!(tsr.shape(), &vec![2, 3]);
        assert_abs_diff_eq!(tsr[[1, 0]], 3.0);
        assert_abs_diff_eq!(tsr[[0, 2]], 2.0);

        let path = write_tmp("f.npy", &npy_bytes(&[2, 3], true, &data));
        let tsr = tensor_from_npy(&path).unwrap();
        assert_eq!(tsr.shape(), &vec![2, 3]);
        assert_abs_diff_eq!(tsr[[1, 0]], 1.0);
        assert_abs_diff_eq!(tsr[[0, 2]], 4.0);
    }

    #[test]
    fn test_tensor_from_npy_errors() {
        assert!(matches!(tensor_from_npy("/nonexistent/fock.npy"), Err(CCError::Io(_))));

        let path = write_tmp("garbage.npy", b"not an npy file");
        assert!(matches!(tensor_from_npy(&path), Err(CCError::Npy { .. })));
    }
}
