#![allow(unused)]

use std::path::PathBuf;

/// Split a `PATH`-style list (`/path/to/lib1:/path/to/lib2`) into entries.
fn split_search_paths(paths: &str) -> impl Iterator<Item = String> + '_ {
    let split_char = if cfg!(windows) { ';' } else { ':' };
    paths.split(split_char).filter(|path| !path.is_empty()).map(|path| path.to_string())
}

/// Directories that may hold `libopenblas`, most specific first.
///
/// `CCSD_EXT_DIR` is checked before the generic loader variables, then the
/// usual system prefixes.
fn openblas_search_dirs() -> Vec<PathBuf> {
    const ENV_CANDIDATES: [&str; 3] = ["CCSD_EXT_DIR", "LD_LIBRARY_PATH", "DYLD_LIBRARY_PATH"];
    const SYSTEM_ROOTS: [&str; 3] = ["/usr", "/usr/local", "/opt"];
    const LIB_SUBDIRS: [&str; 4] = ["", "lib", "lib64", "lib/x86_64-linux-gnu"];

    let roots = ENV_CANDIDATES
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .flat_map(|paths| split_search_paths(&paths).collect::<Vec<_>>())
        .chain(SYSTEM_ROOTS.iter().map(|root| root.to_string()))
        .map(PathBuf::from)
        .collect::<Vec<_>>();

    let mut dirs: Vec<PathBuf> = vec![];
    for root in roots {
        for sub in LIB_SUBDIRS {
            let dir = root.join(sub);
            if let Ok(dir) = std::fs::canonicalize(&dir) {
                if !dirs.contains(&dir) {
                    dirs.push(dir);
                }
            }
        }
    }
    dirs
}

fn link_openblas() {
    println!("cargo:rerun-if-env-changed=CCSD_EXT_DIR");
    for dir in openblas_search_dirs() {
        println!("cargo:rustc-link-search=native={}", dir.display());
    }

    println!("cargo:rustc-link-lib=openblas");
    println!("cargo:rustc-link-lib=gomp");
}

fn main() {
    #[cfg(feature = "use_openblas")]
    link_openblas();
}
