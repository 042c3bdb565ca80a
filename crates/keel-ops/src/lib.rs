//! High-level keel operations.
//!
//! Each operation reads `Keel.toml` and `Keel.lock` from a project root, runs
//! the convergence engine in `keel-resolver`, and reports through
//! `keel_util::progress`.

pub mod ops_check;
pub mod ops_lock;

use std::path::{Path, PathBuf};

use keel_core::MANIFEST_NAME;
use keel_util::errors::{KeelError, KeelResult};

/// The nearest directory at or above `start` that holds a `Keel.toml`.
pub fn find_project_root(start: &Path) -> KeelResult<PathBuf> {
    keel_util::fs::find_ancestor_with(start, MANIFEST_NAME).ok_or_else(|| {
        KeelError::ManifestNotFound {
            path: start.join(MANIFEST_NAME),
        }
        .into()
    })
}
