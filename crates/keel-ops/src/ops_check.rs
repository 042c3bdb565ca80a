//! Operation: verify that `Keel.lock` matches `Keel.toml` and is installable.
//!
//! Nothing is written. This is the gate to run before deploying.

use std::path::Path;

use keel_core::platform::Platform;
use keel_core::spec::Spec;
use keel_core::{LOCKFILE_NAME, MANIFEST_NAME};
use keel_resolver::definition::{Definition, UnlockRequest};
use keel_resolver::fetch::SourceFetcher;
use keel_util::errors::KeelError;

use crate::ops_lock;

/// Fail with a drift report if the manifest changed since the lock was
/// written, or with the missing specs if a source no longer offers them.
pub fn check(
    project_root: &Path,
    platform: Option<&Platform>,
    fetcher: Box<dyn SourceFetcher>,
) -> miette::Result<()> {
    let manifest_path = project_root.join(MANIFEST_NAME);
    let lockfile_path = project_root.join(LOCKFILE_NAME);
    if !lockfile_path.is_file() {
        return Err(KeelError::Drift {
            message: format!("{LOCKFILE_NAME} not found; run `keel lock` first"),
        }
        .into());
    }

    let ctx = ops_lock::context(project_root, platform, fetcher)?;
    let mut definition = Definition::build(&manifest_path, &lockfile_path, UnlockRequest::none(), ctx)?;
    definition.ensure_equivalent()?;

    let missing = definition.missing_specs()?;
    if !missing.is_empty() {
        let specs: Vec<String> = missing.iter().map(Spec::full_name).collect();
        for spec in &specs {
            keel_util::progress::status_warn("Missing", spec);
        }
        return Err(KeelError::MissingSpecs { specs }.into());
    }

    keel_util::progress::status("Checked", "the manifest's dependencies are satisfied");
    Ok(())
}
