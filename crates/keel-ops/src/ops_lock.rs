//! Operations: resolve dependencies and regenerate `Keel.lock`.

use std::path::Path;

use keel_core::config::Settings;
use keel_core::lockfile::Lockfile;
use keel_core::platform::Platform;
use keel_core::spec::Spec;
use keel_core::{LOCKFILE_NAME, MANIFEST_NAME};
use keel_resolver::definition::{Definition, ResolveContext, UnlockRequest};
use keel_resolver::fetch::SourceFetcher;
use keel_util::errors::KeelError;

/// Options for `keel lock` and `keel update`.
#[derive(Debug, Clone, Default)]
pub struct LockOptions {
    /// Fetch from remote sources and keep every tracked platform.
    pub remote: bool,
    /// Resolve for this platform instead of the running one.
    pub platform: Option<Platform>,
}

/// What a lock run changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockSummary {
    /// Whether `Keel.lock` was rewritten.
    pub written: bool,
    /// Number of specs in the installable set.
    pub resolved: usize,
    /// Full names of resolved specs the previous lock did not have.
    pub added: Vec<String>,
    /// Full names of previously locked specs that are gone.
    pub removed: Vec<String>,
    /// Full names of the installable specs, dependencies before dependents.
    pub install_order: Vec<String>,
}

/// Resolve `Keel.toml` against the existing lock and persist the result.
///
/// Locked versions are kept wherever they still satisfy the manifest.
pub fn lock(
    project_root: &Path,
    opts: &LockOptions,
    fetcher: Box<dyn SourceFetcher>,
) -> miette::Result<LockSummary> {
    run(project_root, UnlockRequest::none(), opts, fetcher)
}

/// Re-resolve with `gems` (and everything they pull in) unlocked.
///
/// An empty `gems` unlocks everything. Update always resolves remotely.
pub fn update(
    project_root: &Path,
    gems: &[String],
    fetcher: Box<dyn SourceFetcher>,
) -> miette::Result<LockSummary> {
    let unlock = if gems.is_empty() {
        UnlockRequest::All
    } else {
        UnlockRequest::gems(gems.iter().cloned())
    };
    let opts = LockOptions {
        remote: true,
        platform: None,
    };
    let summary = run(project_root, unlock, &opts, fetcher)?;
    report_changes(&summary);
    Ok(summary)
}

pub(crate) fn context(
    project_root: &Path,
    platform: Option<&Platform>,
    fetcher: Box<dyn SourceFetcher>,
) -> miette::Result<ResolveContext> {
    let settings = Settings::load(project_root)?;
    let mut ctx = ResolveContext::new(fetcher).with_settings(settings);
    if let Some(platform) = platform {
        ctx = ctx.with_platform(platform.clone());
    }
    Ok(ctx)
}

fn run(
    project_root: &Path,
    unlock: UnlockRequest,
    opts: &LockOptions,
    fetcher: Box<dyn SourceFetcher>,
) -> miette::Result<LockSummary> {
    let manifest_path = project_root.join(MANIFEST_NAME);
    let lockfile_path = project_root.join(LOCKFILE_NAME);
    let previous = match keel_util::fs::read_optional(&lockfile_path).map_err(KeelError::from)? {
        Some(text) => Lockfile::parse(&text)?.specs,
        None => Vec::new(),
    };
    let ctx = context(project_root, opts.platform.as_ref(), fetcher)?;
    let mut definition = Definition::build(&manifest_path, &lockfile_path, unlock, ctx)?;

    for name in definition.unlocked_gems() {
        tracing::debug!("unlocked {name}");
    }

    let sp = keel_util::progress::spinner("Resolving dependencies...");
    let resolved = if opts.remote {
        definition.resolve_remotely()
    } else {
        definition.resolve_with_cache()
    };
    sp.finish_and_clear();

    if let Err(KeelError::MissingSpecs { specs }) = &resolved {
        for spec in specs {
            keel_util::progress::status_warn("Missing", spec);
        }
    }
    let installable = resolved?;
    let resolved = installable.len();
    let install_order: Vec<String> = installable.sorted().into_iter().map(Spec::full_name).collect();
    tracing::debug!("install order: {}", install_order.join(", "));

    if definition.new_platform() {
        tracing::info!("tracking a new platform in {LOCKFILE_NAME}");
    }

    let current = definition.resolve()?.to_vec();
    let added = difference(&current, &previous);
    let removed = difference(&previous, &current);
    let written = definition.lock(&lockfile_path)?;

    if written {
        keel_util::progress::status(
            "Locked",
            &format!("{resolved} specs in {}", lockfile_path.display()),
        );
    } else {
        keel_util::progress::status_info("Fresh", &format!("{LOCKFILE_NAME} is up to date"));
    }

    Ok(LockSummary {
        written,
        resolved,
        added,
        removed,
        install_order,
    })
}

/// Full names of the specs in `from` that `without` lacks, sorted.
fn difference(from: &[Spec], without: &[Spec]) -> Vec<String> {
    let mut names: Vec<String> = from
        .iter()
        .filter(|s| !without.contains(s))
        .map(Spec::full_name)
        .collect();
    names.sort();
    names
}

fn report_changes(summary: &LockSummary) {
    for name in &summary.removed {
        keel_util::progress::status_info("Removing", name);
    }
    for name in &summary.added {
        keel_util::progress::status("Adding", name);
    }
    if summary.added.is_empty() && summary.removed.is_empty() {
        keel_util::progress::status_info("Updated", "all specs already at their best versions");
    }
}
