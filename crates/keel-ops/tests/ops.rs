use std::path::Path;

use keel_core::platform::Platform;
use keel_core::source::SourceId;
use keel_core::spec::{Spec, SpecDependency};
use keel_core::requirement::Requirement;
use keel_core::version::Version;
use keel_core::{BOOTSTRAP_PACKAGE, DEFAULT_REMOTE, VERSION};
use keel_ops::ops_check::check;
use keel_ops::ops_lock::{lock, update, LockOptions};
use keel_resolver::fetch::MemoryFetcher;
use keel_util::errors::KeelError;
use tempfile::TempDir;

const LOCKED: &str = "\
GEM
  remote: https://index.keel.dev/
  specs:
    daemons (1.1.0)
    eventmachine (0.12.10)
    rack (1.2.1)
    thin (1.2.7)
      daemons (>= 1.0)
      eventmachine (>= 0.12)
      rack (>= 1.0)

PLATFORMS
  ruby

DEPENDENCIES
  rack (>= 1.0)
  thin
";

const MANIFEST: &str = "\
[dependencies]
rack = \">= 1.0\"
thin = \">= 0\"
";

fn spec(name: &str, version: &str) -> Spec {
    Spec::new(name, Version::parse(version).unwrap())
}

fn sub(name: &str, requirement: &str) -> SpecDependency {
    SpecDependency::new(name, Requirement::parse(requirement).unwrap())
}

fn registry_specs() -> Vec<Spec> {
    vec![
        spec("rack", "1.2.1"),
        spec("rack", "1.3.0"),
        spec("daemons", "1.1.0"),
        spec("eventmachine", "0.12.10"),
        spec("thin", "1.2.7")
            .with_dependency(sub("rack", ">= 1.0"))
            .with_dependency(sub("daemons", ">= 1.0"))
            .with_dependency(sub("eventmachine", ">= 0.12")),
        spec(BOOTSTRAP_PACKAGE, VERSION),
    ]
}

fn fetcher_with(specs: Vec<Spec>) -> Box<MemoryFetcher> {
    let registry = SourceId::registry(vec![DEFAULT_REMOTE.to_string()]);
    Box::new(MemoryFetcher::new().with_specs(registry, specs))
}

fn fetcher() -> Box<MemoryFetcher> {
    fetcher_with(registry_specs())
}

fn project(manifest: &str, lock: Option<&str>) -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("Keel.toml"), manifest).unwrap();
    if let Some(lock) = lock {
        std::fs::write(dir.path().join("Keel.lock"), lock).unwrap();
    }
    dir
}

fn ruby() -> LockOptions {
    LockOptions {
        remote: false,
        platform: Some(Platform::ruby()),
    }
}

fn read_lock(root: &Path) -> String {
    std::fs::read_to_string(root.join("Keel.lock")).unwrap()
}

#[test]
fn lock_writes_a_new_lockfile() {
    let dir = project("[dependencies]\nrack = \">= 1.0\"\n", None);
    let summary = lock(dir.path(), &ruby(), fetcher()).unwrap();

    assert!(summary.written);
    assert_eq!(summary.added, vec!["rack-1.3.0"]);
    assert!(summary.removed.is_empty());
    // rack plus the bootstrap package
    assert_eq!(summary.resolved, 2);
    assert_eq!(
        read_lock(dir.path()),
        "\
GEM
  remote: https://index.keel.dev/
  specs:
    rack (1.3.0)

PLATFORMS
  ruby

DEPENDENCIES
  rack (>= 1.0)
"
    );

    let again = lock(dir.path(), &ruby(), fetcher()).unwrap();
    assert!(!again.written);
}

#[test]
fn lock_keeps_locked_versions() {
    let dir = project(MANIFEST, Some(LOCKED));
    let summary = lock(dir.path(), &ruby(), fetcher()).unwrap();
    assert!(!summary.written);
    assert!(summary.added.is_empty());
    assert!(summary.removed.is_empty());
    assert_eq!(read_lock(dir.path()), LOCKED);
}

#[test]
fn install_order_puts_dependencies_first() {
    let dir = project(MANIFEST, Some(LOCKED));
    let summary = lock(dir.path(), &ruby(), fetcher()).unwrap();
    let order = &summary.install_order;
    assert_eq!(order.len(), summary.resolved);
    let position = |name: &str| order.iter().position(|n| n == name).unwrap();
    for dependency in ["daemons-1.1.0", "eventmachine-0.12.10", "rack-1.2.1"] {
        assert!(position(dependency) < position("thin-1.2.7"), "{order:?}");
    }
}

#[test]
fn lock_without_manifest_fails() {
    let dir = TempDir::new().unwrap();
    let err = lock(dir.path(), &ruby(), fetcher()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<KeelError>(),
        Some(KeelError::ManifestNotFound { .. })
    ));
}

#[test]
fn lock_reports_missing_specs() {
    let offered = registry_specs()
        .into_iter()
        .filter(|s| s.full_name() != "rack-1.2.1")
        .collect();
    let dir = project(MANIFEST, Some(LOCKED));
    let err = lock(dir.path(), &ruby(), fetcher_with(offered)).unwrap_err();
    match err.downcast_ref::<KeelError>() {
        Some(KeelError::MissingSpecs { specs }) => assert_eq!(specs, &vec!["rack-1.2.1".to_string()]),
        other => panic!("expected missing specs, got {other:?}"),
    }
    assert_eq!(read_lock(dir.path()), LOCKED);
}

#[test]
fn frozen_project_refuses_to_rewrite_its_lock() {
    let dir = project(
        "[dependencies]\nrack = \">= 1.0\"\nthin = \">= 0\"\ndaemons = \">= 0\"\n",
        Some(LOCKED),
    );
    std::fs::create_dir_all(dir.path().join(".keel")).unwrap();
    std::fs::write(dir.path().join(".keel/config.toml"), "frozen = true\n").unwrap();

    let err = lock(dir.path(), &ruby(), fetcher()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<KeelError>(),
        Some(KeelError::Drift { .. })
    ));
    assert_eq!(read_lock(dir.path()), LOCKED);
}

#[test]
fn update_everything_moves_to_the_best_versions() {
    let dir = project(MANIFEST, Some(LOCKED));
    let summary = update(dir.path(), &[], fetcher()).unwrap();
    assert!(summary.written);
    assert_eq!(summary.added, vec!["rack-1.3.0"]);
    assert_eq!(summary.removed, vec!["rack-1.2.1"]);
    assert_eq!(read_lock(dir.path()), LOCKED.replace("rack (1.2.1)", "rack (1.3.0)"));
}

#[test]
fn update_one_gem() {
    let dir = project(MANIFEST, Some(LOCKED));
    let summary = update(dir.path(), &["rack".to_string()], fetcher()).unwrap();
    assert_eq!(summary.added, vec!["rack-1.3.0"]);
    assert_eq!(summary.removed, vec!["rack-1.2.1"]);
}

#[test]
fn update_of_an_unrelated_gem_changes_nothing() {
    let dir = project(MANIFEST, Some(LOCKED));
    let summary = update(dir.path(), &["daemons".to_string()], fetcher()).unwrap();
    assert!(!summary.written);
    assert!(summary.added.is_empty());
}

#[test]
fn check_passes_for_a_consistent_project() {
    let dir = project(MANIFEST, Some(LOCKED));
    check(dir.path(), Some(&Platform::ruby()), fetcher()).unwrap();
    assert_eq!(read_lock(dir.path()), LOCKED);
}

#[test]
fn check_reports_manifest_drift() {
    let dir = project(
        "[dependencies]\nthin = \">= 0\"\nrake = \">= 0.8\"\n",
        Some(LOCKED),
    );
    let err = check(dir.path(), Some(&Platform::ruby()), fetcher()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<KeelError>(),
        Some(KeelError::Drift { .. })
    ));
    let message = err.to_string();
    assert!(message.contains("* rake (>= 0.8)"));
    assert!(message.contains("* rack (>= 1.0)"));
    assert_eq!(read_lock(dir.path()), LOCKED);
}

#[test]
fn check_requires_a_lockfile() {
    let dir = project(MANIFEST, None);
    let err = check(dir.path(), Some(&Platform::ruby()), fetcher()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<KeelError>(),
        Some(KeelError::Drift { .. })
    ));
    assert!(!dir.path().join("Keel.lock").exists());
}

#[test]
fn check_reports_missing_specs() {
    let offered = registry_specs()
        .into_iter()
        .filter(|s| s.name != "daemons")
        .collect();
    let dir = project(MANIFEST, Some(LOCKED));
    let err = check(dir.path(), Some(&Platform::ruby()), fetcher_with(offered)).unwrap_err();
    match err.downcast_ref::<KeelError>() {
        Some(KeelError::MissingSpecs { specs }) => assert_eq!(specs, &vec!["daemons-1.1.0".to_string()]),
        other => panic!("expected missing specs, got {other:?}"),
    }
}

#[test]
fn project_root_is_found_from_a_subdirectory() {
    let dir = project(MANIFEST, None);
    let nested = dir.path().join("lib").join("deep");
    std::fs::create_dir_all(&nested).unwrap();
    assert_eq!(keel_ops::find_project_root(&nested).unwrap(), dir.path());

    let empty = TempDir::new().unwrap();
    let err = keel_ops::find_project_root(empty.path()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<KeelError>(),
        Some(KeelError::ManifestNotFound { .. })
    ));
}
