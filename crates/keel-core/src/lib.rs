//! Core data types for keel.
//!
//! Versions and requirements, platforms, dependency requests, resolved specs,
//! sources, the `Keel.toml` manifest, the `Keel.lock` format, and settings.
//!
//! This crate performs no network I/O.

/// Version of the running keel, matched against the bootstrap package.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The package manager's own runtime package, always present in a
/// materialized set and never written to the lockfile.
pub const BOOTSTRAP_PACKAGE: &str = "keel";

/// File name of the manifest.
pub const MANIFEST_NAME: &str = "Keel.toml";

/// File name of the lockfile.
pub const LOCKFILE_NAME: &str = "Keel.lock";

/// Registry remote used when the manifest names none.
pub const DEFAULT_REMOTE: &str = "https://index.keel.dev/";

pub mod config;
pub mod dependency;
pub mod lockfile;
pub mod manifest;
pub mod platform;
pub mod requirement;
pub mod source;
pub mod spec;
pub mod version;
