use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Unified error type for all keel operations.
#[derive(Debug, Error, Diagnostic)]
pub enum KeelError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The manifest file does not exist.
    #[error("{} not found", path.display())]
    #[diagnostic(help("Run keel from a directory containing a Keel.toml"))]
    ManifestNotFound { path: PathBuf },

    /// Invalid or malformed manifest (e.g. Keel.toml).
    #[error("Manifest error: {message}")]
    #[diagnostic(help("Check your Keel.toml for syntax errors"))]
    Manifest { message: String },

    /// Malformed lockfile text.
    #[error("Lockfile error on line {line}: {message}")]
    #[diagnostic(help("Delete Keel.lock and re-run to regenerate it"))]
    Lockfile { line: usize, message: String },

    /// A version or requirement string could not be parsed.
    #[error("Malformed version or requirement: {input:?}")]
    Requirement { input: String },

    /// The solver could not find a consistent assignment.
    #[error("Dependency resolution failed: {message}")]
    Unresolvable { message: String },

    /// Resolved specs could not be found in any source.
    #[error("Could not find {} in any of the sources", specs.join(", "))]
    #[diagnostic(help("Run `keel update` to refresh the lockfile against the current sources"))]
    MissingSpecs { specs: Vec<String> },

    /// The manifest and lockfile disagree where they must not.
    #[error("{message}")]
    #[diagnostic(code(keel::drift))]
    Drift { message: String },

    /// An internal invariant was violated by the caller.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Convenience alias for `miette::Result<T>`.
pub type KeelResult<T> = miette::Result<T>;
