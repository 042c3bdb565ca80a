use std::path::PathBuf;

use keel_util::errors::KeelError;

#[test]
fn test_io_error_display() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
    let err = KeelError::from(io_err);
    assert!(err.to_string().contains("I/O error"), "got: {err}");
}

#[test]
fn test_manifest_not_found_names_the_path() {
    let err = KeelError::ManifestNotFound {
        path: PathBuf::from("/work/app/Keel.toml"),
    };
    assert_eq!(err.to_string(), "/work/app/Keel.toml not found");
}

#[test]
fn test_lockfile_error_carries_line() {
    let err = KeelError::Lockfile {
        line: 7,
        message: "unexpected indentation".to_string(),
    };
    assert_eq!(
        err.to_string(),
        "Lockfile error on line 7: unexpected indentation"
    );
}

#[test]
fn test_unresolvable_error_display() {
    let err = KeelError::Unresolvable {
        message: "rack (>= 2.0) conflicts with rack (< 1.0)".to_string(),
    };
    assert_eq!(
        err.to_string(),
        "Dependency resolution failed: rack (>= 2.0) conflicts with rack (< 1.0)"
    );
}

#[test]
fn test_missing_specs_lists_every_spec() {
    let err = KeelError::MissingSpecs {
        specs: vec!["rack-1.2.1".to_string(), "rake-0.8.7".to_string()],
    };
    assert_eq!(
        err.to_string(),
        "Could not find rack-1.2.1, rake-0.8.7 in any of the sources"
    );
}

#[test]
fn test_drift_error_is_verbatim() {
    let err = KeelError::Drift {
        message: "You have deleted from the manifest:\n* rack".to_string(),
    };
    assert_eq!(err.to_string(), "You have deleted from the manifest:\n* rack");
}

#[test]
fn test_requirement_error_quotes_input() {
    let err = KeelError::Requirement {
        input: "~> ".to_string(),
    };
    assert_eq!(err.to_string(), "Malformed version or requirement: \"~> \"");
}
