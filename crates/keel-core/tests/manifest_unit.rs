use keel_core::manifest::{DependencyDecl, Manifest};
use keel_core::platform::Platform;
use keel_core::requirement::Requirement;
use keel_core::source::{GitReference, SourceId};
use keel_core::DEFAULT_REMOTE;
use keel_util::errors::KeelError;

const FULL_TOML: &str = r#"
registries = ["https://mirror.example.com/"]

[dependencies]
rack = "~> 1.2"
rspec = { version = ">= 2.0", groups = ["test"] }
nokogiri = { version = ">= 1.4", platforms = ["ruby", "java"] }
engine = { git = "https://example.com/engine.git", branch = "main" }
widgets = { git = "https://example.com/widgets.git", tag = "v2" }
local_lib = { path = "../local_lib" }
"#;

#[test]
fn test_parse_full_manifest() {
    let manifest = Manifest::parse_toml(FULL_TOML).unwrap();
    assert_eq!(manifest.registries, vec!["https://mirror.example.com/"]);
    assert_eq!(manifest.dependencies.len(), 6);
    assert!(matches!(
        manifest.dependencies.get("rack"),
        Some(DependencyDecl::Simple(req)) if req == "~> 1.2"
    ));
    assert!(matches!(
        manifest.dependencies.get("engine"),
        Some(DependencyDecl::Detailed(_))
    ));
}

#[test]
fn test_into_parts_builds_dependencies() {
    let (deps, _) = Manifest::parse_toml(FULL_TOML).unwrap().into_parts().unwrap();
    let find = |name: &str| deps.iter().find(|d| d.name == name).unwrap();

    let rack = find("rack");
    assert_eq!(rack.requirement, Requirement::parse("~> 1.2").unwrap());
    assert_eq!(rack.groups, vec!["default"]);
    assert!(rack.source.is_none());

    assert_eq!(find("rspec").groups, vec!["test"]);
    assert_eq!(
        find("nokogiri").platforms,
        vec![Platform::ruby(), Platform::new("java")]
    );

    let engine = find("engine");
    assert!(engine.requirement.is_default());
    assert_eq!(
        engine.source,
        Some(SourceId::git(
            "https://example.com/engine.git",
            GitReference::Branch("main".into())
        ))
    );
    assert_eq!(
        find("widgets").source,
        Some(SourceId::git(
            "https://example.com/widgets.git",
            GitReference::Tag("v2".into())
        ))
    );
    assert_eq!(find("local_lib").source, Some(SourceId::path("../local_lib")));
}

#[test]
fn test_into_parts_lists_each_source_once_registry_first() {
    let toml = r#"
[dependencies]
engine = { git = "https://example.com/engine.git" }
engine_ext = { git = "https://example.com/engine.git" }
"#;
    let (_, sources) = Manifest::parse_toml(toml).unwrap().into_parts().unwrap();
    assert_eq!(sources.len(), 2);
    assert_eq!(
        sources[0].id(),
        &SourceId::registry(vec![DEFAULT_REMOTE.to_string()])
    );
    assert_eq!(
        sources[1].id(),
        &SourceId::git("https://example.com/engine.git", GitReference::default())
    );
}

#[test]
fn test_empty_manifest_has_registry_source() {
    let (deps, sources) = Manifest::parse_toml("").unwrap().into_parts().unwrap();
    assert!(deps.is_empty());
    assert_eq!(sources.len(), 1);
    assert!(sources[0].id().is_registry());
}

#[test]
fn test_bad_requirement_fails() {
    let toml = r#"
[dependencies]
rack = "~> banana!"
"#;
    let err = Manifest::parse_toml(toml)
        .unwrap()
        .into_parts()
        .unwrap_err();
    assert!(matches!(err, KeelError::Manifest { .. }));
    assert!(err.to_string().contains("rack"));
}

#[test]
fn test_git_and_path_together_fails() {
    let toml = r#"
[dependencies]
engine = { git = "https://example.com/engine.git", path = "../engine" }
"#;
    let result = Manifest::parse_toml(toml).unwrap().into_parts();
    assert!(result.is_err());
}

#[test]
fn test_multiple_git_refs_fails() {
    let toml = r#"
[dependencies]
engine = { git = "https://example.com/engine.git", branch = "main", tag = "v1" }
"#;
    let result = Manifest::parse_toml(toml).unwrap().into_parts();
    assert!(result.is_err());
}

#[test]
fn test_invalid_toml_fails() {
    let result = Manifest::parse_toml("[dependencies\nrack = ");
    assert!(matches!(result, Err(KeelError::Manifest { .. })));
}

#[test]
fn test_parse_manifest_from_nonexistent_path() {
    let result = Manifest::from_path(std::path::Path::new("/nonexistent/Keel.toml"));
    let report = result.unwrap_err();
    assert!(matches!(
        report.downcast_ref::<KeelError>(),
        Some(KeelError::ManifestNotFound { .. })
    ));
}

#[test]
fn test_parse_manifest_from_path() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("Keel.toml");
    std::fs::write(&path, FULL_TOML).unwrap();
    let manifest = Manifest::from_path(&path).unwrap();
    assert_eq!(manifest.dependencies.len(), 6);
}
