use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use keel_util::errors::KeelError;

use crate::dependency::Dependency;
use crate::platform::Platform;
use crate::requirement::Requirement;
use crate::source::{GitReference, Source, SourceId};
use crate::DEFAULT_REMOTE;

/// The parsed representation of a `Keel.toml` file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    /// Registry remotes, in priority order. Defaults to [`DEFAULT_REMOTE`].
    #[serde(default)]
    pub registries: Vec<String>,

    #[serde(default)]
    pub dependencies: BTreeMap<String, DependencyDecl>,
}

/// A dependency entry: either a requirement string or a table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencyDecl {
    Simple(String),
    Detailed(DetailedDependency),
}

/// A dependency with an explicit source, groups, or platforms.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetailedDependency {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub platforms: Vec<String>,
    #[serde(default)]
    pub git: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub rev: Option<String>,
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Manifest {
    /// Load and parse a `Keel.toml` file from the given path.
    pub fn from_path(path: &Path) -> miette::Result<Self> {
        if !path.is_file() {
            return Err(KeelError::ManifestNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }
        let content = std::fs::read_to_string(path).map_err(|e| KeelError::Manifest {
            message: format!("Failed to read {}: {e}", path.display()),
        })?;
        Ok(Self::parse_toml(&content)?)
    }

    /// Parse a `Keel.toml` from a string.
    pub fn parse_toml(content: &str) -> Result<Self, KeelError> {
        toml::from_str(content).map_err(|e| KeelError::Manifest {
            message: format!("Failed to parse Keel.toml: {e}"),
        })
    }

    /// Split into declared dependencies and the sources they reference.
    ///
    /// The registry source always comes first; git and path sources follow in
    /// dependency order, each identity listed once.
    pub fn into_parts(self) -> Result<(Vec<Dependency>, Vec<Source>), KeelError> {
        let remotes = if self.registries.is_empty() {
            vec![DEFAULT_REMOTE.to_string()]
        } else {
            self.registries
        };
        let mut sources = vec![Source::new(SourceId::registry(remotes))];
        let mut dependencies = Vec::with_capacity(self.dependencies.len());

        for (name, decl) in self.dependencies {
            let dep = match decl {
                DependencyDecl::Simple(req) => Dependency::new(name.clone(), parse_req(&name, &req)?),
                DependencyDecl::Detailed(detail) => build_detailed(&name, detail)?,
            };
            if let Some(id) = &dep.source {
                if !sources.iter().any(|s| s.id() == id) {
                    sources.push(Source::new(id.clone()));
                }
            }
            dependencies.push(dep);
        }

        Ok((dependencies, sources))
    }
}

fn parse_req(name: &str, req: &str) -> Result<Requirement, KeelError> {
    Requirement::parse(req).map_err(|_| KeelError::Manifest {
        message: format!("dependency `{name}` has an invalid requirement {req:?}"),
    })
}

fn build_detailed(name: &str, detail: DetailedDependency) -> Result<Dependency, KeelError> {
    let requirement = match &detail.version {
        Some(v) => parse_req(name, v)?,
        None => Requirement::any(),
    };
    let mut dep = Dependency::new(name, requirement);

    if !detail.groups.is_empty() {
        dep = dep.with_groups(detail.groups);
    }
    if !detail.platforms.is_empty() {
        dep = dep.with_platforms(detail.platforms.iter().map(|p| Platform::new(p.as_str())));
    }

    match (detail.git, detail.path) {
        (Some(_), Some(_)) => {
            return Err(KeelError::Manifest {
                message: format!("dependency `{name}` cannot have both `git` and `path`"),
            })
        }
        (Some(uri), None) => {
            let reference = match (detail.branch, detail.tag, detail.rev) {
                (None, None, None) => GitReference::default(),
                (Some(b), None, None) => GitReference::Branch(b),
                (None, Some(t), None) => GitReference::Tag(t),
                (None, None, Some(r)) => GitReference::Rev(r),
                _ => {
                    return Err(KeelError::Manifest {
                        message: format!(
                            "dependency `{name}` may specify only one of `branch`, `tag`, `rev`"
                        ),
                    })
                }
            };
            dep = dep.with_source(SourceId::git(uri, reference));
        }
        (None, Some(path)) => dep = dep.with_source(SourceId::path(path)),
        (None, None) => {}
    }

    Ok(dep)
}
