use std::fmt;
use std::hash::{Hash, Hasher};

use crate::dependency::Dependency;
use crate::platform::Platform;
use crate::requirement::Requirement;
use crate::source::SourceId;
use crate::version::Version;

/// A direct dependency recorded on a resolved spec: name and requirement only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpecDependency {
    pub name: String,
    pub requirement: Requirement,
}

impl SpecDependency {
    pub fn new(name: impl Into<String>, requirement: Requirement) -> Self {
        Self {
            name: name.into(),
            requirement,
        }
    }

    /// Promote to a full dependency request with no source or groups.
    pub fn to_dependency(&self) -> Dependency {
        Dependency::new(self.name.clone(), self.requirement.clone())
    }
}

impl fmt::Display for SpecDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.requirement.is_default() {
            f.write_str(&self.name)
        } else {
            write!(f, "{} ({})", self.name, self.requirement)
        }
    }
}

/// One concrete resolved package.
///
/// Identity is `(name, version, platform)`; the source and dependency list
/// do not take part in equality or hashing.
#[derive(Debug, Clone)]
pub struct Spec {
    pub name: String,
    pub version: Version,
    pub platform: Platform,
    pub source: Option<SourceId>,
    pub dependencies: Vec<SpecDependency>,
}

impl Spec {
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
            platform: Platform::ruby(),
            source: None,
            dependencies: Vec::new(),
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_source(mut self, source: SourceId) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_dependency(mut self, dep: SpecDependency) -> Self {
        self.dependencies.push(dep);
        self
    }

    /// `name-version`, with `-platform` appended for non-ruby platforms.
    pub fn full_name(&self) -> String {
        if self.platform.is_ruby() {
            format!("{}-{}", self.name, self.version)
        } else {
            format!("{}-{}-{}", self.name, self.version, self.platform)
        }
    }

    pub fn satisfies(&self, dep: &Dependency) -> bool {
        self.name == dep.name && dep.requirement.satisfied_by(&self.version)
    }

    pub fn match_platform(&self, requested: &Platform) -> bool {
        self.platform.matches(requested)
    }

    pub fn sorted_dependencies(&self) -> Vec<&SpecDependency> {
        let mut deps: Vec<&SpecDependency> = self.dependencies.iter().collect();
        deps.sort();
        deps
    }

    /// The spec line plus its indented dependency lines.
    pub fn to_lock(&self) -> String {
        let mut out = if self.platform.is_ruby() {
            format!("    {} ({})\n", self.name, self.version)
        } else {
            format!("    {} ({}-{})\n", self.name, self.version, self.platform)
        };
        for dep in self.sorted_dependencies() {
            out.push_str(&format!("      {dep}\n"));
        }
        out
    }
}

impl PartialEq for Spec {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.version == other.version && self.platform == other.platform
    }
}

impl Eq for Spec {}

impl Hash for Spec {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.version.hash(state);
        self.platform.hash(state);
    }
}

impl fmt::Display for Spec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str, version: &str) -> Spec {
        Spec::new(name, Version::parse(version).unwrap())
    }

    #[test]
    fn identity_ignores_source_and_deps() {
        let a = spec("rack", "1.2.1").with_source(SourceId::path("vendor/rack"));
        let b = spec("rack", "1.2.1")
            .with_dependency(SpecDependency::new("rake", Requirement::any()));
        assert_eq!(a, b);
        assert_ne!(a, spec("rack", "1.2.1").with_platform(Platform::new("java")));
    }

    #[test]
    fn full_name_includes_non_ruby_platform() {
        assert_eq!(spec("rack", "1.2").full_name(), "rack-1.2");
        assert_eq!(
            spec("json", "1.4.6")
                .with_platform(Platform::new("java"))
                .full_name(),
            "json-1.4.6-java"
        );
    }

    #[test]
    fn lock_lines_sort_dependencies() {
        let s = spec("rails", "3.0.0")
            .with_dependency(SpecDependency::new(
                "railties",
                Requirement::parse("= 3.0.0").unwrap(),
            ))
            .with_dependency(SpecDependency::new("bundler", Requirement::parse("~> 1.0").unwrap()))
            .with_dependency(SpecDependency::new("rake", Requirement::any()));
        assert_eq!(
            s.to_lock(),
            "    rails (3.0.0)\n      bundler (~> 1.0)\n      railties (= 3.0.0)\n      rake\n"
        );
    }

    #[test]
    fn satisfies_checks_name_and_requirement() {
        let s = spec("rack", "1.2.1");
        let dep = Dependency::new("rack", Requirement::parse(">= 1.0").unwrap());
        assert!(s.satisfies(&dep));
        let dep = Dependency::new("rack", Requirement::parse(">= 2.0").unwrap());
        assert!(!s.satisfies(&dep));
        let dep = Dependency::new("rake", Requirement::any());
        assert!(!s.satisfies(&dep));
    }
}
