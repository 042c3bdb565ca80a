use std::fmt;
use std::hash::{Hash, Hasher};

use crate::platform::Platform;
use crate::requirement::Requirement;
use crate::source::SourceId;

/// The group every dependency belongs to unless the manifest says otherwise.
pub const DEFAULT_GROUP: &str = "default";

/// A declared dependency request.
///
/// Equality is structural over name, requirement, source and groups. The
/// platform predicate is not part of it.
#[derive(Debug, Clone)]
pub struct Dependency {
    pub name: String,
    pub requirement: Requirement,
    pub groups: Vec<String>,
    pub source: Option<SourceId>,
    /// Generic platforms this dependency applies to; empty means all.
    pub platforms: Vec<Platform>,
}

impl Dependency {
    pub fn new(name: impl Into<String>, requirement: Requirement) -> Self {
        Self {
            name: name.into(),
            requirement,
            groups: vec![DEFAULT_GROUP.to_string()],
            source: None,
            platforms: Vec::new(),
        }
    }

    /// A bare name, accepting any version.
    pub fn any(name: impl Into<String>) -> Self {
        Self::new(name, Requirement::any())
    }

    pub fn with_source(mut self, source: SourceId) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_platforms<I>(mut self, platforms: I) -> Self
    where
        I: IntoIterator<Item = Platform>,
    {
        self.platforms = platforms.into_iter().collect();
        self
    }

    /// The tracked platforms this dependency applies to.
    pub fn gem_platforms(&self, tracked: &[Platform]) -> Vec<Platform> {
        if self.platforms.is_empty() {
            return tracked.to_vec();
        }
        let mut out: Vec<Platform> = Vec::new();
        for p in tracked {
            if self.platforms.contains(&p.generic()) && !out.contains(p) {
                out.push(p.clone());
            }
        }
        out
    }

    /// Whether the dependency applies to the running platform at all.
    pub fn should_include(&self, local: &Platform) -> bool {
        self.platforms.is_empty() || self.platforms.contains(&local.generic())
    }

    pub fn in_any_group(&self, groups: &[String]) -> bool {
        self.groups.iter().any(|g| groups.contains(g))
    }

    /// The `DEPENDENCIES` line for this request. A trailing `!` marks a
    /// dependency pinned to a specific source.
    pub fn to_lock(&self) -> String {
        let mut out = format!("  {}", self.name);
        if !self.requirement.is_default() {
            out.push_str(&format!(" ({})", self.requirement));
        }
        if self.source.is_some() {
            out.push('!');
        }
        out.push('\n');
        out
    }
}

impl PartialEq for Dependency {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.requirement == other.requirement
            && self.source == other.source
            && self.groups == other.groups
    }
}

impl Eq for Dependency {}

impl Hash for Dependency {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.requirement.hash(state);
        self.source.hash(state);
        self.groups.hash(state);
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.requirement.is_default() {
            f.write_str(&self.name)
        } else {
            write!(f, "{} ({})", self.name, self.requirement)
        }
    }
}

/// A dependency scoped to one platform: the unit handed to the solver.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlatformRequest {
    pub dependency: Dependency,
    pub platform: Platform,
}

impl PlatformRequest {
    pub fn new(dependency: Dependency, platform: Platform) -> Self {
        Self {
            dependency,
            platform,
        }
    }

    pub fn name(&self) -> &str {
        &self.dependency.name
    }

    pub fn requirement(&self) -> &Requirement {
        &self.dependency.requirement
    }
}

impl fmt::Display for PlatformRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.platform.is_ruby() {
            self.dependency.fmt(f)
        } else {
            write!(f, "{} [{}]", self.dependency, self.platform)
        }
    }
}
