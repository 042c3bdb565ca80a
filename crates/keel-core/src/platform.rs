use std::fmt;

use serde::{Deserialize, Serialize};

/// A package platform such as `ruby` (pure, runs anywhere), `java`, or
/// `x86_64-linux`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Platform(String);

impl Platform {
    /// The platform-independent marker.
    pub const RUBY: &'static str = "ruby";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn ruby() -> Self {
        Self::new(Self::RUBY)
    }

    /// The platform of the running process, e.g. `x86_64-linux`.
    pub fn local() -> Self {
        Self(format!(
            "{}-{}",
            std::env::consts::ARCH,
            std::env::consts::OS
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_ruby(&self) -> bool {
        self.0 == Self::RUBY
    }

    /// Collapse a concrete platform onto one of the generic families
    /// tracked in lockfiles: `ruby`, `java`, `mswin`, `mingw`.
    pub fn generic(&self) -> Platform {
        let name = self.0.as_str();
        if name.contains("java") {
            Self::new("java")
        } else if name.contains("mswin") {
            Self::new("mswin")
        } else if name.contains("mingw") {
            Self::new("mingw")
        } else {
            Self::ruby()
        }
    }

    /// Whether a spec built for `self` can serve a request for `requested`.
    pub fn matches(&self, requested: &Platform) -> bool {
        self.is_ruby() || self == requested || &self.generic() == requested
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::ruby()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Platform {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
