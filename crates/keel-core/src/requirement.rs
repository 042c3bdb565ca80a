//! Version requirements: a conjunction of comparator constraints.
//!
//! Supports `=`, `!=`, `>`, `<`, `>=`, `<=` and the pessimistic `~>`
//! (`~> 1.2.3` means `>= 1.2.3, < 1.3`). Constraints are comma-separated;
//! a bare version means `=`.

use std::fmt;

use keel_util::errors::KeelError;

use crate::version::Version;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Op {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    Pessimistic,
}

impl Op {
    pub fn as_str(self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Ne => "!=",
            Op::Gt => ">",
            Op::Lt => "<",
            Op::Ge => ">=",
            Op::Le => "<=",
            Op::Pessimistic => "~>",
        }
    }
}

/// A single `op version` comparator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Constraint {
    pub op: Op,
    pub version: Version,
}

impl Constraint {
    pub fn matches(&self, v: &Version) -> bool {
        match self.op {
            Op::Eq => v == &self.version,
            Op::Ne => v != &self.version,
            Op::Gt => v > &self.version,
            Op::Lt => v < &self.version,
            Op::Ge => v >= &self.version,
            Op::Le => v <= &self.version,
            Op::Pessimistic => v >= &self.version && v.release() < self.version.bump(),
        }
    }

    fn parse(input: &str) -> Result<Self, KeelError> {
        let s = input.trim();
        // Longest operators first so `>=` is not read as `>`.
        let ops = [
            (">=", Op::Ge),
            ("<=", Op::Le),
            ("!=", Op::Ne),
            ("~>", Op::Pessimistic),
            (">", Op::Gt),
            ("<", Op::Lt),
            ("=", Op::Eq),
        ];
        let (op, rest) = ops
            .iter()
            .find_map(|(prefix, op)| s.strip_prefix(prefix).map(|rest| (*op, rest)))
            .unwrap_or((Op::Eq, s));
        let version = Version::parse(rest).map_err(|_| KeelError::Requirement {
            input: input.to_string(),
        })?;
        Ok(Self { op, version })
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.op.as_str(), self.version)
    }
}

/// A set of constraints that must all hold.
///
/// Constraints are kept sorted and deduplicated so that two requirements
/// written in a different order compare equal and render identically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Requirement {
    constraints: Vec<Constraint>,
}

impl Requirement {
    pub fn parse(input: &str) -> Result<Self, KeelError> {
        if input.trim().is_empty() {
            return Err(KeelError::Requirement {
                input: input.to_string(),
            });
        }
        let constraints = input
            .split(',')
            .map(Constraint::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_constraints(constraints))
    }

    /// `>= 0`, satisfied by every version.
    pub fn any() -> Self {
        Self {
            constraints: vec![Constraint {
                op: Op::Ge,
                version: Version::zero(),
            }],
        }
    }

    pub fn exact(version: Version) -> Self {
        Self {
            constraints: vec![Constraint {
                op: Op::Eq,
                version,
            }],
        }
    }

    pub fn from_constraints(mut constraints: Vec<Constraint>) -> Self {
        if constraints.is_empty() {
            return Self::any();
        }
        constraints.sort_by(|a, b| a.version.cmp(&b.version).then(a.op.cmp(&b.op)));
        constraints.dedup();
        Self { constraints }
    }

    pub fn is_default(&self) -> bool {
        *self == Self::any()
    }

    pub fn satisfied_by(&self, version: &Version) -> bool {
        self.constraints.iter().all(|c| c.matches(version))
    }
}

impl Default for Requirement {
    fn default() -> Self {
        Self::any()
    }
}

impl std::str::FromStr for Requirement {
    type Err = KeelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.constraints.iter().map(|c| c.to_string()).collect();
        f.write_str(&parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn req(s: &str) -> Requirement {
        Requirement::parse(s).unwrap()
    }

    #[test]
    fn default_matches_everything() {
        let any = Requirement::any();
        assert!(any.is_default());
        assert!(any.satisfied_by(&v("0.0.1")));
        assert!(any.satisfied_by(&v("99.0")));
        assert_eq!(any.to_string(), ">= 0");
    }

    #[test]
    fn bare_version_is_exact() {
        let r = req("1.2.0");
        assert!(r.satisfied_by(&v("1.2")));
        assert!(!r.satisfied_by(&v("1.2.1")));
        assert_eq!(r.to_string(), "= 1.2.0");
    }

    #[test]
    fn pessimistic_operator() {
        let r = req("~> 1.2.3");
        assert!(r.satisfied_by(&v("1.2.3")));
        assert!(r.satisfied_by(&v("1.2.9")));
        assert!(!r.satisfied_by(&v("1.3")));
        assert!(!r.satisfied_by(&v("1.2.2")));

        let r = req("~> 1.2");
        assert!(r.satisfied_by(&v("1.9")));
        assert!(!r.satisfied_by(&v("2.0")));
    }

    #[test]
    fn pessimistic_excludes_prerelease_of_next() {
        let r = req("~> 1.2");
        assert!(!r.satisfied_by(&v("2.0.rc1")));
    }

    #[test]
    fn compound_requirement() {
        let r = req(">= 1.0, < 2");
        assert!(r.satisfied_by(&v("1.5")));
        assert!(!r.satisfied_by(&v("2.0")));
        assert!(!r.satisfied_by(&v("0.9")));
    }

    #[test]
    fn not_equal() {
        let r = req("!= 1.1");
        assert!(r.satisfied_by(&v("1.0")));
        assert!(!r.satisfied_by(&v("1.1.0")));
    }

    #[test]
    fn order_insensitive_equality() {
        assert_eq!(req("< 2, >= 1.0"), req(">= 1.0, < 2"));
        assert_eq!(req("< 2, >= 1.0").to_string(), ">= 1.0, < 2");
    }

    #[test]
    fn malformed_inputs() {
        assert!(Requirement::parse("").is_err());
        assert!(Requirement::parse(">= ").is_err());
        assert!(Requirement::parse("=> 1.0").is_err());
        assert!(Requirement::parse(">= 1.0,").is_err());
    }
}
