//! Reporting for requests the solver could not satisfy.

use std::fmt;

/// Every unsatisfiable request met during one solve.
#[derive(Debug, Default)]
pub struct ConflictReport {
    pub conflicts: Vec<VersionConflict>,
}

/// One request that no candidate, or no already-chosen spec, could serve.
#[derive(Debug, Clone)]
pub struct VersionConflict {
    /// The request, e.g. `rack (>= 2.0)` or `json [java]`.
    pub requested: String,
    /// The spec that asked for it; `None` for a manifest dependency.
    pub required_by: Option<String>,
    /// The full name already chosen for that package, if any.
    pub resolved: Option<String>,
}

impl ConflictReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, conflict: VersionConflict) {
        self.conflicts.push(conflict);
    }

    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conflicts.len()
    }
}

impl fmt::Display for ConflictReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.conflicts.is_empty() {
            return write!(f, "No version conflicts.");
        }
        write!(f, "Version conflicts ({}):", self.conflicts.len())?;
        for c in &self.conflicts {
            write!(f, "\n  {c}")?;
        }
        Ok(())
    }
}

impl fmt::Display for VersionConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let origin = match &self.required_by {
            Some(parent) => format!("required by {parent}"),
            None => "required by the manifest".to_string(),
        };
        match &self.resolved {
            Some(resolved) => write!(
                f,
                "{} {origin} conflicts with {resolved}",
                self.requested
            ),
            None => write!(f, "{} {origin} could not be found", self.requested),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_report() {
        let report = ConflictReport::new();
        assert!(report.is_empty());
        assert_eq!(report.len(), 0);
        assert_eq!(report.to_string(), "No version conflicts.");
    }

    #[test]
    fn report_with_conflicts() {
        let mut report = ConflictReport::new();
        report.add(VersionConflict {
            requested: "rack (>= 2.0)".to_string(),
            required_by: Some("thin-1.2.7".to_string()),
            resolved: Some("rack-1.2.1".to_string()),
        });
        report.add(VersionConflict {
            requested: "nope".to_string(),
            required_by: None,
            resolved: None,
        });
        assert_eq!(report.len(), 2);
        let s = report.to_string();
        assert!(s.contains("rack (>= 2.0) required by thin-1.2.7 conflicts with rack-1.2.1"));
        assert!(s.contains("nope required by the manifest could not be found"));
    }
}
