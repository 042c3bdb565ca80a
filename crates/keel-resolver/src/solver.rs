//! The constraint solver seam and the reference breadth-first solver.

use std::collections::{BTreeMap, HashMap, VecDeque};

use keel_core::dependency::PlatformRequest;
use keel_core::platform::Platform;
use keel_core::spec::Spec;
use keel_util::errors::KeelError;

use crate::conflict::{ConflictReport, VersionConflict};
use crate::index::Index;
use crate::spec_set::SpecSet;

/// Finds a consistent assignment for a set of platform-scoped requests.
///
/// `source_requirements` maps a package name to the only specs it may be
/// taken from. `hint` is the still-valid part of the previous lock; a solver
/// should reuse it wherever it satisfies the requests.
pub trait Solver {
    fn resolve(
        &self,
        requests: &[PlatformRequest],
        index: &Index,
        source_requirements: &HashMap<String, Vec<Spec>>,
        hint: &SpecSet,
    ) -> Result<SpecSet, KeelError>;
}

impl<S: Solver + ?Sized> Solver for Box<S> {
    fn resolve(
        &self,
        requests: &[PlatformRequest],
        index: &Index,
        source_requirements: &HashMap<String, Vec<Spec>>,
        hint: &SpecSet,
    ) -> Result<SpecSet, KeelError> {
        (**self).resolve(requests, index, source_requirements, hint)
    }
}

/// Breadth-first, hint-first solver without backtracking.
///
/// Each `(name, platform)` is decided the first time it is requested: the
/// hinted spec when it still satisfies, otherwise the highest candidate. A
/// later request the decision does not satisfy is reported as a conflict.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedySolver;

/// Entry in the BFS queue.
struct QueueEntry {
    request: PlatformRequest,
    required_by: Option<String>,
}

impl Solver for GreedySolver {
    fn resolve(
        &self,
        requests: &[PlatformRequest],
        index: &Index,
        source_requirements: &HashMap<String, Vec<Spec>>,
        hint: &SpecSet,
    ) -> Result<SpecSet, KeelError> {
        let mut queue: VecDeque<QueueEntry> = requests
            .iter()
            .map(|r| QueueEntry {
                request: r.clone(),
                required_by: None,
            })
            .collect();
        let mut activated: BTreeMap<(String, Platform), Spec> = BTreeMap::new();
        let mut conflicts = ConflictReport::new();

        while let Some(entry) = queue.pop_front() {
            let request = &entry.request;
            let key = (request.name().to_string(), request.platform.clone());

            if let Some(existing) = activated.get(&key) {
                if !request.requirement().satisfied_by(&existing.version) {
                    conflicts.add(VersionConflict {
                        requested: request.to_string(),
                        required_by: entry.required_by.clone(),
                        resolved: Some(existing.full_name()),
                    });
                }
                continue;
            }

            let pinned = source_requirements.get(request.name());
            let candidates: Vec<&Spec> = match pinned {
                Some(specs) => specs.iter().filter(|s| s.name == request.name()).collect(),
                None => index.specs_named(request.name()).iter().collect(),
            };
            let candidates: Vec<&Spec> = candidates
                .into_iter()
                .filter(|s| s.satisfies(&request.dependency) && s.match_platform(&request.platform))
                .collect();

            let Some(chosen) = choose(request, &candidates, hint, pinned.is_some()) else {
                conflicts.add(VersionConflict {
                    requested: request.to_string(),
                    required_by: entry.required_by.clone(),
                    resolved: None,
                });
                continue;
            };

            tracing::debug!("activating {} for {}", chosen.full_name(), request);
            for dep in &chosen.dependencies {
                queue.push_back(QueueEntry {
                    request: PlatformRequest::new(dep.to_dependency(), request.platform.clone()),
                    required_by: Some(chosen.full_name()),
                });
            }
            activated.insert(key, chosen);
        }

        if !conflicts.is_empty() {
            return Err(KeelError::Unresolvable {
                message: conflicts.to_string(),
            });
        }
        Ok(activated.into_values().collect())
    }
}

/// Pick the spec for one request.
///
/// A hinted spec that still satisfies the request is reused as locked; for a
/// source-pinned package it must also still be offered by that source, and the
/// source's copy is taken.
fn choose(
    request: &PlatformRequest,
    candidates: &[&Spec],
    hint: &SpecSet,
    pinned: bool,
) -> Option<Spec> {
    if let Some(locked) = hint
        .lookup(request.name(), &request.platform)
        .filter(|s| s.satisfies(&request.dependency))
    {
        match candidates.iter().find(|c| **c == locked) {
            Some(offered) if pinned => return Some((*offered).clone()),
            _ if !pinned => return Some(locked.clone()),
            _ => {}
        }
    }

    candidates
        .iter()
        .max_by(|a, b| {
            a.version.cmp(&b.version).then_with(|| {
                (a.platform == request.platform).cmp(&(b.platform == request.platform))
            })
        })
        .map(|s| (*s).clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_core::dependency::Dependency;
    use keel_core::requirement::Requirement;
    use keel_core::source::SourceId;
    use keel_core::spec::SpecDependency;
    use keel_core::version::Version;

    fn spec(name: &str, version: &str) -> Spec {
        Spec::new(name, Version::parse(version).unwrap())
    }

    fn req(name: &str, requirement: &str) -> PlatformRequest {
        PlatformRequest::new(
            Dependency::new(name, Requirement::parse(requirement).unwrap()),
            Platform::ruby(),
        )
    }

    fn index() -> Index {
        let mut index = Index::new();
        index.add_source_specs(&[
            spec("rack", "1.1.0"),
            spec("rack", "1.2.1"),
            spec("rack", "1.3.0"),
            spec("thin", "1.2.7")
                .with_dependency(SpecDependency::new("rack", Requirement::parse(">= 1.0").unwrap())),
        ]);
        index
    }

    fn version_of(set: &SpecSet, name: &str) -> String {
        set.by_name(name)[0].version.to_string()
    }

    #[test]
    fn picks_highest_without_hint() {
        let solved = GreedySolver
            .resolve(&[req("thin", ">= 0")], &index(), &HashMap::new(), &SpecSet::default())
            .unwrap();
        assert_eq!(solved.len(), 2);
        assert_eq!(version_of(&solved, "rack"), "1.3.0");
    }

    #[test]
    fn reuses_satisfying_hint() {
        let hint = SpecSet::new(vec![spec("rack", "1.2.1")]);
        let solved = GreedySolver
            .resolve(&[req("thin", ">= 0")], &index(), &HashMap::new(), &hint)
            .unwrap();
        assert_eq!(version_of(&solved, "rack"), "1.2.1");
    }

    #[test]
    fn ignores_hint_that_no_longer_satisfies() {
        let hint = SpecSet::new(vec![spec("rack", "1.1.0")]);
        let solved = GreedySolver
            .resolve(&[req("rack", ">= 1.2")], &index(), &HashMap::new(), &hint)
            .unwrap();
        assert_eq!(version_of(&solved, "rack"), "1.3.0");
    }

    #[test]
    fn source_requirements_restrict_candidates() {
        let path = SourceId::path("vendor/rack");
        let mut pinned = HashMap::new();
        pinned.insert(
            "rack".to_string(),
            vec![spec("rack", "1.0.0").with_source(path.clone())],
        );
        let solved = GreedySolver
            .resolve(&[req("rack", ">= 0")], &index(), &pinned, &SpecSet::default())
            .unwrap();
        let rack = solved.by_name("rack")[0];
        assert_eq!(rack.version.to_string(), "1.0.0");
        assert_eq!(rack.source, Some(path));
    }

    #[test]
    fn missing_candidate_is_unresolvable() {
        let err = GreedySolver
            .resolve(&[req("rack", ">= 9")], &index(), &HashMap::new(), &SpecSet::default())
            .unwrap_err();
        assert!(matches!(err, KeelError::Unresolvable { .. }));
        assert!(err.to_string().contains("rack (>= 9)"));
    }

    #[test]
    fn incompatible_later_request_is_reported() {
        let err = GreedySolver
            .resolve(
                &[req("rack", "= 1.1.0"), req("thin", ">= 0"), req("rack", ">= 1.2")],
                &index(),
                &HashMap::new(),
                &SpecSet::default(),
            )
            .unwrap_err();
        assert!(err.to_string().contains("conflicts with rack-1.1.0"));
    }
}
