//! Set-like collections of resolved specs and closure queries over them.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};

use keel_core::dependency::PlatformRequest;
use keel_core::platform::Platform;
use keel_core::spec::Spec;
use keel_core::BOOTSTRAP_PACKAGE;

/// An ordered collection of specs with no two sharing `(name, version, platform)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecSet {
    specs: Vec<Spec>,
}

impl SpecSet {
    /// Build a set, keeping the first of any duplicate identities.
    pub fn new(specs: Vec<Spec>) -> Self {
        let mut seen: HashSet<Spec> = HashSet::with_capacity(specs.len());
        let specs = specs
            .into_iter()
            .filter(|s| seen.insert(s.clone()))
            .collect();
        Self { specs }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Spec> {
        self.specs.iter()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn as_slice(&self) -> &[Spec] {
        &self.specs
    }

    pub fn to_vec(&self) -> Vec<Spec> {
        self.specs.clone()
    }

    pub fn contains(&self, spec: &Spec) -> bool {
        self.specs.contains(spec)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.specs.iter().any(|s| s.name == name)
    }

    /// Every spec with the given name, one per platform in a multi-platform set.
    pub fn by_name(&self, name: &str) -> Vec<&Spec> {
        self.specs.iter().filter(|s| s.name == name).collect()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for spec in &self.specs {
            if !names.contains(&spec.name) {
                names.push(spec.name.clone());
            }
        }
        names
    }

    /// The spec serving `name` on `platform`: an exact platform match first,
    /// otherwise any spec whose platform can serve the request.
    pub fn lookup(&self, name: &str, platform: &Platform) -> Option<&Spec> {
        self.specs
            .iter()
            .find(|s| s.name == name && &s.platform == platform)
            .or_else(|| {
                self.specs
                    .iter()
                    .find(|s| s.name == name && s.match_platform(platform))
            })
    }

    /// The closure of specs reachable from `requests`.
    ///
    /// Names in `skip` are treated as absent, as are their subtrees unless
    /// something else reaches them. Versions are not checked: a set is assumed
    /// consistent. Sub-dependencies are followed on the platform of the request
    /// that reached their parent. The bootstrap package is carried over if present.
    pub fn for_requests(&self, requests: &[PlatformRequest], skip: &[String]) -> SpecSet {
        let mut handled: HashSet<(String, Platform)> = HashSet::new();
        let mut queue: VecDeque<(String, Platform)> = requests
            .iter()
            .map(|r| (r.name().to_string(), r.platform.clone()))
            .collect();
        let mut out: Vec<Spec> = Vec::new();

        while let Some((name, platform)) = queue.pop_front() {
            if name == BOOTSTRAP_PACKAGE || skip.contains(&name) {
                continue;
            }
            if !handled.insert((name.clone(), platform.clone())) {
                continue;
            }
            if let Some(spec) = self.lookup(&name, &platform) {
                for dep in &spec.dependencies {
                    queue.push_back((dep.name.clone(), platform.clone()));
                }
                out.push(spec.clone());
            }
        }

        if let Some(bootstrap) = self.specs.iter().find(|s| s.name == BOOTSTRAP_PACKAGE) {
            out.push(bootstrap.clone());
        }
        SpecSet::new(out)
    }

    /// Combine with a newer answer: every spec in `newer` is taken, and a spec
    /// of `self` survives only when `newer` has nothing for its
    /// `(name, platform)`.
    pub fn merge(&self, newer: SpecSet) -> SpecSet {
        let produced: HashSet<(&str, &Platform)> = newer
            .iter()
            .map(|s| (s.name.as_str(), &s.platform))
            .collect();
        let kept: Vec<Spec> = self
            .specs
            .iter()
            .filter(|s| !produced.contains(&(s.name.as_str(), &s.platform)))
            .cloned()
            .collect();
        let mut merged = newer.specs.clone();
        merged.extend(kept);
        SpecSet::new(merged)
    }

    /// Specs of `self` absent from `other`.
    pub fn difference(&self, other: &SpecSet) -> Vec<Spec> {
        self.specs
            .iter()
            .filter(|s| !other.contains(s))
            .cloned()
            .collect()
    }

    /// Specs in install order: every spec after the specs it depends on.
    ///
    /// Members of a dependency cycle are emitted together, ordered by full name.
    pub fn sorted(&self) -> Vec<&Spec> {
        let mut ordered: Vec<&Spec> = self.specs.iter().collect();
        ordered.sort_by_key(|s| s.full_name());

        let mut graph: DiGraph<&Spec, ()> = DiGraph::new();
        let mut by_name: HashMap<&str, Vec<NodeIndex>> = HashMap::new();
        let nodes: Vec<NodeIndex> = ordered
            .iter()
            .map(|spec| {
                let idx = graph.add_node(*spec);
                by_name.entry(spec.name.as_str()).or_default().push(idx);
                idx
            })
            .collect();

        // Edges point from a dependent to its dependencies, so the reverse
        // topological order of the components puts dependencies first.
        for (spec, &from) in ordered.iter().zip(&nodes) {
            for dep in spec.sorted_dependencies() {
                let Some(targets) = by_name.get(dep.name.as_str()) else {
                    continue;
                };
                for &to in targets {
                    if to != from && graph.find_edge(from, to).is_none() {
                        graph.add_edge(from, to, ());
                    }
                }
            }
        }

        let mut out = Vec::with_capacity(self.specs.len());
        for mut component in tarjan_scc(&graph) {
            component.sort_by_key(|&idx| graph[idx].full_name());
            out.extend(component.into_iter().map(|idx| graph[idx]));
        }
        out
    }
}

impl From<Vec<Spec>> for SpecSet {
    fn from(specs: Vec<Spec>) -> Self {
        Self::new(specs)
    }
}

impl FromIterator<Spec> for SpecSet {
    fn from_iter<I: IntoIterator<Item = Spec>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a SpecSet {
    type Item = &'a Spec;
    type IntoIter = std::slice::Iter<'a, Spec>;

    fn into_iter(self) -> Self::IntoIter {
        self.specs.iter()
    }
}
