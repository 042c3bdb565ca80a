//! The merged candidate index the solver searches.

use std::collections::BTreeMap;

use keel_core::dependency::Dependency;
use keel_core::spec::Spec;

/// Every spec available from every source, keyed by name.
///
/// When two sources offer the same identity, the one added first wins.
#[derive(Debug, Clone, Default)]
pub struct Index {
    specs: BTreeMap<String, Vec<Spec>>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the specs of one source.
    pub fn add_source_specs<'a, I>(&mut self, specs: I)
    where
        I: IntoIterator<Item = &'a Spec>,
    {
        for spec in specs {
            let entry = self.specs.entry(spec.name.clone()).or_default();
            if entry.contains(spec) {
                continue;
            }
            entry.push(spec.clone());
            // Ascending by version; for equal versions the generic platform first.
            entry.sort_by(|a, b| {
                a.version
                    .cmp(&b.version)
                    .then_with(|| b.platform.is_ruby().cmp(&a.platform.is_ruby()))
                    .then_with(|| a.platform.cmp(&b.platform))
            });
        }
    }

    /// All specs named `name`, ascending by version.
    pub fn specs_named(&self, name: &str) -> &[Spec] {
        self.specs.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Specs satisfying `dep`, ascending: the last is the best candidate.
    pub fn search(&self, dep: &Dependency) -> Vec<&Spec> {
        self.specs_named(&dep.name)
            .iter()
            .filter(|s| s.satisfies(dep))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.specs.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
