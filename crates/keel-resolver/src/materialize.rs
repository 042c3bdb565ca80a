//! Turning a resolved set into the concrete specs its sources offer.

use std::collections::HashMap;

use keel_core::dependency::PlatformRequest;
use keel_core::source::SourceId;
use keel_core::spec::Spec;
use keel_util::errors::KeelError;

use crate::spec_set::SpecSet;

/// The outcome of materialization: what was found and what was not.
#[derive(Debug, Clone, Default)]
pub struct Materialized {
    pub specs: SpecSet,
    pub missing: Vec<Spec>,
}

impl Materialized {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    pub fn missing_names(&self) -> Vec<String> {
        self.missing.iter().map(Spec::full_name).collect()
    }
}

/// Materialize the part of `resolved` reachable from `requests`.
///
/// Each reachable spec is looked up in the spec list of its own source,
/// obtained through `available` once per source. A spec is found when its
/// source offers the same name and version, preferring the same platform. Every
/// spec that cannot be found is collected into `missing`.
pub fn materialize<F>(
    resolved: &SpecSet,
    requests: &[PlatformRequest],
    mut available: F,
) -> Result<Materialized, KeelError>
where
    F: FnMut(&SourceId) -> Result<Vec<Spec>, KeelError>,
{
    let closure = resolved.for_requests(requests, &[]);
    let mut offered: HashMap<SourceId, Vec<Spec>> = HashMap::new();
    let mut found = Vec::with_capacity(closure.len());
    let mut missing = Vec::new();

    for spec in &closure {
        let Some(id) = &spec.source else {
            missing.push(spec.clone());
            continue;
        };
        if !offered.contains_key(id) {
            let specs = available(id)?;
            offered.insert(id.clone(), specs);
        }
        let concrete = offered.get(id).and_then(|specs| find_concrete(specs, spec));
        match concrete {
            Some(c) => found.push(c.clone()),
            None => {
                tracing::debug!("{} is not offered by {}", spec.full_name(), id);
                missing.push(spec.clone());
            }
        }
    }

    Ok(Materialized {
        specs: SpecSet::new(found),
        missing,
    })
}

fn find_concrete<'a>(offered: &'a [Spec], locked: &Spec) -> Option<&'a Spec> {
    let same_version = |s: &&Spec| s.name == locked.name && s.version == locked.version;
    offered
        .iter()
        .filter(same_version)
        .find(|s| s.platform == locked.platform)
        .or_else(|| {
            offered
                .iter()
                .filter(same_version)
                .find(|s| s.platform.matches(&locked.platform))
        })
}
