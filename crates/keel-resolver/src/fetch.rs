//! The seam between the convergence engine and whatever reads sources.

use std::collections::HashMap;

use keel_core::source::{Source, SourceId};
use keel_core::spec::Spec;
use keel_util::errors::KeelError;

/// What a source reported when asked for its specs.
#[derive(Debug, Clone, Default)]
pub struct FetchedSource {
    pub specs: Vec<Spec>,
    /// The revision the source now sits at, for sources that have one.
    pub revision: Option<String>,
}

/// Lists the specs a source offers.
///
/// Implementations decide how far to reach based on [`Source::mode`] and
/// whether the source [`is_unlocked`](Source::is_unlocked). Retries for
/// transient failures belong here too.
pub trait SourceFetcher {
    fn fetch(&self, source: &Source) -> Result<FetchedSource, KeelError>;
}

/// A fetcher serving fixed spec lists from memory.
///
/// Sources it has not been told about report no specs.
#[derive(Debug, Clone, Default)]
pub struct MemoryFetcher {
    specs: HashMap<SourceId, Vec<Spec>>,
    revisions: HashMap<SourceId, String>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_specs(mut self, source: SourceId, specs: Vec<Spec>) -> Self {
        self.specs.entry(source).or_default().extend(specs);
        self
    }

    pub fn with_revision(mut self, source: SourceId, revision: impl Into<String>) -> Self {
        self.revisions.insert(source, revision.into());
        self
    }
}

impl SourceFetcher for MemoryFetcher {
    fn fetch(&self, source: &Source) -> Result<FetchedSource, KeelError> {
        let specs = self.specs.get(source.id()).cloned().unwrap_or_default();
        tracing::debug!(
            "serving {} specs for {} ({:?})",
            specs.len(),
            source.id(),
            source.mode()
        );
        Ok(FetchedSource {
            specs,
            revision: self.revisions.get(source.id()).cloned(),
        })
    }
}

impl<F: SourceFetcher + ?Sized> SourceFetcher for Box<F> {
    fn fetch(&self, source: &Source) -> Result<FetchedSource, KeelError> {
        (**self).fetch(source)
    }
}
