//! The resolution aggregate: manifest and previous lock in, lock text out.
//!
//! Construction converges the declared sources and dependencies onto the
//! locked ones. Resolution then keeps the largest still-valid part of the
//! locked solution, hands the rest to the [`Solver`], and merges the answers.
//! The result is memoized; a `Definition` resolves at most once, and the
//! `resolve_*` entry points refuse to run after any resolution happened.

use std::collections::HashMap;
use std::path::Path;

use keel_core::config::Settings;
use keel_core::dependency::{Dependency, PlatformRequest};
use keel_core::lockfile::{self, Lockfile};
use keel_core::manifest::Manifest;
use keel_core::platform::Platform;
use keel_core::requirement::Requirement;
use keel_core::source::{FetchMode, Source, SourceId};
use keel_core::spec::Spec;
use keel_core::version::Version;
use keel_core::{BOOTSTRAP_PACKAGE, LOCKFILE_NAME, VERSION};
use keel_util::errors::KeelError;

use crate::fetch::SourceFetcher;
use crate::index::Index;
use crate::materialize::{materialize, Materialized};
use crate::solver::{GreedySolver, Solver};
use crate::spec_set::SpecSet;

/// Which parts of the previous lock the caller wants re-resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnlockRequest {
    /// Ignore the previous lock entirely.
    All,
    /// Re-resolve the named packages and re-fetch the named sources.
    Partial {
        gems: Vec<String>,
        sources: Vec<String>,
    },
}

impl UnlockRequest {
    pub fn none() -> Self {
        UnlockRequest::Partial {
            gems: Vec::new(),
            sources: Vec::new(),
        }
    }

    pub fn gems<I, S>(gems: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        UnlockRequest::Partial {
            gems: gems.into_iter().map(Into::into).collect(),
            sources: Vec::new(),
        }
    }

    pub fn sources<I, S>(sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        UnlockRequest::Partial {
            gems: Vec::new(),
            sources: sources.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for UnlockRequest {
    fn default() -> Self {
        Self::none()
    }
}

/// The collaborators and environment a `Definition` works with.
pub struct ResolveContext {
    pub settings: Settings,
    /// The platform of the running process.
    pub local_platform: Platform,
    pub fetcher: Box<dyn SourceFetcher>,
    pub solver: Box<dyn Solver>,
}

impl ResolveContext {
    /// Default settings, the running platform and the [`GreedySolver`].
    pub fn new(fetcher: Box<dyn SourceFetcher>) -> Self {
        Self {
            settings: Settings::default(),
            local_platform: Platform::local(),
            fetcher,
            solver: Box::new(GreedySolver),
        }
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.local_platform = platform;
        self
    }

    pub fn with_solver(mut self, solver: Box<dyn Solver>) -> Self {
        self.solver = solver;
        self
    }
}

/// How far a `Definition` has got. Each step happens at most once.
enum Resolution {
    Unresolved,
    /// The solver's answer merged with the converged lock.
    Solved(SpecSet),
    /// The solved set plus the installable specs taken from the sources.
    Materialized { resolved: SpecSet, specs: SpecSet },
}

pub struct Definition {
    dependencies: Vec<Dependency>,
    sources: Vec<Source>,
    platforms: Vec<Platform>,
    locked_deps: Vec<Dependency>,
    locked_specs: SpecSet,
    locked_sources: Vec<Source>,
    unlock_gems: Vec<String>,
    unlock_sources: Vec<String>,
    lockfile_contents: String,
    new_platform: bool,
    remote: bool,
    settings: Settings,
    local_platform: Platform,
    fetcher: Box<dyn SourceFetcher>,
    solver: Box<dyn Solver>,
    index: Option<Index>,
    state: Resolution,
}

impl Definition {
    /// Load `Keel.toml` at `manifest_path` and, if it exists, the lockfile.
    pub fn build(
        manifest_path: &Path,
        lockfile_path: &Path,
        unlock: UnlockRequest,
        context: ResolveContext,
    ) -> miette::Result<Self> {
        let manifest = Manifest::from_path(manifest_path)?;
        let (dependencies, sources) = manifest.into_parts()?;
        let contents = keel_util::fs::read_optional(lockfile_path).map_err(KeelError::Io)?;
        if contents.is_some() {
            tracing::debug!("using {} at {}", LOCKFILE_NAME, lockfile_path.display());
        }
        Ok(Self::new(contents.as_deref(), dependencies, sources, unlock, context)?)
    }

    pub fn new(
        lockfile_contents: Option<&str>,
        dependencies: Vec<Dependency>,
        sources: Vec<Source>,
        unlock: UnlockRequest,
        context: ResolveContext,
    ) -> Result<Self, KeelError> {
        let locked = match lockfile_contents {
            Some(text) => Lockfile::parse(text)?,
            None => Lockfile::default(),
        };
        let platforms = locked.platforms.clone();

        let (locked, unlock_gems, unlock_sources) = match unlock {
            UnlockRequest::All => (Lockfile::default(), Vec::new(), Vec::new()),
            UnlockRequest::Partial { gems, sources } => (locked, gems, sources),
        };

        let mut definition = Self {
            dependencies,
            sources,
            platforms,
            locked_deps: locked.dependencies,
            locked_specs: SpecSet::new(locked.specs),
            locked_sources: locked.sources,
            unlock_gems,
            unlock_sources,
            lockfile_contents: lockfile_contents.unwrap_or_default().to_string(),
            new_platform: false,
            remote: false,
            settings: context.settings,
            local_platform: context.local_platform,
            fetcher: context.fetcher,
            solver: context.solver,
            index: None,
            state: Resolution::Unresolved,
        };

        let current = definition.local_platform.generic();
        definition.new_platform = !definition.platforms.contains(&current);
        if definition.new_platform {
            definition.platforms.push(current);
        }

        // Unlocking a package unlocks everything the lock reaches through it.
        let eager = definition.expand_names(&definition.unlock_gems);
        definition.unlock_gems = definition.locked_specs.for_requests(&eager, &[]).names();
        if !definition.unlock_gems.is_empty() {
            tracing::debug!("unlocking {}", definition.unlock_gems.join(", "));
        }

        definition.converge_sources();
        definition.converge_dependencies();
        Ok(definition)
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn platforms(&self) -> &[Platform] {
        &self.platforms
    }

    pub fn locked_dependencies(&self) -> &[Dependency] {
        &self.locked_deps
    }

    pub fn locked_specs(&self) -> &SpecSet {
        &self.locked_specs
    }

    /// Package names that may not be taken from the previous lock.
    pub fn unlocked_gems(&self) -> &[String] {
        &self.unlock_gems
    }

    /// Whether the running platform was missing from the previous lock.
    pub fn new_platform(&self) -> bool {
        self.new_platform
    }

    /// True when the only source is a registry with no remotes.
    pub fn no_sources(&self) -> bool {
        match self.sources.as_slice() {
            [only] => matches!(only.id(), SourceId::Registry { remotes } if remotes.is_empty()),
            _ => false,
        }
    }

    /// Every group named by a dependency, in first-seen order.
    pub fn groups(&self) -> Vec<String> {
        let mut groups: Vec<String> = Vec::new();
        for group in self.dependencies.iter().flat_map(|d| &d.groups) {
            if !groups.contains(group) {
                groups.push(group.clone());
            }
        }
        groups
    }

    /// Dependencies that apply to the running platform.
    pub fn current_dependencies(&self) -> Vec<&Dependency> {
        self.dependencies
            .iter()
            .filter(|d| d.should_include(&self.local_platform))
            .collect()
    }

    /// Resolve using the local package cache as well as installed packages.
    pub fn resolve_with_cache(&mut self) -> Result<&SpecSet, KeelError> {
        self.ensure_unresolved()?;
        for source in &mut self.sources {
            source.set_mode(FetchMode::Cached);
        }
        self.specs()
    }

    /// Resolve with network access, locking every tracked platform.
    pub fn resolve_remotely(&mut self) -> Result<&SpecSet, KeelError> {
        self.ensure_unresolved()?;
        self.remote = true;
        for source in &mut self.sources {
            source.set_mode(FetchMode::Remote);
        }
        self.specs()
    }

    fn ensure_unresolved(&self) -> Result<(), KeelError> {
        match self.state {
            Resolution::Unresolved => Ok(()),
            Resolution::Solved(_) | Resolution::Materialized { .. } => Err(KeelError::Internal {
                message: "specs already resolved".to_string(),
            }),
        }
    }

    /// The materialized specs for the requested groups, plus the bootstrap
    /// package. Fails with [`KeelError::MissingSpecs`] if any resolved spec is
    /// not offered by its source.
    pub fn specs(&mut self) -> Result<&SpecSet, KeelError> {
        if !matches!(self.state, Resolution::Materialized { .. }) {
            let materialized = self.materialize_requested()?;
            if !materialized.is_complete() {
                return Err(KeelError::MissingSpecs {
                    specs: materialized.missing_names(),
                });
            }
            let mut specs = materialized.specs.to_vec();
            if !materialized.specs.contains_name(BOOTSTRAP_PACKAGE) {
                let wanted = Dependency::new(
                    BOOTSTRAP_PACKAGE,
                    Requirement::exact(Version::parse(VERSION)?),
                );
                if let Some(bootstrap) = self.index()?.search(&wanted).last() {
                    specs.push((*bootstrap).clone());
                }
            }
            let resolved = self.resolve()?.clone();
            self.state = Resolution::Materialized {
                resolved,
                specs: SpecSet::new(specs),
            };
        }
        match &self.state {
            Resolution::Materialized { specs, .. } => Ok(specs),
            Resolution::Unresolved | Resolution::Solved(_) => Err(KeelError::Internal {
                message: "resolution did not complete".to_string(),
            }),
        }
    }

    /// Specs the resolution adds relative to the previous lock.
    pub fn new_specs(&mut self) -> Result<Vec<Spec>, KeelError> {
        let specs = self.specs()?.clone();
        Ok(specs.difference(&self.locked_specs))
    }

    /// Locked specs the resolution no longer contains.
    pub fn removed_specs(&mut self) -> Result<Vec<Spec>, KeelError> {
        let specs = self.specs()?.clone();
        Ok(self.locked_specs.difference(&specs))
    }

    /// Resolved specs none of the sources offer, without failing.
    pub fn missing_specs(&mut self) -> Result<Vec<Spec>, KeelError> {
        Ok(self.materialize_requested()?.missing)
    }

    /// The specs needed by every group except the configured `without` ones.
    pub fn requested_specs(&mut self) -> Result<SpecSet, KeelError> {
        let groups = self.requested_groups();
        self.specs_for(&groups)
    }

    /// The closure of the dependencies in any of `groups`.
    pub fn specs_for(&mut self, groups: &[String]) -> Result<SpecSet, KeelError> {
        let deps: Vec<Dependency> = self
            .dependencies
            .iter()
            .filter(|d| d.in_any_group(groups) && d.should_include(&self.local_platform))
            .cloned()
            .collect();
        let requests = self.expand(&deps, false);
        Ok(self.specs()?.for_requests(&requests, &[]))
    }

    fn requested_groups(&self) -> Vec<String> {
        self.groups()
            .into_iter()
            .filter(|g| !self.settings.without.contains(g))
            .collect()
    }

    fn requested_dependencies(&self) -> Vec<Dependency> {
        let groups = self.requested_groups();
        self.dependencies
            .iter()
            .filter(|d| d.should_include(&self.local_platform) && d.in_any_group(&groups))
            .cloned()
            .collect()
    }

    fn materialize_requested(&mut self) -> Result<Materialized, KeelError> {
        let resolved = self.resolve()?.clone();
        let local = self.local_platform.generic();
        let requests: Vec<PlatformRequest> = self
            .requested_dependencies()
            .into_iter()
            .map(|d| PlatformRequest::new(d, local.clone()))
            .collect();
        materialize(&resolved, &requests, |id| self.source_specs(id))
    }

    /// The resolved set: the locked solution in frozen mode, otherwise the
    /// converged lock merged with the solver's answer.
    pub fn resolve(&mut self) -> Result<&SpecSet, KeelError> {
        if let Resolution::Unresolved = self.state {
            let resolved = if self.settings.frozen {
                tracing::debug!("frozen: using the locked specs as resolved");
                self.locked_specs.clone()
            } else {
                self.solve()?
            };
            self.state = Resolution::Solved(resolved);
        }
        match &self.state {
            Resolution::Solved(resolved) | Resolution::Materialized { resolved, .. } => Ok(resolved),
            Resolution::Unresolved => Err(KeelError::Internal {
                message: "resolution did not complete".to_string(),
            }),
        }
    }

    fn solve(&mut self) -> Result<SpecSet, KeelError> {
        let hint = self.converge_locked_specs()?;

        let mut source_requirements: HashMap<String, Vec<Spec>> = HashMap::new();
        let pinned: Vec<(String, SourceId)> = self
            .dependencies
            .iter()
            .filter_map(|d| d.source.clone().map(|s| (d.name.clone(), s)))
            .collect();
        for (name, id) in pinned {
            let specs = self.source_specs(&id)?;
            source_requirements.insert(name, specs);
        }

        let requests = self.expand(&self.dependencies, self.remote);
        let index = match self.index.take() {
            Some(index) => index,
            None => self.build_index()?,
        };
        tracing::debug!(
            "solving {} requests against {} candidates with {} hinted specs",
            requests.len(),
            index.len(),
            hint.len()
        );
        let solved = self
            .solver
            .resolve(&requests, &index, &source_requirements, &hint);
        self.index = Some(index);
        Ok(hint.merge(solved?))
    }

    /// The candidate index over every source, built on first use.
    pub fn index(&mut self) -> Result<&Index, KeelError> {
        let index = match self.index.take() {
            Some(index) => index,
            None => self.build_index()?,
        };
        Ok(self.index.insert(index))
    }

    fn build_index(&mut self) -> Result<Index, KeelError> {
        let ids: Vec<SourceId> = self.sources.iter().map(|s| s.id().clone()).collect();
        let mut index = Index::new();
        for id in ids {
            index.add_source_specs(&self.source_specs(&id)?);
        }
        Ok(index)
    }

    /// The specs `id` offers, fetched once per source and cached on it.
    fn source_specs(&mut self, id: &SourceId) -> Result<Vec<Spec>, KeelError> {
        match self.sources.iter_mut().find(|s| s.id() == id) {
            Some(source) => {
                if let Some(cached) = source.cached_specs() {
                    return Ok(cached.to_vec());
                }
                let fetched = self.fetcher.fetch(source)?;
                tracing::debug!("fetched {} specs from {}", fetched.specs.len(), id);
                Ok(source.store_specs(fetched.specs, fetched.revision).to_vec())
            }
            None => {
                let mut transient = Source::new(id.clone());
                let fetched = self.fetcher.fetch(&transient)?;
                Ok(transient.store_specs(fetched.specs, fetched.revision).to_vec())
            }
        }
    }

    /// One request per tracked platform each dependency applies to; with
    /// `include_all` false, only the running platform's.
    fn expand(&self, dependencies: &[Dependency], include_all: bool) -> Vec<PlatformRequest> {
        let local = self.local_platform.generic();
        let mut requests = Vec::new();
        for dep in dependencies {
            for platform in dep.gem_platforms(&self.platforms) {
                if include_all || platform == local {
                    requests.push(PlatformRequest::new(dep.clone(), platform));
                }
            }
        }
        requests
    }

    fn expand_names(&self, names: &[String]) -> Vec<PlatformRequest> {
        let deps: Vec<Dependency> = names.iter().map(|n| Dependency::any(n.as_str())).collect();
        self.expand(&deps, false)
    }

    fn converge_sources(&mut self) {
        for source in &mut self.sources {
            if let Some(locked) = self.locked_sources.iter().find(|s| *s == &*source) {
                *source = locked.clone();
            }
        }
        for source in &mut self.sources {
            if self.unlock_sources.contains(&source.name()) {
                source.unlock();
            }
        }
    }

    fn converge_dependencies(&mut self) {
        let known: Vec<SourceId> = self.sources.iter().map(|s| s.id().clone()).collect();
        for dep in self.dependencies.iter_mut().chain(self.locked_deps.iter_mut()) {
            if let Some(id) = &dep.source {
                if !known.contains(id) {
                    tracing::debug!("{} refers to undeclared {}", dep.name, id);
                    dep.source = None;
                }
            }
        }
    }

    /// The largest part of the previous lock still valid for the current
    /// dependencies, to be used as the solver's hint.
    fn converge_locked_specs(&mut self) -> Result<SpecSet, KeelError> {
        let mut kept: Vec<Dependency> = Vec::new();
        let mut unlock = self.unlock_gems.clone();

        let dependencies = self.dependencies.clone();
        for dep in dependencies {
            let locked_dep = self.locked_deps.iter().find(|d| d.name == dep.name);
            let same_source = locked_dep.is_some_and(|d| d.source == dep.source);
            let satisfied = self.locked_specs.iter().any(|s| {
                s.satisfies(&dep) && (dep.source.is_none() || s.source == dep.source)
            });
            if same_source || satisfied {
                kept.push(dep);
                continue;
            }

            let Some(path) = dep.source.clone().filter(SourceId::is_path) else {
                continue;
            };
            if locked_dep.is_some_and(|d| d.source.as_ref() == Some(&path)) {
                continue;
            }
            // A path source can change without a version bump: rescan it.
            unlock.extend(
                self.locked_specs
                    .iter()
                    .filter(|s| s.source.as_ref() == Some(&path))
                    .map(|s| s.name.clone()),
            );
            unlock.extend(self.source_specs(&path)?.into_iter().map(|s| s.name));
        }

        let mut converged: Vec<Spec> = Vec::new();
        for spec in self.locked_specs.to_vec() {
            let declared = spec
                .source
                .as_ref()
                .filter(|id| self.sources.iter().any(|s| s.id() == *id))
                .cloned();
            let Some(id) = declared else {
                tracing::debug!("dropping {}: its source is gone", spec.full_name());
                continue;
            };
            if self.unlock_sources.contains(&spec.name) {
                continue;
            }
            if id.is_path() {
                let live = self.source_specs(&id)?;
                let fresh = live.iter().find(|other| **other == spec).is_some_and(|other| {
                    other.sorted_dependencies() == spec.sorted_dependencies()
                });
                if !fresh {
                    tracing::debug!("dropping {}: {} changed", spec.full_name(), id);
                    unlock.push(spec.name.clone());
                    continue;
                }
            }
            converged.push(spec);
        }

        unlock.sort();
        unlock.dedup();
        let requests = self.expand(&kept, true);
        let resolve = SpecSet::new(converged).for_requests(&requests, &unlock);
        let removed = self.locked_specs.difference(&resolve);

        // A source left with no pinned specs after losing some may re-resolve freely.
        let mut unlocked_any = false;
        for source in &mut self.sources {
            if !source.id().is_unlockable() || source.is_unlocked() {
                continue;
            }
            let id = Some(source.id().clone());
            let still_pinned = resolve.iter().any(|s| s.source == id);
            let lost = removed.iter().any(|s| s.source == id);
            if !still_pinned && lost {
                source.unlock();
                unlocked_any = true;
            }
        }
        // Candidates fetched before the unlock are stale.
        if unlocked_any {
            self.index = None;
        }

        self.unlock_gems = unlock;
        Ok(resolve)
    }

    /// The lockfile text for the resolved state.
    pub fn to_lock(&mut self) -> Result<String, KeelError> {
        let specs = self.resolve()?.to_vec();
        Ok(lockfile::render(
            &self.sources,
            &specs,
            &self.platforms,
            &self.dependencies,
        ))
    }

    /// Write the lockfile to `path` if its text changed.
    ///
    /// Returns whether the file was written. In frozen mode a change is an
    /// error and nothing is written.
    pub fn lock(&mut self, path: &Path) -> Result<bool, KeelError> {
        let contents = self.to_lock()?;
        if contents == self.lockfile_contents {
            tracing::debug!("{} is up to date", path.display());
            return Ok(false);
        }
        if self.settings.frozen {
            return Err(KeelError::Drift {
                message: format!(
                    "{} would change, but frozen mode forbids rewriting it",
                    path.display()
                ),
            });
        }
        keel_util::fs::write_atomic(path, &contents)?;
        self.lockfile_contents = contents;
        Ok(true)
    }

    /// Fail unless the manifest and the lockfile declare the same sources and
    /// dependencies.
    pub fn ensure_equivalent(&self) -> Result<(), KeelError> {
        let mut added: Vec<String> = Vec::new();
        let mut deleted: Vec<String> = Vec::new();
        let mut changed: Vec<String> = Vec::new();

        for source in &self.sources {
            if !self.locked_sources.contains(source) {
                added.push(format!("* source: {source}"));
            }
        }
        for source in &self.locked_sources {
            if !self.sources.contains(source) {
                deleted.push(format!("* source: {source}"));
            }
        }

        let same_request =
            |a: &Dependency, b: &Dependency| a.name == b.name && a.requirement == b.requirement;
        for dep in &self.dependencies {
            if !self.locked_deps.iter().any(|l| same_request(dep, l)) {
                added.push(format!("* {}", pretty_dep(dep)));
            }
        }
        for dep in &self.locked_deps {
            if !self.dependencies.iter().any(|d| same_request(d, dep)) {
                deleted.push(format!("* {}", pretty_dep(dep)));
            }
        }

        for dep in &self.dependencies {
            let Some(locked) = self.locked_deps.iter().find(|l| l.name == dep.name) else {
                continue;
            };
            if locked.source != dep.source {
                changed.push(format!(
                    "* {} from `{}` to `{}`",
                    dep.name,
                    describe_source(dep.source.as_ref()),
                    describe_source(locked.source.as_ref())
                ));
            }
        }

        if added.is_empty() && deleted.is_empty() && changed.is_empty() {
            return Ok(());
        }

        let mut message = format!(
            "You have modified your manifest in development but did not check\n\
             the resulting snapshot ({LOCKFILE_NAME}) into version control"
        );
        for (heading, lines) in [
            ("You have added to the manifest:", &added),
            ("You have deleted from the manifest:", &deleted),
            ("You have changed in the manifest:", &changed),
        ] {
            if !lines.is_empty() {
                message.push_str(&format!("\n\n{heading}\n{}", lines.join("\n")));
            }
        }
        Err(KeelError::Drift { message })
    }
}

fn pretty_dep(dep: &Dependency) -> String {
    if dep.requirement.is_default() {
        dep.name.clone()
    } else {
        format!("{} ({})", dep.name, dep.requirement)
    }
}

fn describe_source(source: Option<&SourceId>) -> String {
    match source {
        Some(id) => id.to_string(),
        None => "no specified source".to_string(),
    }
}
