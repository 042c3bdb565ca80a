//! Package origins: the registry, git checkouts, and local paths.
//!
//! A [`SourceId`] holds only identity-determining fields and is cheap to clone,
//! so dependencies and specs carry it by value. A [`Source`] wraps an id with
//! the volatile state (locked revision, unlock flag, fetch mode, fetched
//! specs); two sources are the same source iff their ids are equal.

use std::fmt;
use std::path::PathBuf;

use crate::spec::Spec;

/// Which ref of a git repository a source tracks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GitReference {
    Branch(String),
    Tag(String),
    Rev(String),
}

impl GitReference {
    fn lock_key(&self) -> &'static str {
        match self {
            GitReference::Branch(_) => "branch",
            GitReference::Tag(_) => "tag",
            GitReference::Rev(_) => "ref",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            GitReference::Branch(v) | GitReference::Tag(v) | GitReference::Rev(v) => v,
        }
    }
}

impl Default for GitReference {
    fn default() -> Self {
        GitReference::Branch("master".to_string())
    }
}

impl fmt::Display for GitReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value())
    }
}

/// The identity of a source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceId {
    Registry { remotes: Vec<String> },
    Git { uri: String, reference: GitReference },
    Path { path: PathBuf },
}

impl SourceId {
    pub fn registry(remotes: Vec<String>) -> Self {
        SourceId::Registry { remotes }
    }

    pub fn git(uri: impl Into<String>, reference: GitReference) -> Self {
        SourceId::Git {
            uri: uri.into(),
            reference,
        }
    }

    pub fn path(path: impl Into<PathBuf>) -> Self {
        SourceId::Path { path: path.into() }
    }

    pub fn is_registry(&self) -> bool {
        matches!(self, SourceId::Registry { .. })
    }

    pub fn is_path(&self) -> bool {
        matches!(self, SourceId::Path { .. })
    }

    /// Whether the source can be forced to re-fetch instead of honouring
    /// the revision pinned in the lockfile.
    pub fn is_unlockable(&self) -> bool {
        matches!(self, SourceId::Git { .. })
    }

    /// The name used to refer to this source in unlock requests.
    pub fn name(&self) -> String {
        match self {
            SourceId::Registry { .. } => "registry".to_string(),
            SourceId::Git { uri, .. } => {
                let base = uri.trim_end_matches('/').rsplit('/').next().unwrap_or(uri);
                base.strip_suffix(".git").unwrap_or(base).to_string()
            }
            SourceId::Path { path } => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
        }
    }

    /// Sort key for lockfile sections: the registry goes last, everything
    /// else by description.
    pub fn lock_order_key(&self) -> (u8, String) {
        (u8::from(self.is_registry()), self.to_string())
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceId::Registry { remotes } => {
                write!(f, "registry at {}", remotes.join(", "))
            }
            SourceId::Git { uri, reference } => write!(f, "{uri} (at {reference})"),
            SourceId::Path { path } => write!(f, "source at {}", path.display()),
        }
    }
}

/// How a source may obtain its spec list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchMode {
    /// Only what is already installed locally.
    #[default]
    Local,
    /// Locally installed plus the on-disk package cache.
    Cached,
    /// Allowed to reach the network.
    Remote,
}

/// A source with its volatile state.
#[derive(Debug, Clone)]
pub struct Source {
    id: SourceId,
    revision: Option<String>,
    unlocked: bool,
    mode: FetchMode,
    specs: Option<Vec<Spec>>,
}

impl Source {
    pub fn new(id: SourceId) -> Self {
        Self {
            id,
            revision: None,
            unlocked: false,
            mode: FetchMode::default(),
            specs: None,
        }
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    pub fn id(&self) -> &SourceId {
        &self.id
    }

    pub fn name(&self) -> String {
        self.id.name()
    }

    pub fn revision(&self) -> Option<&str> {
        self.revision.as_deref()
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    /// Force a fresh fetch on next use. A no-op for sources that cannot be
    /// unlocked; once unlocked a source stays unlocked.
    pub fn unlock(&mut self) {
        if !self.id.is_unlockable() || self.unlocked {
            return;
        }
        tracing::debug!("unlocking source {}", self.id);
        self.unlocked = true;
        self.specs = None;
    }

    pub fn mode(&self) -> FetchMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: FetchMode) {
        if self.mode != mode {
            self.mode = mode;
            self.specs = None;
        }
    }

    /// Specs fetched earlier, if any.
    pub fn cached_specs(&self) -> Option<&[Spec]> {
        self.specs.as_deref()
    }

    /// Record a fetch result. Every spec is stamped with this source's id.
    /// A reported revision is taken only if the source is unlocked or has no
    /// locked revision yet.
    pub fn store_specs(&mut self, specs: Vec<Spec>, revision: Option<String>) -> &[Spec] {
        if revision.is_some() && (self.unlocked || self.revision.is_none()) {
            self.revision = revision;
        }
        let specs = specs
            .into_iter()
            .map(|mut s| {
                s.source = Some(self.id.clone());
                s
            })
            .collect();
        self.specs.insert(specs)
    }

    /// The section header this source contributes to a lockfile.
    pub fn to_lock(&self) -> String {
        let mut out = String::new();
        match &self.id {
            SourceId::Registry { remotes } => {
                out.push_str("GEM\n");
                for remote in remotes {
                    out.push_str(&format!("  remote: {remote}\n"));
                }
            }
            SourceId::Git { uri, reference } => {
                out.push_str("GIT\n");
                out.push_str(&format!("  remote: {uri}\n"));
                if let Some(rev) = &self.revision {
                    out.push_str(&format!("  revision: {rev}\n"));
                }
                out.push_str(&format!("  {}: {}\n", reference.lock_key(), reference));
            }
            SourceId::Path { path } => {
                out.push_str("PATH\n");
                out.push_str(&format!("  remote: {}\n", path.display()));
            }
        }
        out.push_str("  specs:\n");
        out
    }
}

impl PartialEq for Source {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Source {}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.id.fmt(f)
    }
}
