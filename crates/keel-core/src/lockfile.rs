//! `Keel.lock` reading and rendering.
//!
//! The format is line oriented and indentation sensitive:
//!
//! ```text
//! GIT
//!   remote: https://example.com/engine.git
//!   revision: 6d3a8b1
//!   branch: main
//!   specs:
//!     engine (0.3.0)
//!       rack (>= 1.0)
//!
//! GEM
//!   remote: https://index.keel.dev/
//!   specs:
//!     rack (1.2.1)
//!
//! PLATFORMS
//!   ruby
//!
//! DEPENDENCIES
//!   engine!
//!   rack (~> 1.2)
//! ```
//!
//! Rendering is deterministic: sources sort with the registry last, specs by
//! full name, platforms and dependency names lexicographically.

use std::path::{Path, PathBuf};

use keel_util::errors::KeelError;

use crate::dependency::Dependency;
use crate::platform::Platform;
use crate::requirement::Requirement;
use crate::source::{GitReference, Source, SourceId};
use crate::spec::{Spec, SpecDependency};
use crate::version::Version;
use crate::BOOTSTRAP_PACKAGE;

/// The contents of a parsed lockfile.
#[derive(Debug, Clone, Default)]
pub struct Lockfile {
    pub sources: Vec<Source>,
    pub specs: Vec<Spec>,
    pub platforms: Vec<Platform>,
    pub dependencies: Vec<Dependency>,
}

impl Lockfile {
    /// Load and parse a `Keel.lock` file from the given path.
    pub fn from_path(path: &Path) -> miette::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(KeelError::Io)?;
        Ok(Self::parse(&content)?)
    }

    pub fn parse(text: &str) -> Result<Self, KeelError> {
        Parser::default().run(text)
    }

    /// Render back to lockfile text.
    pub fn to_lock(&self) -> String {
        render(&self.sources, &self.specs, &self.platforms, &self.dependencies)
    }
}

/// Render a resolved state as lockfile text.
///
/// Specs whose source is absent from `sources` are not written; the bootstrap
/// package is never written.
pub fn render(
    sources: &[Source],
    specs: &[Spec],
    platforms: &[Platform],
    dependencies: &[Dependency],
) -> String {
    let mut out = String::new();

    let mut sorted_sources: Vec<&Source> = sources.iter().collect();
    sorted_sources.sort_by_key(|s| s.id().lock_order_key());

    for source in sorted_sources {
        out.push_str(&source.to_lock());
        let mut owned: Vec<&Spec> = specs
            .iter()
            .filter(|s| s.source.as_ref() == Some(source.id()) && s.name != BOOTSTRAP_PACKAGE)
            .collect();
        // Full name keeps same-named specs on different platforms in a stable order.
        owned.sort_by_key(|s| s.full_name());
        owned.dedup();
        for spec in owned {
            out.push_str(&spec.to_lock());
        }
        out.push('\n');
    }

    out.push_str("PLATFORMS\n");
    let mut names: Vec<&str> = platforms.iter().map(Platform::as_str).collect();
    names.sort_unstable();
    names.dedup();
    for p in names {
        out.push_str(&format!("  {p}\n"));
    }

    out.push('\n');
    out.push_str("DEPENDENCIES\n");
    let mut deps: Vec<&Dependency> = dependencies.iter().collect();
    deps.sort_by(|a, b| a.name.cmp(&b.name));
    let mut handled: Vec<&str> = Vec::new();
    for dep in deps {
        if handled.contains(&dep.name.as_str()) {
            continue;
        }
        out.push_str(&dep.to_lock());
        handled.push(&dep.name);
    }

    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceKind {
    Registry,
    Git,
    Path,
}

#[derive(Debug)]
struct SourceBuilder {
    kind: SourceKind,
    remotes: Vec<String>,
    revision: Option<String>,
    reference: Option<GitReference>,
    id: Option<SourceId>,
}

impl SourceBuilder {
    fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            remotes: Vec::new(),
            revision: None,
            reference: None,
            id: None,
        }
    }

    /// Fix the identity once the header is complete.
    fn seal(&mut self, line: usize) -> Result<SourceId, KeelError> {
        if let Some(id) = &self.id {
            return Ok(id.clone());
        }
        let first_remote = || {
            self.remotes.first().cloned().ok_or(KeelError::Lockfile {
                line,
                message: "source section has no remote".to_string(),
            })
        };
        let id = match self.kind {
            SourceKind::Registry => SourceId::registry(self.remotes.clone()),
            SourceKind::Git => SourceId::git(
                first_remote()?,
                self.reference.clone().unwrap_or_default(),
            ),
            SourceKind::Path => SourceId::path(PathBuf::from(first_remote()?)),
        };
        self.id = Some(id.clone());
        Ok(id)
    }

    fn finish(mut self, line: usize) -> Result<Source, KeelError> {
        let id = self.seal(line)?;
        let source = Source::new(id);
        Ok(match self.revision {
            Some(rev) => source.with_revision(rev),
            None => source,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Idle,
    Source,
    Platforms,
    Dependencies,
}

struct Parser {
    section: Section,
    builder: Option<SourceBuilder>,
    lockfile: Lockfile,
    pinned: Vec<String>,
}

impl Default for Parser {
    fn default() -> Self {
        Self {
            section: Section::Idle,
            builder: None,
            lockfile: Lockfile::default(),
            pinned: Vec::new(),
        }
    }
}

impl Parser {
    fn run(mut self, text: &str) -> Result<Lockfile, KeelError> {
        let mut last_line = 0;
        for (idx, raw) in text.lines().enumerate() {
            let line = idx + 1;
            last_line = line;
            let trimmed_end = raw.trim_end();
            if trimmed_end.is_empty() {
                self.close_source(line)?;
                self.section = Section::Idle;
                continue;
            }
            let content = trimmed_end.trim_start_matches(' ');
            let indent = trimmed_end.len() - content.len();
            match indent {
                0 => self.section_header(content, line)?,
                2 => self.header_line(content, line)?,
                4 => self.spec_line(content, line)?,
                6 => self.spec_dependency_line(content, line)?,
                _ => {
                    return Err(KeelError::Lockfile {
                        line,
                        message: format!("unexpected indentation of {indent}"),
                    })
                }
            }
        }
        self.close_source(last_line)?;

        // Pinned dependencies take the source of the locked spec with that name.
        let Lockfile {
            specs,
            dependencies,
            ..
        } = &mut self.lockfile;
        for dep in dependencies.iter_mut() {
            if self.pinned.contains(&dep.name) {
                dep.source = specs
                    .iter()
                    .find(|s| s.name == dep.name)
                    .and_then(|s| s.source.clone());
            }
        }

        Ok(self.lockfile)
    }

    fn close_source(&mut self, line: usize) -> Result<(), KeelError> {
        if let Some(builder) = self.builder.take() {
            let source = builder.finish(line)?;
            self.lockfile.sources.push(source);
        }
        Ok(())
    }

    fn section_header(&mut self, content: &str, line: usize) -> Result<(), KeelError> {
        self.close_source(line)?;
        self.section = match content {
            "GEM" => {
                self.builder = Some(SourceBuilder::new(SourceKind::Registry));
                Section::Source
            }
            "GIT" => {
                self.builder = Some(SourceBuilder::new(SourceKind::Git));
                Section::Source
            }
            "PATH" => {
                self.builder = Some(SourceBuilder::new(SourceKind::Path));
                Section::Source
            }
            "PLATFORMS" => Section::Platforms,
            "DEPENDENCIES" => Section::Dependencies,
            other => {
                return Err(KeelError::Lockfile {
                    line,
                    message: format!("unknown section {other:?}"),
                })
            }
        };
        Ok(())
    }

    fn header_line(&mut self, content: &str, line: usize) -> Result<(), KeelError> {
        match self.section {
            Section::Source => {
                let builder = self.builder.as_mut().ok_or(KeelError::Lockfile {
                    line,
                    message: "source attribute outside a source section".to_string(),
                })?;
                if content == "specs:" {
                    builder.seal(line)?;
                    return Ok(());
                }
                let (key, value) = content.split_once(": ").ok_or(KeelError::Lockfile {
                    line,
                    message: format!("expected `key: value`, found {content:?}"),
                })?;
                let value = value.trim().to_string();
                match key {
                    "remote" => builder.remotes.push(value),
                    "revision" => builder.revision = Some(value),
                    "branch" => builder.reference = Some(GitReference::Branch(value)),
                    "tag" => builder.reference = Some(GitReference::Tag(value)),
                    "ref" => builder.reference = Some(GitReference::Rev(value)),
                    other => tracing::debug!("ignoring lockfile source attribute {other:?}"),
                }
                Ok(())
            }
            Section::Platforms => {
                self.lockfile.platforms.push(Platform::new(content));
                Ok(())
            }
            Section::Dependencies => {
                let (body, pinned) = match content.strip_suffix('!') {
                    Some(body) => (body, true),
                    None => (content, false),
                };
                let (name, requirement) = parse_name_requirement(body, line)?;
                if pinned {
                    self.pinned.push(name.clone());
                }
                self.lockfile
                    .dependencies
                    .push(Dependency::new(name, requirement));
                Ok(())
            }
            Section::Idle => Err(KeelError::Lockfile {
                line,
                message: "indented line outside any section".to_string(),
            }),
        }
    }

    fn spec_line(&mut self, content: &str, line: usize) -> Result<(), KeelError> {
        let builder = match (self.section, self.builder.as_mut()) {
            (Section::Source, Some(b)) => b,
            _ => {
                return Err(KeelError::Lockfile {
                    line,
                    message: "spec line outside a source section".to_string(),
                })
            }
        };
        let source = builder.seal(line)?;

        let malformed = || KeelError::Lockfile {
            line,
            message: format!("expected `name (version)`, found {content:?}"),
        };
        let (name, rest) = content.split_once(" (").ok_or_else(malformed)?;
        let inner = rest.strip_suffix(')').ok_or_else(malformed)?;
        let (version, platform) = match inner.split_once('-') {
            Some((v, p)) => (v, Platform::new(p)),
            None => (inner, Platform::ruby()),
        };
        let version = Version::parse(version).map_err(|_| malformed())?;

        self.lockfile.specs.push(
            Spec::new(name, version)
                .with_platform(platform)
                .with_source(source),
        );
        Ok(())
    }

    fn spec_dependency_line(&mut self, content: &str, line: usize) -> Result<(), KeelError> {
        let spec = match self.section {
            Section::Source => self.lockfile.specs.last_mut(),
            _ => None,
        }
        .ok_or(KeelError::Lockfile {
            line,
            message: "dependency line without a preceding spec".to_string(),
        })?;
        let (name, requirement) = parse_name_requirement(content, line)?;
        spec.dependencies.push(SpecDependency::new(name, requirement));
        Ok(())
    }
}

/// `name` or `name (requirement)`.
fn parse_name_requirement(content: &str, line: usize) -> Result<(String, Requirement), KeelError> {
    match content.split_once(" (") {
        Some((name, rest)) => {
            let inner = rest.strip_suffix(')').ok_or(KeelError::Lockfile {
                line,
                message: format!("unterminated requirement in {content:?}"),
            })?;
            let requirement = Requirement::parse(inner).map_err(|_| KeelError::Lockfile {
                line,
                message: format!("bad requirement {inner:?}"),
            })?;
            Ok((name.to_string(), requirement))
        }
        None => Ok((content.to_string(), Requirement::any())),
    }
}
