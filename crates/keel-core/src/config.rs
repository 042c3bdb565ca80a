use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use keel_util::errors::KeelError;

/// Environment variable that turns on frozen mode (`1` or `true`).
pub const ENV_FROZEN: &str = "KEEL_FROZEN";
/// Environment variable listing excluded groups, colon separated.
pub const ENV_WITHOUT: &str = "KEEL_WITHOUT";

/// Resolution settings.
///
/// Loaded from `~/.keel/config.toml`, then `<project>/.keel/config.toml`,
/// then the environment; later layers win.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Forbid any lockfile change.
    #[serde(default)]
    pub frozen: bool,

    /// Groups left out of the installed set.
    #[serde(default)]
    pub without: Vec<String>,
}

/// One config file; every key optional so a layer only overrides what it sets.
#[derive(Debug, Default, Deserialize)]
struct SettingsLayer {
    frozen: Option<bool>,
    without: Option<Vec<String>>,
}

impl Settings {
    /// Load the layered settings for the project rooted at `project_root`.
    pub fn load(project_root: &Path) -> miette::Result<Self> {
        let mut settings = Self::default();
        for path in [Self::global_path(), Self::project_path(project_root)] {
            if let Some(layer) = read_layer(&path)? {
                settings.apply(layer);
            }
        }
        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Returns the path to the global settings file.
    pub fn global_path() -> PathBuf {
        dirs_path().join("config.toml")
    }

    pub fn project_path(project_root: &Path) -> PathBuf {
        project_root.join(".keel").join("config.toml")
    }

    fn apply(&mut self, layer: SettingsLayer) {
        if let Some(frozen) = layer.frozen {
            self.frozen = frozen;
        }
        if let Some(without) = layer.without {
            self.without = without;
        }
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_FROZEN) {
            self.frozen = matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true");
        }
        if let Some(value) = lookup(ENV_WITHOUT) {
            self.without = value
                .split(':')
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(String::from)
                .collect();
        }
    }

    /// Parse a single settings file, layering it over the defaults.
    pub fn parse_toml(content: &str) -> Result<Self, KeelError> {
        let mut settings = Self::default();
        settings.apply(parse_layer(content)?);
        Ok(settings)
    }
}

fn parse_layer(content: &str) -> Result<SettingsLayer, KeelError> {
    toml::from_str(content).map_err(|e| KeelError::Manifest {
        message: format!("Failed to parse keel config: {e}"),
    })
}

fn read_layer(path: &Path) -> miette::Result<Option<SettingsLayer>> {
    if !path.is_file() {
        return Ok(None);
    }
    tracing::debug!("reading settings from {}", path.display());
    let content = std::fs::read_to_string(path).map_err(|e| KeelError::Manifest {
        message: format!("Failed to read {}: {e}", path.display()),
    })?;
    Ok(Some(parse_layer(&content)?))
}

/// Returns the path to the keel data directory (`~/.keel/`).
pub fn dirs_path() -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    Path::new(&home).join(".keel")
}
