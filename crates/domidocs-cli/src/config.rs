//! `domidocs.toml` handling
//!
//! ```toml
//! [store]
//! path = "base.xlsx"
//!
//! [migration]
//! threshold = 0.5
//! tie_break = "first"
//!
//! [render]
//! templates_dir = "templates"
//! output_dir = "out"
//! convert_pdf = false
//! ```
//!
//! Relative paths are resolved against the directory holding the file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use domidocs_store::MigrationPolicy;
use serde::Deserialize;
use tracing::debug;

pub const CONFIG_FILE: &str = "domidocs.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("domidocs.xlsx"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    pub templates_dir: PathBuf,
    pub output_dir: PathBuf,
    pub convert_pdf: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            templates_dir: PathBuf::from("templates"),
            output_dir: PathBuf::from("out"),
            convert_pdf: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub store: StoreConfig,
    pub migration: MigrationPolicy,
    pub render: RenderConfig,
}

impl Config {
    /// Load `explicit`, or `domidocs.toml` in the current directory when it
    /// exists, or fall back to defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None if Path::new(CONFIG_FILE).is_file() => Self::from_file(Path::new(CONFIG_FILE)),
            None => {
                debug!("no {CONFIG_FILE}, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = Self::parse(&text)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        debug!(path = %path.display(), "config loaded");
        Ok(config.relative_to(path.parent().unwrap_or_else(|| Path::new(""))))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        anyhow::ensure!(
            config.migration.threshold > 0.0 && config.migration.threshold <= 1.0,
            "migration.threshold must be in (0, 1], got {}",
            config.migration.threshold
        );
        Ok(config)
    }

    fn relative_to(mut self, base: &Path) -> Self {
        for path in [
            &mut self.store.path,
            &mut self.render.templates_dir,
            &mut self.render.output_dir,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
        self
    }
}
