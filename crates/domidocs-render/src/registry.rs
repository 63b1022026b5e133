//! Template registry
//!
//! Built once at startup and handed to the [`Renderer`](crate::Renderer).
//! Templates are located here but read at render time, so a corrupt file
//! only fails its own report entry.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::RenderError;

/// Template file extension
pub const TEMPLATE_EXTENSION: &str = "docx";

/// One template file
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Template {
    /// File name, used as the report key
    pub name: String,
    pub path: PathBuf,
}

impl Template {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { name, path }
    }

    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.name.clone())
    }
}

/// Where templates come from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TemplateSource {
    /// Every `.docx` in a directory, in file name order
    Directory(PathBuf),
    /// Exactly these files, in this order
    Files(Vec<PathBuf>),
}

/// Ordered set of templates
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TemplateRegistry {
    templates: Vec<Template>,
}

impl TemplateRegistry {
    pub fn from_source(source: &TemplateSource) -> Result<Self, RenderError> {
        match source {
            TemplateSource::Directory(dir) => Self::from_dir(dir),
            TemplateSource::Files(files) => Ok(Self::from_paths(files.iter().cloned())),
        }
    }

    /// Scan a directory for templates, skipping Office lock files (`~$*`)
    pub fn from_dir(dir: &Path) -> Result<Self, RenderError> {
        let entries = fs::read_dir(dir).map_err(|e| RenderError::io(dir, e))?;
        let mut paths = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| RenderError::io(dir, e))?.path();
            if is_template(&path) {
                paths.push(path);
            } else {
                debug!(path = %path.display(), "not a template, skipped");
            }
        }
        paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(Self::from_paths(paths))
    }

    pub fn from_paths(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            templates: paths.into_iter().map(Template::new).collect(),
        }
    }

    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.name == name)
    }
}

fn is_template(path: &Path) -> bool {
    let lock_file = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with("~$"));
    path.is_file()
        && !lock_file
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(TEMPLATE_EXTENSION))
}
