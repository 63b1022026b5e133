//! # domidocs-render
//!
//! Fills Word (`.docx`) templates from a context, optionally converts the
//! results to PDF, and records a per-template generation report.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use domidocs_render::{Context, Renderer, TemplateRegistry};
//!
//! let registry = TemplateRegistry::from_dir(Path::new("templates"))?;
//! let renderer = Renderer::new(registry);
//! let context = Context::new(serde_json::json!({"denomination": "ACME"}));
//! let report = renderer.render(&context, Path::new("out"), false)?;
//! assert!(!report.has_errors());
//! # Ok::<(), domidocs_render::RenderError>(())
//! ```

use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod context;
pub mod convert;
pub mod docx;
pub mod registry;
pub mod renderer;
pub mod report;

pub use context::Context;
pub use convert::{ConvertError, ConverterChain, NativeConverter, OfficeSuiteConverter, PdfConverter};
pub use docx::{docx_placeholders, fill_docx};
pub use registry::{Template, TemplateRegistry, TemplateSource};
pub use renderer::{Progress, Renderer, OUTPUT_SUFFIX};
pub use report::{read_report, write_report, GenerationReport, ReportEntry, Status, REPORT_FILE};

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("package I/O failed: {0}")]
    Stream(#[from] std::io::Error),

    #[error("invalid template package: {0}")]
    Package(#[from] zip::result::ZipError),

    #[error("not a Word document: {0}")]
    NotADocument(String),

    #[error("report serialisation failed: {0}")]
    Report(#[from] serde_json::Error),
}

impl RenderError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}
