//! Word to PDF conversion
//!
//! Conversion shells out to an office suite. The default chain tries the
//! platform's native pipeline (`docx2pdf`, driving Word on Windows and
//! macOS) and then a headless LibreOffice.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ConvertError {
    /// The converter's program is not installed or not usable here
    #[error("{0} is not available")]
    Unavailable(String),

    #[error("{converter} failed: {message}")]
    Failed { converter: String, message: String },

    #[error("no converter succeeded: {}", .0.join("; "))]
    Exhausted(Vec<String>),
}

/// Turns a filled `.docx` into a PDF
pub trait PdfConverter: Send + Sync {
    fn name(&self) -> &str;

    fn convert(&self, docx: &Path, pdf: &Path) -> Result<(), ConvertError>;
}

fn spawn_error(name: &str, err: io::Error) -> ConvertError {
    if err.kind() == io::ErrorKind::NotFound {
        ConvertError::Unavailable(name.to_string())
    } else {
        ConvertError::Failed {
            converter: name.to_string(),
            message: err.to_string(),
        }
    }
}

fn run(name: &str, command: &mut Command) -> Result<(), ConvertError> {
    debug!(converter = name, ?command, "running converter");
    let output = command.output().map_err(|e| spawn_error(name, e))?;
    if output.status.success() {
        Ok(())
    } else {
        Err(ConvertError::Failed {
            converter: name.to_string(),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

fn ensure_produced(name: &str, pdf: &Path) -> Result<(), ConvertError> {
    if pdf.is_file() {
        Ok(())
    } else {
        Err(ConvertError::Failed {
            converter: name.to_string(),
            message: format!("{} was not produced", pdf.display()),
        })
    }
}

/// Native pipeline: the `docx2pdf` command, backed by Microsoft Word
#[derive(Clone, Debug)]
pub struct NativeConverter {
    program: PathBuf,
}

impl NativeConverter {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into() }
    }
}

impl Default for NativeConverter {
    fn default() -> Self {
        Self::new("docx2pdf")
    }
}

impl PdfConverter for NativeConverter {
    fn name(&self) -> &str {
        "docx2pdf"
    }

    fn convert(&self, docx: &Path, pdf: &Path) -> Result<(), ConvertError> {
        if !cfg!(any(target_os = "windows", target_os = "macos")) {
            return Err(ConvertError::Unavailable(self.name().to_string()));
        }
        run(self.name(), Command::new(&self.program).arg(docx).arg(pdf))?;
        ensure_produced(self.name(), pdf)
    }
}

/// Headless LibreOffice (`soffice --headless --convert-to pdf`)
#[derive(Clone, Debug)]
pub struct OfficeSuiteConverter {
    program: PathBuf,
}

impl OfficeSuiteConverter {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into() }
    }
}

impl Default for OfficeSuiteConverter {
    fn default() -> Self {
        Self::new("soffice")
    }
}

impl PdfConverter for OfficeSuiteConverter {
    fn name(&self) -> &str {
        "soffice"
    }

    fn convert(&self, docx: &Path, pdf: &Path) -> Result<(), ConvertError> {
        let out_dir = pdf.parent().unwrap_or_else(|| Path::new("."));
        run(
            self.name(),
            Command::new(&self.program)
                .args(["--headless", "--convert-to", "pdf", "--outdir"])
                .arg(out_dir)
                .arg(docx),
        )?;

        // soffice names the output after the input stem
        let produced = out_dir.join(docx.file_stem().unwrap_or_default()).with_extension("pdf");
        if produced != pdf && produced.is_file() {
            fs::rename(&produced, pdf).map_err(|e| ConvertError::Failed {
                converter: self.name().to_string(),
                message: e.to_string(),
            })?;
        }
        ensure_produced(self.name(), pdf)
    }
}

/// Converters tried in order until one succeeds
pub struct ConverterChain {
    converters: Vec<Box<dyn PdfConverter>>,
}

impl ConverterChain {
    pub fn new(converters: Vec<Box<dyn PdfConverter>>) -> Self {
        Self { converters }
    }

    pub fn push(mut self, converter: impl PdfConverter + 'static) -> Self {
        self.converters.push(Box::new(converter));
        self
    }
}

impl Default for ConverterChain {
    fn default() -> Self {
        Self::new(vec![
            Box::new(NativeConverter::default()),
            Box::new(OfficeSuiteConverter::default()),
        ])
    }
}

impl PdfConverter for ConverterChain {
    fn name(&self) -> &str {
        "chain"
    }

    fn convert(&self, docx: &Path, pdf: &Path) -> Result<(), ConvertError> {
        let mut failures = Vec::new();
        for converter in &self.converters {
            match converter.convert(docx, pdf) {
                Ok(()) => return Ok(()),
                Err(ConvertError::Unavailable(name)) => {
                    debug!(converter = name.as_str(), "converter unavailable, trying next");
                    failures.push(format!("{name} is not available"));
                }
                Err(e) => {
                    warn!(converter = converter.name(), error = %e, "conversion failed, trying next");
                    failures.push(e.to_string());
                }
            }
        }
        Err(ConvertError::Exhausted(failures))
    }
}
