//! Batch rendering
//!
//! Existing outputs are never overwritten: a template whose output is already
//! present is reported `skipped`. Render into a fresh directory to regenerate.
//! Two concurrent batches over the same output directory race on that check.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::context::Context;
use crate::convert::{ConverterChain, PdfConverter};
use crate::docx::fill_docx;
use crate::registry::{Template, TemplateRegistry};
use crate::report::{write_report, GenerationReport, ReportEntry, Status};
use crate::RenderError;

/// Appended to the template stem to name outputs
pub const OUTPUT_SUFFIX: &str = "_generated";

/// Snapshot passed to the progress callback after each unit of work
#[derive(Debug)]
pub struct Progress<'a> {
    pub processed: usize,
    pub total: usize,
    pub template: &'a str,
    pub entry: &'a ReportEntry,
}

pub struct Renderer {
    registry: TemplateRegistry,
    converter: Box<dyn PdfConverter>,
    suffix: String,
}

impl Renderer {
    /// Renderer using the default converter chain
    pub fn new(registry: TemplateRegistry) -> Self {
        Self::with_converter(registry, ConverterChain::default())
    }

    pub fn with_converter(registry: TemplateRegistry, converter: impl PdfConverter + 'static) -> Self {
        Self {
            registry,
            converter: Box::new(converter),
            suffix: OUTPUT_SUFFIX.to_string(),
        }
    }

    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    /// Output paths for a template: the Word document and its PDF
    pub fn output_paths(&self, template: &Template, out_dir: &Path) -> (PathBuf, PathBuf) {
        let base = format!("{}{}", template.stem(), self.suffix);
        (
            out_dir.join(format!("{base}.docx")),
            out_dir.join(format!("{base}.pdf")),
        )
    }

    pub fn render(
        &self,
        context: &Context,
        out_dir: &Path,
        convert: bool,
    ) -> Result<GenerationReport, RenderError> {
        self.render_with_progress(context, out_dir, convert, |_| {})
    }

    /// Render every template, reporting progress after each document and
    /// each conversion.
    ///
    /// Per-template failures land in the report; only failing to create the
    /// output directory or to write the report aborts the batch.
    pub fn render_with_progress<F>(
        &self,
        context: &Context,
        out_dir: &Path,
        convert: bool,
        mut progress: F,
    ) -> Result<GenerationReport, RenderError>
    where
        F: FnMut(&Progress<'_>),
    {
        fs::create_dir_all(out_dir).map_err(|e| RenderError::io(out_dir, e))?;

        let steps = if convert { 2 } else { 1 };
        let total = self.registry.len() * steps;
        let mut processed = 0;
        let mut entries = Vec::with_capacity(self.registry.len());

        for template in self.registry.templates() {
            let started = Instant::now();
            let (out_docx, out_pdf) = self.output_paths(template, out_dir);
            let mut entry = ReportEntry::new(template.name.clone(), out_docx.clone());

            if out_docx.exists() {
                debug!(template = %template.name, "output present, skipped");
                entry.status = Status::Skipped;
                entry.out_docx_size = file_size(&out_docx);
            } else {
                match render_document(template, context, &out_docx) {
                    Ok(size) => entry.out_docx_size = size,
                    Err(e) => {
                        warn!(template = %template.name, error = %e, "template failed");
                        entry.fail(Status::Error, e.to_string());
                    }
                }
            }
            entry.duration_seconds = started.elapsed().as_secs_f64();
            processed += 1;
            progress(&Progress { processed, total, template: &template.name, entry: &entry });

            if convert {
                entry.out_pdf = Some(out_pdf.clone());
                if entry.status != Status::Error {
                    self.convert_document(&out_docx, &out_pdf, &mut entry);
                }
                entry.duration_seconds = started.elapsed().as_secs_f64();
                processed += 1;
                progress(&Progress { processed, total, template: &template.name, entry: &entry });
            }

            entries.push(entry);
        }

        let report_path = write_report(out_dir, &entries)?;
        let report = GenerationReport { entries, report_path: Some(report_path) };
        info!(
            dir = %out_dir.display(),
            ok = report.count(Status::Ok),
            skipped = report.count(Status::Skipped),
            partial = report.count(Status::Partial),
            errors = report.count(Status::Error),
            "generation finished"
        );
        Ok(report)
    }

    fn convert_document(&self, docx: &Path, pdf: &Path, entry: &mut ReportEntry) {
        if pdf.exists() {
            debug!(pdf = %pdf.display(), "pdf present, not reconverted");
            return;
        }
        if let Err(e) = self.converter.convert(docx, pdf) {
            warn!(template = %entry.template, error = %e, "pdf conversion failed");
            entry.fail(Status::Partial, format!("pdf conversion failed: {e}"));
        }
    }
}

fn render_document(template: &Template, context: &Context, out: &Path) -> Result<u64, RenderError> {
    let bytes = fs::read(&template.path).map_err(|e| RenderError::io(&template.path, e))?;
    let filled = fill_docx(&bytes, context)?;
    fs::write(out, &filled).map_err(|e| RenderError::io(out, e))?;
    Ok(filled.len() as u64)
}

fn file_size(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outputs_use_stem_and_suffix() {
        let registry = TemplateRegistry::from_paths([PathBuf::from("/t/Statuts SARL.docx")]);
        let renderer = Renderer::new(registry);
        let (docx, pdf) = renderer.output_paths(&renderer.registry().templates()[0], Path::new("/out"));
        assert_eq!(docx, PathBuf::from("/out/Statuts SARL_generated.docx"));
        assert_eq!(pdf, PathBuf::from("/out/Statuts SARL_generated.pdf"));
    }

    #[test]
    fn empty_registry_writes_empty_report() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = Renderer::new(TemplateRegistry::default());
        let report = renderer.render(&Context::default(), dir.path(), true).unwrap();
        assert!(report.entries.is_empty());
        assert!(dir.path().join(crate::REPORT_FILE).is_file());
    }
}
