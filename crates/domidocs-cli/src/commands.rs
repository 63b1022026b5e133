//! Subcommand handlers

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context as _, Result};
use domidocs_core::{build_context, FormBatch, Schema, Table};
use domidocs_render::{
    Context, GenerationReport, Renderer, Status, TemplateRegistry, TemplateSource,
};
use domidocs_store::{migrate_workbook, WorkbookStore};
use serde::Serialize;
use tracing::info;

use crate::config::Config;
use crate::OutputArgs;

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn open_store(config: &Config) -> Result<WorkbookStore> {
    WorkbookStore::new(&config.store.path).context("Invalid field mapping")
}

pub fn init(config: &Config) -> Result<ExitCode> {
    let store = open_store(config)?;
    let changed = store
        .ensure_schema()
        .with_context(|| format!("Failed to prepare {}", store.path().display()))?;
    if changed {
        println!("Created: {}", store.path().display());
    } else {
        println!("Up to date: {}", store.path().display());
    }
    Ok(ExitCode::SUCCESS)
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        io::stdin().read_to_string(&mut text).context("Failed to read stdin")?;
        Ok(text)
    } else {
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
    }
}

pub fn save(config: &Config, input: &Path) -> Result<ExitCode> {
    let batch: FormBatch = serde_json::from_str(&read_input(input)?)
        .with_context(|| format!("Invalid form JSON in {}", input.display()))?;
    let store = open_store(config)?;
    let outcome = store
        .write_records(&batch)
        .with_context(|| format!("Failed to save records to {}", store.path().display()))?;
    for issue in &outcome.cosmetic {
        eprintln!("warning: {}: {}", issue.sheet, issue.message);
    }
    print_json(&outcome)?;
    Ok(ExitCode::SUCCESS)
}

pub fn migrate(config: &Config) -> Result<ExitCode> {
    let path = &config.store.path;
    let report = migrate_workbook(path, &Schema::canonical(), &config.migration)
        .with_context(|| format!("Failed to migrate {}", path.display()))?;
    print_json(&report)?;
    Ok(ExitCode::SUCCESS)
}

pub fn show(config: &Config, table: Table) -> Result<ExitCode> {
    let store = open_store(config)?;
    let records = store
        .read_table(table)
        .with_context(|| format!("Failed to read {}", table.sheet_name()))?;
    print_json(&records)?;
    Ok(ExitCode::SUCCESS)
}

pub fn read_context(path: &Path) -> Result<Context> {
    let value: serde_json::Value = serde_json::from_str(&read_input(path)?)
        .with_context(|| format!("Invalid context JSON in {}", path.display()))?;
    Ok(Context::new(value))
}

pub fn render(config: &Config, context: &Context, output: &OutputArgs) -> Result<ExitCode> {
    let source = if output.template.is_empty() {
        TemplateSource::Directory(
            output
                .templates
                .clone()
                .unwrap_or_else(|| config.render.templates_dir.clone()),
        )
    } else {
        TemplateSource::Files(output.template.clone())
    };
    let registry = TemplateRegistry::from_source(&source).context("Failed to load templates")?;
    if registry.is_empty() {
        bail!("No templates found");
    }

    let out_dir: PathBuf = output
        .out
        .clone()
        .unwrap_or_else(|| config.render.output_dir.clone());
    let convert = output.pdf || config.render.convert_pdf;

    let renderer = Renderer::new(registry);
    let report = renderer
        .render_with_progress(context, &out_dir, convert, |p| {
            info!(
                processed = p.processed,
                total = p.total,
                template = p.template,
                status = %p.entry.status,
                "progress"
            );
        })
        .with_context(|| format!("Failed to render into {}", out_dir.display()))?;

    print_summary(&report);
    Ok(if report.has_errors() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn print_summary(report: &GenerationReport) {
    for entry in &report.entries {
        match &entry.error {
            Some(error) => println!("{:>8}  {}  ({error})", entry.status, entry.template),
            None => println!("{:>8}  {}", entry.status, entry.template),
        }
    }
    println!(
        "{} ok, {} skipped, {} partial, {} error",
        report.count(Status::Ok),
        report.count(Status::Skipped),
        report.count(Status::Partial),
        report.count(Status::Error)
    );
    if let Some(path) = &report.report_path {
        println!("Report: {}", path.display());
    }
}

pub fn generate(config: &Config, company: i64, output: &OutputArgs) -> Result<ExitCode> {
    let store = open_store(config)?;
    let Some(bundle) = store
        .company_bundle(company)
        .with_context(|| format!("Failed to read {}", store.path().display()))?
    else {
        bail!("No company with ID_SOCIETE {company}");
    };
    let context = build_context(
        store.fields(),
        &bundle.company,
        &bundle.associates,
        bundle.contract.as_ref(),
    );
    render(config, &Context::new(context), output)
}
