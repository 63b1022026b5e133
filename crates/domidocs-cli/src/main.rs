//! domidocs CLI - record store and document generation
//!
//! Command-line surface over the workbook store, the schema migrator and the
//! template renderer. Machine-readable output (ids, records, reports) goes to
//! stdout as JSON; logs go to stderr.

mod commands;
mod config;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use domidocs_core::Table;
use domidocs_store::TieBreak;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "domidocs")]
#[command(author, version, about = "Domiciliation records and legal document generation", long_about = None)]
struct Cli {
    /// Verbose output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file (default: ./domidocs.toml when present)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Workbook path, overriding [store] path
    #[arg(short, long, global = true, env = "DOMIDOCS_WORKBOOK", value_name = "XLSX")]
    workbook: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the workbook and any missing canonical sheet
    Init,

    /// Append a company form (JSON with societe, associes, contrat)
    Save {
        /// Form file, `-` for stdin
        #[arg(short, long, value_name = "JSON")]
        input: PathBuf,
    },

    /// Fold legacy sheets into the canonical ones
    Migrate {
        /// Minimum share of a legacy sheet's columns that must match
        #[arg(long, value_name = "RATIO")]
        threshold: Option<f64>,

        /// What to do when two tables match equally well
        #[arg(long, value_enum)]
        tie_break: Option<TieBreakArg>,
    },

    /// Print the rows of a table as JSON
    Show {
        /// societes, associes or contrats
        #[arg(value_name = "TABLE")]
        table: Table,
    },

    /// Fill templates from a context file
    Render {
        /// Context JSON (flat or nested)
        #[arg(long, value_name = "JSON")]
        context: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Fill templates for a stored company
    Generate {
        /// ID_SOCIETE of the company
        #[arg(long, value_name = "ID")]
        company: i64,

        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Args, Debug)]
pub(crate) struct OutputArgs {
    /// Template directory, overriding [render] templates_dir
    #[arg(long, value_name = "DIR", conflicts_with = "template")]
    templates: Option<PathBuf>,

    /// Template file; repeat to render several in order
    #[arg(long, value_name = "DOCX")]
    template: Vec<PathBuf>,

    /// Output directory, overriding [render] output_dir
    #[arg(short, long, value_name = "DIR")]
    out: Option<PathBuf>,

    /// Also convert each document to PDF
    #[arg(long)]
    pdf: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TieBreakArg {
    /// First table in declaration order wins
    First,
    /// Leave the sheet in place
    Skip,
}

impl From<TieBreakArg> for TieBreak {
    fn from(arg: TieBreakArg) -> Self {
        match arg {
            TieBreakArg::First => TieBreak::First,
            TieBreakArg::Skip => TieBreak::Skip,
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(workbook) = cli.workbook {
        config.store.path = workbook;
    }

    match cli.command {
        Commands::Init => commands::init(&config),
        Commands::Save { input } => commands::save(&config, &input),
        Commands::Migrate { threshold, tie_break } => {
            if let Some(threshold) = threshold {
                anyhow::ensure!(
                    threshold > 0.0 && threshold <= 1.0,
                    "--threshold must be in (0, 1], got {threshold}"
                );
                config.migration.threshold = threshold;
            }
            if let Some(tie_break) = tie_break {
                config.migration.tie_break = tie_break.into();
            }
            commands::migrate(&config)
        }
        Commands::Show { table } => commands::show(&config, table),
        Commands::Render { context, output } => {
            let context = commands::read_context(&context)?;
            commands::render(&config, &context, &output)
        }
        Commands::Generate { company, output } => commands::generate(&config, company, &output),
    }
}
