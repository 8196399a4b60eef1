//! Command-line interface. Flags override the environment configuration for
//! a single run.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};

use estate_core::importer::{ChunkFailurePolicy, ImportKind, ImportOptions};

use crate::config::WorkerConfig;

#[derive(Debug, Parser)]
#[command(
    name = "estate-worker",
    version,
    about = "Import rental properties and buildings from CRM exports"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Import a CSV or JSON export.
    Import(ImportArgs),
    /// Copy building property types onto the properties that reference them.
    Reconcile,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// What the file contains.
    #[arg(value_enum)]
    pub kind: KindArg,

    /// Path to the export file.
    pub file: PathBuf,

    /// Input format; inferred from the file extension when omitted.
    #[arg(long, value_enum)]
    pub format: Option<InputFormat>,

    /// Rows per bulk insert (1-1000).
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Isolate rejected rows by splitting failed chunks instead of skipping
    /// them whole.
    #[arg(long)]
    pub bisect: bool,

    /// Do not reconcile property types after a building import.
    #[arg(long)]
    pub no_reconcile: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Properties,
    Buildings,
}

impl From<KindArg> for ImportKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Properties => ImportKind::Properties,
            KindArg::Buildings => ImportKind::Buildings,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InputFormat {
    Csv,
    Json,
}

impl InputFormat {
    /// Guess the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

impl ImportArgs {
    /// Explicit `--format`, else the file extension.
    pub fn resolved_format(&self) -> Option<InputFormat> {
        self.format.or_else(|| InputFormat::from_path(&self.file))
    }

    /// Import options after applying flag overrides to `config`.
    pub fn import_options(&self, config: &WorkerConfig) -> ImportOptions {
        ImportOptions {
            chunk_size: self.chunk_size.unwrap_or(config.import.chunk_size),
            chunk_failure: if self.bisect {
                ChunkFailurePolicy::Bisect
            } else {
                config.import.chunk_failure
            },
        }
    }

    pub fn reconcile(&self, config: &WorkerConfig) -> bool {
        !self.no_reconcile && config.reconcile_after_building_import
    }
}
