use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

struct DefaultArgs;

impl DefaultArgs {
    pub const CONFIG_DIR: &'static str = ".";
}

/// Transform exported content items through a configurable chain of steps.
#[derive(Clone, Parser)]
#[command(name = "transmute")]
#[command(about = "Transform a content export into an importable tree.")]
pub struct Cli {
    /// Directory holding transmute.toml. Default: current directory.
    #[arg(long, global = true, value_name = "DIR", default_value = DefaultArgs::CONFIG_DIR)]
    pub config_dir: PathBuf,

    /// Verbose output (debug logging).
    #[arg(
        long,
        short = 'v',
        global = true,
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = clap::value_parser!(bool)
    )]
    pub verbose: Option<bool>,

    /// Hide the progress bar.
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Subcommand)]
pub enum Commands {
    /// Transform SRC into DST.
    Run(RunArgs),
    /// Report whether every configured step resolves to an implementation.
    Sanity,
    /// Print the merged settings.
    Settings,
}

#[derive(Clone, Args)]
pub struct RunArgs {
    /// Source export directory.
    #[arg(value_name = "SRC")]
    pub src: PathBuf,

    /// Destination directory.
    #[arg(value_name = "DST")]
    pub dst: PathBuf,

    /// Write the path transforms CSV report. Default: `config.report`.
    #[arg(
        long,
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = clap::value_parser!(bool)
    )]
    pub write_report: Option<bool>,

    /// Report location. Default: report_transmute.csv in the current directory.
    #[arg(long, value_name = "PATH")]
    pub report_path: Option<PathBuf>,

    /// Remove existing destination content before the run.
    #[arg(
        long,
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = clap::value_parser!(bool)
    )]
    pub clean_up: Option<bool>,

    /// Run without writing content or metadata; only the report is written.
    #[arg(long)]
    pub dry_run: bool,

    /// Log to `config.log_file` instead of the terminal.
    #[arg(long)]
    pub log_file: bool,
}

impl Cli {
    pub fn is_verbose(&self) -> bool {
        self.verbose.unwrap_or(false)
    }
}
