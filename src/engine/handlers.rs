//! Command handlers for run, sanity and settings

use anyhow::{Context, Result};
use colored::Colorize;
use log::{debug, info, warn};
use std::path::PathBuf;

use crate::Opts;
use crate::engine::arg_parser::{Cli, Commands, RunArgs};
use crate::run::transmute_dir_with;
use crate::settings::Settings;
use crate::steps::StepRegistry;
use crate::utils::config::PackagePaths;
use crate::utils::setup_logging;
use crate::utils::transmute_toml::load_settings;

/// Dispatch the parsed command line.
pub fn handle_command(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Run(args) => handle_run(cli, args),
        Commands::Sanity => handle_sanity(cli),
        Commands::Settings => handle_settings(cli),
    }
}

fn setup_opts(cli: &Cli, args: &RunArgs, settings: &Settings) -> Opts {
    Opts {
        write_report: args.write_report.unwrap_or(settings.config.report),
        report_path: args.report_path.clone(),
        clean_up: args.clean_up.unwrap_or(false),
        dry_run: args.dry_run,
        progress: !cli.quiet && !args.log_file,
    }
}

/// Run a full transformation of SRC into DST.
pub fn handle_run(cli: &Cli, args: &RunArgs) -> Result<()> {
    let settings = load_settings(&cli.config_dir)?;
    let log_file = args.log_file.then(|| match settings.config.log_file.as_str() {
        "" => PathBuf::from(PackagePaths::get().log_filename()),
        configured => PathBuf::from(configured),
    });
    setup_logging(
        cli.is_verbose() || settings.is_debug(),
        log_file.as_deref(),
    )?;
    if let Some(path) = &settings.config.filepath {
        debug!("Settings loaded from {}", path.display());
    }
    let opts = setup_opts(cli, args, &settings);
    if opts.dry_run {
        warn!("RUNNING IN DRY-RUN MODE. NO CONTENT OR METADATA WILL BE WRITTEN.");
    }
    let registry = StepRegistry::builtin();
    let summary = transmute_dir_with(&args.src, &args.dst, &opts, &settings, &registry)?;
    info!(
        "Processed {} of {} items: {} exported, {} dropped",
        summary.processed, summary.total, summary.exported, summary.dropped
    );
    if let Some(path) = summary.metadata_file {
        info!("Metadata: {}", path.display());
    }
    Ok(())
}

/// Print the resolution status of every configured step. Fails if any is unresolved.
pub fn handle_sanity(cli: &Cli) -> Result<()> {
    setup_logging(cli.is_verbose(), None)?;
    let settings = load_settings(&cli.config_dir)?;
    let registry = StepRegistry::builtin();
    let status = registry.check(&settings.pipeline.steps);
    println!("{}", "Pipeline steps".bold());
    for (name, resolved) in &status {
        let marker = if *resolved { "✅" } else { "❗" };
        println!(" - {name}: {marker}");
    }
    let missing: Vec<&str> = status
        .iter()
        .filter(|(_, resolved)| !resolved)
        .map(|(name, _)| name.as_str())
        .collect();
    if !missing.is_empty() {
        anyhow::bail!("unresolved steps: {}", missing.join(", "));
    }
    Ok(())
}

/// Print the merged settings as TOML.
pub fn handle_settings(cli: &Cli) -> Result<()> {
    setup_logging(cli.is_verbose(), None)?;
    let settings = load_settings(&cli.config_dir)?;
    if let Some(path) = &settings.config.filepath {
        println!("# {}", path.display());
    }
    let raw = toml::to_string_pretty(&settings.raw).context("serialize settings")?;
    println!("{raw}");
    Ok(())
}
