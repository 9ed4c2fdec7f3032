//! Path transforms report (CSV) and the final state summary.

use anyhow::{Context, Result};
use log::info;
use std::path::{Path, PathBuf};

use crate::engine::tools::sort_by_value;
use crate::pipeline::RunState;
use crate::utils::config::PackagePaths;
use crate::{Opts, ReportRow};

/// Report location: `opts.report_path`, else `report_transmute.csv` in the working directory.
pub fn report_path(opts: &Opts) -> PathBuf {
    opts.report_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(PackagePaths::get().report_filename()))
}

/// Write one CSV row per report row, header first.
pub fn write_paths_report(rows: &[ReportRow], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("create {}", path.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Log converted totals per type and drops per step, largest first.
pub fn log_final_state(state: &RunState) {
    info!("Converted");
    info!("  - Total: {}", state.seen.len());
    for (name, total) in sort_by_value(&state.exported) {
        info!("   - {name}: {total}");
    }
    info!("Dropped by step");
    for (name, total) in sort_by_value(&state.dropped) {
        info!("  - {name}: {total}");
    }
}

/// Write the CSV report when requested and log the summary in debug mode.
/// Returns the report path when one was written.
pub fn final_reports(state: &RunState, opts: &Opts, is_debug: bool) -> Result<Option<PathBuf>> {
    let written = if opts.write_report {
        let path = report_path(opts);
        write_paths_report(&state.path_transforms, &path)?;
        info!(" - Wrote paths report to {}", path.display());
        Some(path)
    } else {
        None
    };
    if is_debug {
        log_final_state(state);
    }
    Ok(written)
}
