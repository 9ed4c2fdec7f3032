//! Transmute: content-migration pipeline turning exported items into an importable tree

pub mod engine;
pub mod error;
pub mod pipeline;
pub mod run;
pub mod settings;
pub mod steps;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use types::*;

pub use error::TransmuteError;
pub use settings::Settings;
pub use steps::{Step, StepOutput, StepRegistry};

use log::debug;
use std::path::Path;

/// Result alias used by public transmute API
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Single entry point: transform the export at `src` into `dst` with the built-in steps.
///
/// Use [`run::transmute_dir_with`] to run with a registry that carries extra steps.
pub fn transmute_dir(
    src: &Path,
    dst: &Path,
    opts: &Opts,
    settings: &Settings,
) -> Result<RunSummary> {
    debug!(
        "{} CONFIG:{:#?}",
        env!("CARGO_PKG_NAME").to_uppercase(),
        opts
    );
    run::transmute_dir_with(src, dst, opts, settings, &StepRegistry::builtin())
}
