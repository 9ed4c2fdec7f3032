pub mod config;
pub mod logger;
pub mod transmute_toml;

pub use config::*;
pub use logger::setup_logging;
pub use transmute_toml::{load_settings, merge_tables, settings_path};
