//! Typed failures callers may want to match on. Everything else travels as `anyhow::Error`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransmuteError {
    /// A configured step name has no registered implementation.
    #[error("step '{0}' is not available")]
    UnknownStep(String),

    /// An item lacks a key the engine cannot work without, or its value is unusable.
    #[error("malformed item {item}: missing or invalid '{key}'")]
    MalformedItem { item: String, key: &'static str },

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("settings file '{file}' not found in {dir}")]
    SettingsNotFound { file: String, dir: String },
}
