//! Engine module: CLI surface, storage, reports, metadata and shared tools

pub mod arg_parser;
pub mod handlers;
pub mod metadata;
pub mod progress;
pub mod report;
pub mod storage;
pub mod tools;

// Re-export commonly used functions
pub use arg_parser::{Cli, Commands, RunArgs};
pub use handlers::{handle_command, handle_run, handle_sanity, handle_settings};
pub use metadata::{Metadata, Relation, initialize_metadata, write_metadata};
pub use report::{final_reports, write_paths_report};
pub use storage::{FsStorage, MemoryStorage, Storage, StoredItem};
pub use tools::{all_parents_for, fix_short_id, generate_uid, normalize_filename, path_relative_to};
