//! Pipeline components: source reading, step chaining, run state and orchestration.

pub mod drop_registry;
pub mod orchestrator;
pub mod post_process;
pub mod reader;
pub mod runner;
pub mod state;
pub(crate) mod step_runner;
pub mod walk;

pub use drop_registry::DropRegistry;
pub use orchestrator::Orchestrator;
pub use post_process::post_process;
pub use reader::{ReaderHandles, read_source_item, spawn_source_reader};
pub use runner::{PipelineRun, Terminal};
pub use state::RunState;
pub use walk::discover_source_files;
