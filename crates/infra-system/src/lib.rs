// Verba Infrastructure - System Adapters
// Implements: WorkFactory, UnitOfWork (external pipeline commands)

pub mod command_work;
pub mod factory;
pub mod pipeline;
pub mod progress_line;

pub use command_work::CommandWork;
pub use factory::CommandWorkFactory;
pub use pipeline::{PipelineCommand, DEFAULT_ENV_ALLOWLIST};
pub use progress_line::parse_progress_line;
