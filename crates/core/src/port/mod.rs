// Port Layer - Interfaces for external dependencies

pub mod id_provider; // For deterministic testing
pub mod time_provider;
pub mod unit_of_work;
pub mod work_factory;

// Re-exports
pub use id_provider::{IdProvider, UuidProvider};
pub use time_provider::{SystemTimeProvider, TimeProvider};
pub use unit_of_work::{work_fn, FnWork, ProgressReporter, UnitOfWork, WorkResult};
pub use work_factory::WorkFactory;
