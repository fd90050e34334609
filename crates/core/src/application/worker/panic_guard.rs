// Panic isolation for worker safety
// A unit of work runs in its own task; a panic there surfaces as a JoinError
// instead of unwinding through the worker loop.

use std::any::Any;
use std::future::Future;
use tokio::task::JoinHandle;
use tracing::error;

/// Result of a panic-guarded execution
#[derive(Debug)]
pub enum PanicGuardResult<T> {
    /// Execution completed
    Completed(T),
    /// Execution panicked
    Panicked(String),
    /// Task was cancelled by the runtime (shutdown)
    Aborted,
}

// Dropping the guard aborts the inner task, so abandoning the caller
// never leaves an orphaned unit running.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Run a future with panic isolation
pub async fn run_isolated<F, T>(future: F) -> PanicGuardResult<T>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let mut task = AbortOnDrop(tokio::spawn(future));
    match (&mut task.0).await {
        Ok(value) => PanicGuardResult::Completed(value),
        Err(join_err) if join_err.is_panic() => {
            let panic_msg = panic_message(join_err.into_panic());
            error!(panic_msg = %panic_msg, "Unit of work panicked");
            PanicGuardResult::Panicked(panic_msg)
        }
        Err(_) => PanicGuardResult::Aborted,
    }
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
