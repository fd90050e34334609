// Worker constants (no magic values)
use std::time::Duration;

/// Concurrent units of work (bounds CPU/GPU contention on transcription)
pub const DEFAULT_WORKERS: usize = 3;

/// Units allowed to wait for a free worker before submissions are rejected
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// How long shutdown waits for running units before abandoning them
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Fallback poll interval for progress publishers
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// "Recent jobs" listing size when the caller gives no limit
pub const DEFAULT_RECENT_LIMIT: usize = 10;

/// Hard cap on a single listing
pub const MAX_RECENT_LIMIT: usize = 1000;

/// Retries when the ID provider returns an ID already in the registry
pub const MAX_ID_ATTEMPTS: usize = 16;
