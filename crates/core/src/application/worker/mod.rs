// Worker Pool - fixed number of workers draining a bounded queue

pub mod constants;
mod panic_guard;
mod shutdown;

use constants::*;
pub use panic_guard::{run_isolated, PanicGuardResult};
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub workers: usize,
    pub queue_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl PoolConfig {
    pub fn new(workers: usize, queue_capacity: usize) -> Self {
        Self {
            workers,
            queue_capacity,
        }
    }

    /// Units admitted at once: one per worker plus the queue
    pub fn capacity(&self) -> usize {
        self.workers.max(1) + self.queue_capacity
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Worker pool at capacity ({capacity} units admitted)")]
    Full { capacity: usize },

    #[error("Worker pool is shutting down")]
    ShuttingDown,
}

/// Point-in-time pool occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    pub workers: usize,
    pub capacity: usize,
    pub running: usize,
    pub queued: usize,
}

struct QueuedUnit {
    work: BoxFuture<'static, ()>,
    // Released only after `work` finishes or is dropped
    _permit: OwnedSemaphorePermit,
}

/// Admission ticket. Holding one guarantees the unit will be queued.
///
/// Reserving before building the unit lets a caller react to rejection
/// without having created anything that must be cleaned up.
pub struct Slot {
    permit: OwnedSemaphorePermit,
    tx: mpsc::UnboundedSender<QueuedUnit>,
}

impl Slot {
    /// Queue `work`; fire-and-forget.
    ///
    /// # Errors
    /// `Undelivered` if every worker already exited. The unit comes back
    /// unrun and is dropped with it.
    pub fn dispatch<F>(self, work: F) -> Result<(), Undelivered>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let unit = QueuedUnit {
            work: Box::pin(work),
            _permit: self.permit,
        };
        self.tx
            .send(unit)
            .map_err(|mpsc::error::SendError(unit)| Undelivered(unit.work))
    }
}

/// A unit no worker was left to take
pub struct Undelivered(BoxFuture<'static, ()>);

impl Undelivered {
    pub fn error(&self) -> PoolError {
        PoolError::ShuttingDown
    }
}

impl From<Undelivered> for PoolError {
    fn from(undelivered: Undelivered) -> Self {
        undelivered.error()
    }
}

pub struct WorkerPool {
    config: PoolConfig,
    admission: Arc<Semaphore>,
    tx: Mutex<Option<mpsc::UnboundedSender<QueuedUnit>>>,
    shutdown_tx: ShutdownSender,
    handles: Mutex<Vec<JoinHandle<()>>>,
    running: Arc<AtomicUsize>,
}

impl WorkerPool {
    /// Spawn `config.workers` workers on the current tokio runtime
    pub fn start(config: PoolConfig) -> Self {
        let workers = config.workers.max(1);
        let (tx, rx) = mpsc::unbounded_channel();
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let (shutdown_tx, shutdown) = shutdown_channel();
        let running = Arc::new(AtomicUsize::new(0));

        let handles = (0..workers)
            .map(|worker| {
                tokio::spawn(worker_loop(
                    worker,
                    Arc::clone(&rx),
                    shutdown.clone(),
                    Arc::clone(&running),
                ))
            })
            .collect();

        info!(
            workers,
            queue_capacity = config.queue_capacity,
            "Worker pool started"
        );

        Self {
            config,
            admission: Arc::new(Semaphore::new(config.capacity())),
            tx: Mutex::new(Some(tx)),
            shutdown_tx,
            handles: Mutex::new(handles),
            running,
        }
    }

    pub fn config(&self) -> PoolConfig {
        self.config
    }

    /// Claim an admission slot without blocking.
    ///
    /// # Errors
    /// - `PoolError::Full` when `workers + queue_capacity` units are admitted
    /// - `PoolError::ShuttingDown` after `shutdown` started
    pub fn reserve(&self) -> Result<Slot, PoolError> {
        let tx = lock(&self.tx).clone().ok_or(PoolError::ShuttingDown)?;
        let permit = Arc::clone(&self.admission)
            .try_acquire_owned()
            .map_err(|err| match err {
                TryAcquireError::Closed => PoolError::ShuttingDown,
                TryAcquireError::NoPermits => PoolError::Full {
                    capacity: self.config.capacity(),
                },
            })?;
        Ok(Slot { permit, tx })
    }

    /// Reserve and dispatch in one step
    pub fn submit<F>(&self, work: F) -> Result<(), PoolError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.reserve()?.dispatch(work)?;
        Ok(())
    }

    pub fn stats(&self) -> PoolStats {
        let capacity = self.config.capacity();
        let admitted = capacity.saturating_sub(self.admission.available_permits());
        let running = self.running.load(Ordering::SeqCst).min(admitted);
        PoolStats {
            workers: self.config.workers.max(1),
            capacity,
            running,
            queued: admitted - running,
        }
    }

    /// Stop admission, let running units finish within `grace`, drop the queue.
    ///
    /// Units still running after `grace` are aborted. Dropped units are not
    /// run; their owners observe the drop (see `JobManager`).
    pub async fn shutdown(&self, grace: Duration) {
        self.admission.close();
        lock(&self.tx).take();
        self.shutdown_tx.shutdown();

        let mut handles = std::mem::take(&mut *lock(&self.handles));
        if handles.is_empty() {
            return;
        }

        info!(grace_ms = grace.as_millis() as u64, "Worker pool shutting down");
        let finished =
            tokio::time::timeout(grace, futures::future::join_all(handles.iter_mut())).await;
        match finished {
            Ok(_) => info!("Worker pool stopped"),
            Err(_) => {
                warn!(
                    running = self.running.load(Ordering::SeqCst),
                    "Shutdown grace elapsed, abandoning running units"
                );
                let pending: Vec<_> = handles.into_iter().filter(|h| !h.is_finished()).collect();
                for handle in &pending {
                    handle.abort();
                }
                // aborted tasks drop their units before the handles resolve
                futures::future::join_all(pending).await;
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown_tx.shutdown();
    }
}

async fn worker_loop(
    worker: usize,
    rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<QueuedUnit>>>,
    mut shutdown: ShutdownToken,
    running: Arc<AtomicUsize>,
) {
    debug!(worker, "Worker started");
    loop {
        let next = {
            let mut rx = rx.lock().await;
            tokio::select! {
                biased;
                _ = shutdown.wait() => None,
                unit = rx.recv() => unit,
            }
        };
        let Some(unit) = next else {
            break;
        };

        running.fetch_add(1, Ordering::SeqCst);
        let QueuedUnit {
            work,
            _permit: permit,
        } = unit;
        if let Err(payload) = AssertUnwindSafe(work).catch_unwind().await {
            error!(
                worker,
                panic_msg = %panic_guard::panic_message(payload),
                "Unit panicked, worker continues"
            );
        }
        running.fetch_sub(1, Ordering::SeqCst);
        drop(permit);
    }
    debug!(worker, "Worker stopped");
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_submit_runs_work() {
        let pool = WorkerPool::start(PoolConfig::new(2, 4));
        let (tx, rx) = oneshot::channel();
        pool.submit(async move {
            let _ = tx.send(7);
        })
        .unwrap();
        assert_eq!(rx.await.unwrap(), 7);
        pool.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_rejects_beyond_capacity() {
        let pool = WorkerPool::start(PoolConfig::new(1, 1));
        let gate = Arc::new(Semaphore::new(0));
        for _ in 0..2 {
            let gate = Arc::clone(&gate);
            pool.submit(async move {
                let _ = gate.acquire().await;
            })
            .unwrap();
        }
        assert_eq!(
            pool.submit(async {}).unwrap_err(),
            PoolError::Full { capacity: 2 }
        );
        gate.add_permits(2);
        pool.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_permit_released_after_completion() {
        let pool = WorkerPool::start(PoolConfig::new(1, 0));
        let (tx, rx) = oneshot::channel::<()>();
        let (done_tx, done_rx) = oneshot::channel();
        pool.submit(async move {
            let _ = rx.await;
            let _ = done_tx.send(());
        })
        .unwrap();
        assert!(pool.reserve().is_err());

        tx.send(()).unwrap();
        done_rx.await.unwrap();
        // permit drops right after the unit returns
        tokio::time::timeout(Duration::from_secs(1), async {
            while pool.reserve().is_err() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        pool.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_workers_run_concurrently() {
        let pool = WorkerPool::start(PoolConfig::new(3, 0));
        let started = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Semaphore::new(0));
        for _ in 0..3 {
            let started = Arc::clone(&started);
            let gate = Arc::clone(&gate);
            pool.submit(async move {
                started.fetch_add(1, Ordering::SeqCst);
                let _ = gate.acquire().await;
            })
            .unwrap();
        }
        tokio::time::timeout(Duration::from_secs(1), async {
            while started.load(Ordering::SeqCst) < 3 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert_eq!(pool.stats().running, 3);
        gate.add_permits(3);
        pool.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_admission_and_drops_queue() {
        struct DropFlag(Arc<AtomicUsize>);
        impl Drop for DropFlag {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let pool = WorkerPool::start(PoolConfig::new(1, 2));
        let (started_tx, started_rx) = oneshot::channel();
        let gate = Arc::new(Semaphore::new(0));
        let worker_gate = Arc::clone(&gate);
        pool.submit(async move {
            let _ = started_tx.send(());
            let _ = worker_gate.acquire().await;
        })
        .unwrap();
        started_rx.await.unwrap();

        let dropped = Arc::new(AtomicUsize::new(0));
        let ran = Arc::new(AtomicUsize::new(0));
        let flag = DropFlag(Arc::clone(&dropped));
        let ran_clone = Arc::clone(&ran);
        pool.submit(async move {
            let _flag = flag;
            ran_clone.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        let release = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            gate.add_permits(1);
        });
        pool.shutdown(Duration::from_secs(2)).await;
        release.await.unwrap();

        assert_eq!(pool.submit(async {}).unwrap_err(), PoolError::ShuttingDown);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(dropped.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_slot_outliving_workers_hands_unit_back() {
        let pool = WorkerPool::start(PoolConfig::new(1, 1));
        let slot = pool.reserve().unwrap();
        pool.shutdown(Duration::from_secs(1)).await;

        let ran = Arc::new(AtomicUsize::new(0));
        let ran_clone = Arc::clone(&ran);
        let undelivered = slot
            .dispatch(async move {
                ran_clone.fetch_add(1, Ordering::SeqCst);
            })
            .err()
            .unwrap();
        assert_eq!(undelivered.error(), PoolError::ShuttingDown);
        drop(undelivered);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_panicking_unit_does_not_kill_worker() {
        let pool = WorkerPool::start(PoolConfig::new(1, 4));
        pool.submit(async {
            panic!("codec exploded");
        })
        .unwrap();
        let (tx, rx) = oneshot::channel();
        pool.submit(async move {
            let _ = tx.send(true);
        })
        .unwrap();

        let ran = tokio::time::timeout(Duration::from_secs(2), rx)
            .await
            .unwrap()
            .unwrap();
        assert!(ran);
        assert_eq!(pool.stats().running, 0);
        assert!(pool.submit(async {}).is_ok());
        pool.shutdown(Duration::from_secs(1)).await;
    }

    #[test]
    fn test_capacity_counts_at_least_one_worker() {
        assert_eq!(PoolConfig::new(0, 0).capacity(), 1);
        assert_eq!(PoolConfig::default().capacity(), 35);
    }
}
