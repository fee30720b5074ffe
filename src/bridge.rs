use anyhow::{anyhow, Context};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Runs blocking calls (TLS handshakes, DNS, WHOIS) off the async workers.
///
/// At most `workers` calls execute at once; further submissions wait for a permit,
/// so callers may await any number of handles without deadlock.
pub struct BlockingBridge {
    semaphore: Arc<Semaphore>,
    workers: usize,
    completed: Arc<AtomicUsize>,
    errors: Arc<AtomicUsize>,
}

impl BlockingBridge {
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(workers)),
            workers,
            completed: Arc::new(AtomicUsize::new(0)),
            errors: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub async fn run<T, F>(&self, call: F) -> anyhow::Result<T>
    where
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .context("blocking bridge closed")?;

        // The permit moves into the worker so it is held until the call itself returns,
        // even if the awaiting side gave up.
        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            call()
        });

        let result = match handle.await {
            Ok(res) => res,
            Err(e) => Err(anyhow!("blocking call aborted: {}", e)),
        };
        match &result {
            Ok(_) => self.completed.fetch_add(1, Ordering::Relaxed),
            Err(_) => self.errors.fetch_add(1, Ordering::Relaxed),
        };
        result
    }

    /// Like `run`, bounded by `timeout` including time spent waiting for a worker.
    pub async fn run_with_timeout<T, F>(&self, timeout: Duration, call: F) -> anyhow::Result<T>
    where
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        match tokio::time::timeout(timeout, self.run(call)).await {
            Ok(res) => res,
            Err(_) => Err(anyhow!("blocking call timed out after {:?}", timeout)),
        }
    }

    /// Calls currently holding a worker.
    pub fn in_flight(&self) -> usize {
        self.workers - self.semaphore.available_permits()
    }

    pub fn get_stats(&self) -> (usize, usize) {
        (
            self.completed.load(Ordering::Relaxed),
            self.errors.load(Ordering::Relaxed),
        )
    }
}
