use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::engine::{EngineState, ExtractionReport, FeatureEngine};

/// Runs the engine over many URLs with a bounded number of requests in flight.
pub struct ConcurrentExtractor {
    engine: Arc<FeatureEngine>,
    semaphore: Arc<Semaphore>,
    completed: Arc<AtomicUsize>,
    failed: Arc<AtomicUsize>,
}

impl ConcurrentExtractor {
    pub fn new(engine: Arc<FeatureEngine>, concurrency: usize) -> Self {
        Self {
            engine,
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
            completed: Arc::new(AtomicUsize::new(0)),
            failed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Reports in input order. `on_done` is called as each URL finishes.
    pub async fn extract_all<F>(&self, urls: Vec<String>, on_done: F) -> Vec<ExtractionReport>
    where
        F: Fn(&ExtractionReport),
    {
        let mut futures = FuturesUnordered::new();
        for (idx, url) in urls.into_iter().enumerate() {
            let engine = self.engine.clone();
            let semaphore = self.semaphore.clone();
            futures.push(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                (idx, engine.extract(&url).await)
            });
        }

        let mut slots: Vec<Option<ExtractionReport>> = Vec::new();
        while let Some((idx, report)) = futures.next().await {
            match report.state {
                EngineState::Failed => self.failed.fetch_add(1, Ordering::Relaxed),
                _ => self.completed.fetch_add(1, Ordering::Relaxed),
            };
            on_done(&report);
            if slots.len() <= idx {
                slots.resize_with(idx + 1, || None);
            }
            slots[idx] = Some(report);
        }
        slots.into_iter().flatten().collect()
    }

    /// (completed, failed) so far.
    pub fn get_stats(&self) -> (usize, usize) {
        (
            self.completed.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed),
        )
    }
}
