//! In-flight request deduplication cache.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::dedup::fingerprint::Fingerprint;
use crate::error::{ApiError, ErrorKind};
use crate::http::Response;
use crate::observability::metrics;

/// Final outcome of a logical request.
pub type SharedResult = Result<Response, ApiError>;

/// A cloneable handle on an in-flight request's outcome.
pub type SharedOutcome = Shared<BoxFuture<'static, SharedResult>>;

struct PendingEntry {
    future: SharedOutcome,
    inserted_at: Instant,
    generation: u64,
}

/// Holds in-flight request futures keyed by fingerprint.
///
/// Cloning yields another handle on the same map. The underlying call runs
/// on its own task, so a caller dropping its handle never cancels work that
/// other callers are still awaiting.
#[derive(Clone)]
pub struct DedupCache {
    inner: Arc<DashMap<Fingerprint, PendingEntry>>,
    generations: Arc<AtomicU64>,
    ttl: Duration,
}

impl DedupCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            generations: Arc::new(AtomicU64::new(0)),
            ttl,
        }
    }

    /// Join the live entry for `fingerprint`, or start `factory` and store it.
    ///
    /// The check and the insert happen under one entry lock with no await in
    /// between, so at most one live entry exists per fingerprint. Must be
    /// called from within a Tokio runtime.
    pub fn acquire<F, Fut>(&self, fingerprint: Fingerprint, factory: F) -> SharedOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SharedResult> + Send + 'static,
    {
        self.sweep();
        let now = Instant::now();

        match self.inner.entry(fingerprint.clone()) {
            Entry::Occupied(entry) if now.duration_since(entry.get().inserted_at) < self.ttl => {
                metrics::record_dedup_hit();
                tracing::debug!(fingerprint = %fingerprint, "Joining in-flight request");
                entry.get().future.clone()
            }
            entry => {
                let generation = self.generations.fetch_add(1, Ordering::Relaxed);
                let future = self.spawn(fingerprint.clone(), generation, factory());
                entry.insert(PendingEntry {
                    future: future.clone(),
                    inserted_at: now,
                    generation,
                });
                tracing::debug!(fingerprint = %fingerprint, "Started deduplicated request");
                future
            }
        }
    }

    /// Remove the entry so the next caller issues a fresh call.
    pub fn release(&self, fingerprint: &Fingerprint) {
        self.inner.remove(fingerprint);
    }

    /// Drop entries older than the TTL.
    pub fn sweep(&self) {
        let now = Instant::now();
        self.inner
            .retain(|_, entry| now.duration_since(entry.inserted_at) < self.ttl);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.inner.contains_key(fingerprint)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn spawn<Fut>(&self, fingerprint: Fingerprint, generation: u64, work: Fut) -> SharedOutcome
    where
        Fut: Future<Output = SharedResult> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let outcome = work.await;
            // Release on settle, but never an entry that replaced ours after expiry.
            inner.remove_if(&fingerprint, |_, entry| entry.generation == generation);
            outcome
        });

        async move {
            handle.await.unwrap_or_else(|e| {
                Err(ApiError::new(
                    ErrorKind::Internal,
                    "INTERNAL",
                    format!("deduplicated request task failed: {}", e),
                ))
            })
        }
        .boxed()
        .shared()
    }
}
