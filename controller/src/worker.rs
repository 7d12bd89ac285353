use std::error::Error as StdError;
use std::sync::Arc;

use crate::cache::ClaimCache;
use crate::key::QueueKey;
use crate::queue::WorkQueue;
use crate::reconciler::{Reconciler, Retryable};

/// Process-wide sink for failures that are given up on.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, key: &QueueKey, error: &(dyn StdError + 'static));
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, key: &QueueKey, error: &(dyn StdError + 'static)) {
        let mut message = error.to_string();
        let mut source = error.source();
        while let Some(err) = source {
            message.push_str(": ");
            message.push_str(&err.to_string());
            source = err.source();
        }
        tracing::error!(%key, "Dropping key after error: {message}");
    }
}

/// Drains the queue, resolving keys against the claim cache and handing them
/// to the reconciler.
pub struct Worker<C, R, E = TracingReporter> {
    queue: WorkQueue<QueueKey>,
    cache: C,
    reconciler: R,
    reporter: E,
    max_attempts: u32,
}

impl<C, R> Worker<C, R> {
    pub fn new(queue: WorkQueue<QueueKey>, cache: C, reconciler: R, max_attempts: u32) -> Self {
        Self {
            queue,
            cache,
            reconciler,
            reporter: TracingReporter,
            max_attempts,
        }
    }
}

impl<C, R, E> Worker<C, R, E>
where
    C: ClaimCache,
    R: Reconciler,
    E: ErrorReporter,
{
    pub fn reporter<E2: ErrorReporter>(self, reporter: E2) -> Worker<C, R, E2> {
        Worker {
            queue: self.queue,
            cache: self.cache,
            reconciler: self.reconciler,
            reporter,
            max_attempts: self.max_attempts,
        }
    }

    pub fn queue(&self) -> &WorkQueue<QueueKey> {
        &self.queue
    }

    /// Processes one key. Returns `false` once the queue has shut down.
    pub async fn process_next_item(&self) -> bool {
        let Some(key) = self.queue.get().await else {
            return false;
        };
        self.process(&key).await;
        self.queue.done(key).await;
        true
    }

    #[tracing::instrument(skip_all, fields(%key))]
    async fn process(&self, key: &QueueKey) {
        let claim = match self.cache.get_by_key(key) {
            Ok(claim) => claim,
            Err(err) => {
                self.retry_or_drop(key, &err).await;
                return;
            }
        };
        let result = match claim {
            Some(claim) => {
                tracing::debug!("Claim create or update detected");
                self.reconciler.apply(&claim).await
            }
            None => {
                tracing::debug!("Claim delete detected");
                self.reconciler.cleanup(key).await
            }
        };
        match result {
            Ok(outcome) => {
                tracing::debug!(?outcome, "Reconciled");
                self.queue.forget(key).await;
            }
            Err(err) if err.is_retryable() => self.retry_or_drop(key, &err).await,
            Err(err) => {
                self.queue.forget(key).await;
                self.reporter.report(key, &err);
            }
        }
    }

    async fn retry_or_drop(
        &self,
        key: &QueueKey,
        err: &(dyn StdError + Send + Sync + 'static),
    ) {
        let attempts = self.queue.num_requeues(key).await + 1;
        if attempts < self.max_attempts {
            tracing::warn!(attempts, "Failed processing claim, retrying: {err}");
            self.queue.add_rate_limited(key.clone()).await;
        } else {
            tracing::warn!(attempts, "Failed processing claim, no retries left: {err}");
            self.queue.forget(key).await;
            self.reporter.report(key, err);
        }
    }

    pub async fn run(self: Arc<Self>, id: usize) {
        tracing::info!(worker = id, "Starting worker");
        while self.process_next_item().await {}
        tracing::info!(worker = id, "Worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use populator::k8s_openapi::api::core::v1::PersistentVolumeClaim;

    use super::*;
    use crate::cache::CacheError;
    use crate::claim::ClaimReconciler;
    use crate::claim::tests::{FakeLauncher, FakeSources, claim, data_source};
    use crate::config::MissingSourcePolicy;
    use crate::dispatch::Dispatcher;

    #[derive(Default)]
    struct FakeCache {
        claims: HashMap<QueueKey, Arc<PersistentVolumeClaim>>,
        lookups: AtomicUsize,
        fail: bool,
    }

    impl FakeCache {
        fn with(claims: impl IntoIterator<Item = PersistentVolumeClaim>) -> Self {
            Self {
                claims: claims
                    .into_iter()
                    .map(|claim| {
                        let key = QueueKey::from_resource(&claim).expect("Failed to build key");
                        (key, Arc::new(claim))
                    })
                    .collect(),
                ..Default::default()
            }
        }
    }

    impl ClaimCache for FakeCache {
        fn get_by_key(
            &self,
            key: &QueueKey,
        ) -> Result<Option<Arc<PersistentVolumeClaim>>, CacheError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(CacheError::NotSynced);
            }
            Ok(self.claims.get(key).cloned())
        }
    }

    #[derive(Clone, Default)]
    struct RecordingReporter {
        reports: Arc<Mutex<Vec<(QueueKey, String)>>>,
    }

    impl RecordingReporter {
        fn reports(&self) -> Vec<(QueueKey, String)> {
            self.reports.lock().expect("Reporter lock poisoned").clone()
        }
    }

    impl ErrorReporter for RecordingReporter {
        fn report(&self, key: &QueueKey, error: &(dyn StdError + 'static)) {
            self.reports
                .lock()
                .expect("Reporter lock poisoned")
                .push((key.clone(), error.to_string()));
        }
    }

    type TestWorker =
        Worker<FakeCache, ClaimReconciler<FakeSources, FakeLauncher>, RecordingReporter>;

    fn worker(
        cache: FakeCache,
        reconciler: ClaimReconciler<FakeSources, FakeLauncher>,
    ) -> (TestWorker, RecordingReporter) {
        let reporter = RecordingReporter::default();
        let worker = Worker::new(WorkQueue::new(), cache, reconciler, 5).reporter(reporter.clone());
        (worker, reporter)
    }

    fn reconciler(sources: FakeSources) -> ClaimReconciler<FakeSources, FakeLauncher> {
        ClaimReconciler::new(sources, FakeLauncher::default(), Dispatcher::default())
    }

    #[tokio::test]
    async fn test_process_git_claim() {
        let (worker, reporter) = worker(
            FakeCache::with([claim("pvc1", Some("ds1"))]),
            reconciler(FakeSources::with([data_source("ds1", "git")])),
        );
        worker.queue().add(QueueKey::new("ns", "pvc1")).await;
        assert!(worker.process_next_item().await);
        let jobs = worker.reconciler.launcher().jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].metadata.name.as_deref(), Some("ds1-pvc-pvc1"));
        assert!(worker.queue().is_empty().await);
        assert_eq!(worker.queue().num_requeues(&QueueKey::new("ns", "pvc1")).await, 0);
        assert!(reporter.reports().is_empty());
    }

    #[tokio::test]
    async fn test_deleted_claim_has_no_side_effects() {
        let (worker, reporter) = worker(
            FakeCache::default(),
            reconciler(FakeSources::with([data_source("ds1", "git")])),
        );
        worker.queue().add(QueueKey::new("ns", "pvc1")).await;
        assert!(worker.process_next_item().await);
        assert!(worker.reconciler.launcher().jobs().is_empty());
        assert!(worker.queue().is_empty().await);
        assert!(reporter.reports().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_failures_are_dropped_after_max_attempts() {
        let (worker, reporter) = worker(
            FakeCache {
                fail: true,
                ..Default::default()
            },
            reconciler(FakeSources::default()),
        );
        let key = QueueKey::new("ns", "pvc1");
        worker.queue().add(key.clone()).await;
        for attempt in 1..5 {
            assert!(worker.process_next_item().await);
            assert_eq!(worker.queue().num_requeues(&key).await, attempt);
            assert!(reporter.reports().is_empty());
        }
        assert!(worker.process_next_item().await);
        assert_eq!(worker.cache.lookups.load(Ordering::SeqCst), 5);
        assert_eq!(worker.queue().num_requeues(&key).await, 0);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(worker.queue().is_empty().await);
        let reports = reporter.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].0, key);
    }

    #[tokio::test(start_paused = true)]
    async fn test_launch_failures_are_retried_then_reported() {
        let (worker, reporter) = worker(
            FakeCache::with([claim("pvc1", Some("ds1"))]),
            ClaimReconciler::new(
                FakeSources::with([data_source("ds1", "git")]),
                FakeLauncher {
                    fail_with: Some(500),
                    ..Default::default()
                },
                Dispatcher::default(),
            ),
        );
        let key = QueueKey::new("ns", "pvc1");
        worker.queue().add(key.clone()).await;
        for _ in 0..5 {
            assert!(worker.process_next_item().await);
        }
        let launcher = worker.reconciler.launcher();
        assert_eq!(launcher.attempts.load(Ordering::SeqCst), 5);
        assert!(launcher.jobs().is_empty());
        assert_eq!(worker.queue().num_requeues(&key).await, 0);
        let reports = reporter.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].0, key);

        tokio::time::sleep(Duration::from_secs(2000)).await;
        assert!(worker.queue().is_empty().await);
        assert_eq!(launcher.attempts.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_terminal_errors_are_reported_without_retry() {
        let (worker, reporter) = worker(
            FakeCache::with([claim("pvc1", Some("ds1"))]),
            reconciler(FakeSources::with([data_source("ds1", "svn")])),
        );
        let key = QueueKey::new("ns", "pvc1");
        worker.queue().add(key.clone()).await;
        assert!(worker.process_next_item().await);
        assert!(worker.reconciler.launcher().jobs().is_empty());
        assert_eq!(worker.queue().num_requeues(&key).await, 0);
        let reports = reporter.reports();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].1.contains("svn"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_source_retried_when_configured() {
        let (worker, reporter) = worker(
            FakeCache::with([claim("pvc1", Some("ds1"))]),
            reconciler(FakeSources::default()).missing_source(MissingSourcePolicy::Retry),
        );
        let key = QueueKey::new("ns", "pvc1");
        worker.queue().add(key.clone()).await;
        assert!(worker.process_next_item().await);
        assert_eq!(worker.queue().num_requeues(&key).await, 1);
        assert!(worker.process_next_item().await);
        assert_eq!(worker.queue().num_requeues(&key).await, 2);
        assert!(reporter.reports().is_empty());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let (worker, _reporter) = worker(FakeCache::default(), reconciler(FakeSources::default()));
        let worker = Arc::new(worker);
        let handle = tokio::spawn(worker.clone().run(0));
        worker.queue().add(QueueKey::new("ns", "pvc1")).await;
        worker.queue().shut_down().await;
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("Worker did not stop")
            .expect("Worker panicked");
    }
}
