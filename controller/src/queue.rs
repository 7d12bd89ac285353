use std::collections::{HashSet, VecDeque};
use std::hash::Hash;
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{Mutex, Notify, mpsc};
use tokio_util::sync::CancellationToken;
use tokio_util::time::DelayQueue;

use crate::backoff::{ItemExponentialRateLimiter, RateLimiter};

struct State<K> {
    queue: VecDeque<K>,
    // keys waiting to be processed, queued or not
    dirty: HashSet<K>,
    processing: HashSet<K>,
    shutting_down: bool,
}

impl<K> Default for State<K> {
    fn default() -> Self {
        Self {
            queue: VecDeque::new(),
            dirty: HashSet::new(),
            processing: HashSet::new(),
            shutting_down: false,
        }
    }
}

struct Inner<K, R> {
    state: Mutex<State<K>>,
    limiter: Mutex<R>,
    notify: Notify,
    shutdown: CancellationToken,
    // feeds the delayed-add task, started on first use
    delayed: OnceLock<mpsc::UnboundedSender<(K, Duration)>>,
}

/// Deduplicating, rate limited work queue.
///
/// A key is pending at most once no matter how many times it is added before a
/// worker picks it up, and a key handed out by [`WorkQueue::get`] is not handed
/// out again until [`WorkQueue::done`] is called for it. Keys added while they
/// are being processed are queued again once processing is done.
pub struct WorkQueue<K, R = ItemExponentialRateLimiter<K>> {
    inner: Arc<Inner<K, R>>,
}

impl<K, R> Clone for WorkQueue<K, R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K, R> Default for WorkQueue<K, R>
where
    R: Default,
{
    fn default() -> Self {
        Self::with_rate_limiter(R::default())
    }
}

impl<K> WorkQueue<K> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<K, R> WorkQueue<K, R> {
    pub fn with_rate_limiter(limiter: R) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                limiter: Mutex::new(limiter),
                notify: Notify::new(),
                shutdown: CancellationToken::new(),
                delayed: OnceLock::new(),
            }),
        }
    }
}

impl<K, R> WorkQueue<K, R>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    R: RateLimiter<K> + 'static,
{
    pub async fn add(&self, key: K) {
        let mut state = self.inner.state.lock().await;
        if state.shutting_down || !state.dirty.insert(key.clone()) {
            return;
        }
        if state.processing.contains(&key) {
            return;
        }
        state.queue.push_back(key);
        drop(state);
        self.inner.notify.notify_one();
    }

    /// Waits for the next key. Returns `None` once the queue is shutting down.
    pub async fn get(&self) -> Option<K> {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let mut state = self.inner.state.lock().await;
                if state.shutting_down {
                    return None;
                }
                if let Some(key) = state.queue.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    return Some(key);
                }
            }
            notified.await;
        }
    }

    pub async fn done(&self, key: K) {
        let mut state = self.inner.state.lock().await;
        state.processing.remove(&key);
        if state.dirty.contains(&key) && !state.shutting_down {
            state.queue.push_back(key);
            drop(state);
            self.inner.notify.notify_one();
        }
    }

    /// Adds `key` once `delay` has elapsed. Pending delayed adds are dropped on
    /// shutdown.
    pub fn add_after(&self, key: K, delay: Duration) {
        let sender = self.inner.delayed.get_or_init(|| {
            let (sender, receiver) = mpsc::unbounded_channel();
            tokio::spawn(run_delayed(
                Arc::downgrade(&self.inner),
                receiver,
                self.inner.shutdown.clone(),
            ));
            sender
        });
        if sender.send((key, delay)).is_err() {
            tracing::debug!("Delayed add dropped, queue is shutting down");
        }
    }

    pub async fn add_rate_limited(&self, key: K) {
        let delay = self.inner.limiter.lock().await.when(&key);
        tracing::debug!(?delay, "Requeueing with backoff");
        self.add_after(key, delay);
    }

    pub async fn forget(&self, key: &K) {
        self.inner.limiter.lock().await.forget(key);
    }

    pub async fn num_requeues(&self, key: &K) -> u32 {
        self.inner.limiter.lock().await.num_requeues(key)
    }

    pub async fn len(&self) -> usize {
        self.inner.state.lock().await.queue.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn is_shutting_down(&self) -> bool {
        self.inner.state.lock().await.shutting_down
    }

    /// Wakes every waiting [`WorkQueue::get`] with `None` and drops pending
    /// delayed adds. Keys added afterwards are ignored.
    pub async fn shut_down(&self) {
        self.inner.state.lock().await.shutting_down = true;
        self.inner.shutdown.cancel();
        self.inner.notify.notify_waiters();
    }
}

async fn run_delayed<K, R>(
    inner: Weak<Inner<K, R>>,
    mut requests: mpsc::UnboundedReceiver<(K, Duration)>,
    shutdown: CancellationToken,
) where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    R: RateLimiter<K> + 'static,
{
    let mut delayed = DelayQueue::new();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            request = requests.recv() => match request {
                Some((key, delay)) => {
                    delayed.insert(key, delay);
                }
                None => break,
            },
            Some(expired) = delayed.next(), if !delayed.is_empty() => {
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                WorkQueue { inner }.add(expired.into_inner()).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_add_coalesces_pending_keys() {
        let queue = WorkQueue::<&str>::new();
        queue.add("a").await;
        queue.add("a").await;
        queue.add("b").await;
        assert_eq!(queue.len().await, 2);
        assert_eq!(queue.get().await, Some("a"));
        assert_eq!(queue.get().await, Some("b"));
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_key_can_be_added_again_after_done() {
        let queue = WorkQueue::<&str>::new();
        queue.add("a").await;
        assert_eq!(queue.get().await, Some("a"));
        queue.done("a").await;
        queue.add("a").await;
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn test_add_while_processing_requeues_on_done() {
        let queue = WorkQueue::<&str>::new();
        queue.add("a").await;
        assert_eq!(queue.get().await, Some("a"));
        queue.add("a").await;
        queue.add("a").await;
        assert!(queue.is_empty().await);
        queue.done("a").await;
        assert_eq!(queue.len().await, 1);
        assert_eq!(queue.get().await, Some("a"));
    }

    #[tokio::test]
    async fn test_get_waits_for_add() {
        let queue = WorkQueue::<&str>::new();
        let getter = tokio::spawn({
            let queue = queue.clone();
            async move { queue.get().await }
        });
        tokio::task::yield_now().await;
        queue.add("a").await;
        assert_eq!(getter.await.expect("Getter panicked"), Some("a"));
    }

    #[tokio::test]
    async fn test_shut_down_wakes_getters() {
        let queue = WorkQueue::<&str>::new();
        let getters = (0..3)
            .map(|_| {
                let queue = queue.clone();
                tokio::spawn(async move { queue.get().await })
            })
            .collect::<Vec<_>>();
        tokio::task::yield_now().await;
        queue.shut_down().await;
        for getter in getters {
            assert_eq!(getter.await.expect("Getter panicked"), None);
        }
        queue.add("a").await;
        assert!(queue.is_empty().await);
        assert!(queue.is_shutting_down().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_rate_limited_delays_and_counts() {
        let queue = WorkQueue::<&str>::new();
        queue.add_rate_limited("a").await;
        assert_eq!(queue.num_requeues(&"a").await, 1);
        assert!(queue.is_empty().await);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(queue.len().await, 1);
        assert_eq!(queue.get().await, Some("a"));
        queue.forget(&"a").await;
        assert_eq!(queue.num_requeues(&"a").await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_adds_fire_in_deadline_order() {
        let queue = WorkQueue::<&str>::new();
        queue.add_after("slow", Duration::from_secs(3));
        queue.add_after("fast", Duration::from_secs(1));
        queue.add_after("fast", Duration::from_secs(2));
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(queue.len().await, 1);
        assert_eq!(queue.get().await, Some("fast"));
        tokio::time::sleep(Duration::from_secs(2)).await;
        // the second "fast" add coalesces into the key still being processed
        assert_eq!(queue.len().await, 1);
        assert_eq!(queue.get().await, Some("slow"));
        queue.done("fast").await;
        assert_eq!(queue.get().await, Some("fast"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shut_down_drops_delayed_adds() {
        let queue = WorkQueue::<&str>::new();
        queue.add_after("a", Duration::from_secs(1));
        queue.shut_down().await;
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(queue.is_empty().await);
    }
}
