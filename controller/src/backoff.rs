use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBackoff, ExponentialBuilder};

/// Decides how long a key waits before it is re-queued after a failure.
pub trait RateLimiter<K>: Send {
    /// Records a failure for `key` and returns the delay before its next attempt.
    fn when(&mut self, key: &K) -> Duration;
    fn forget(&mut self, key: &K);
    fn num_requeues(&self, key: &K) -> u32;
}

struct ItemBackoff {
    backoff: ExponentialBackoff,
    failures: u32,
}

/// Per-key exponential backoff starting at `min`, doubling per failure and
/// capped at `max`.
pub struct ItemExponentialRateLimiter<K> {
    builder: ExponentialBuilder,
    max: Duration,
    items: HashMap<K, ItemBackoff>,
}

impl<K> ItemExponentialRateLimiter<K> {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            builder: ExponentialBuilder::default()
                .with_min_delay(min)
                .with_max_delay(max)
                .with_factor(2.0)
                .without_max_times(),
            max,
            items: HashMap::new(),
        }
    }
}

impl<K> Default for ItemExponentialRateLimiter<K> {
    fn default() -> Self {
        Self::new(Duration::from_millis(5), Duration::from_secs(1000))
    }
}

impl<K> RateLimiter<K> for ItemExponentialRateLimiter<K>
where
    K: Clone + Eq + Hash + Send,
{
    fn when(&mut self, key: &K) -> Duration {
        let item = self
            .items
            .entry(key.clone())
            .or_insert_with(|| ItemBackoff {
                backoff: self.builder.build(),
                failures: 0,
            });
        item.failures = item.failures.saturating_add(1);
        item.backoff.next().unwrap_or(self.max)
    }

    fn forget(&mut self, key: &K) {
        self.items.remove(key);
    }

    fn num_requeues(&self, key: &K) -> u32 {
        self.items
            .get(key)
            .map(|item| item.failures)
            .unwrap_or_default()
    }
}
