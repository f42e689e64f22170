use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

/// Hub subscriber/message counters.
#[derive(Clone)]
pub struct HubMetrics {
    inner: Arc<HubMetricsInner>,
}

struct HubMetricsInner {
    active_subscribers: AtomicU64,
    total_subscribers_created: AtomicU64,
    total_messages_sent: AtomicU64,
    total_bytes_sent: AtomicU64,
    evicted_subscribers: AtomicU64,
    filter_counts: RwLock<HashMap<String, u64>>,
}

impl HubMetrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HubMetricsInner {
                active_subscribers: AtomicU64::new(0),
                total_subscribers_created: AtomicU64::new(0),
                total_messages_sent: AtomicU64::new(0),
                total_bytes_sent: AtomicU64::new(0),
                evicted_subscribers: AtomicU64::new(0),
                filter_counts: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn subscriber_connected(&self, id: &str) {
        self.inner.active_subscribers.fetch_add(1, Ordering::Relaxed);
        self.inner.total_subscribers_created.fetch_add(1, Ordering::Relaxed);
        *self.inner.filter_counts.write().entry(id.to_string()).or_insert(0) += 1;
        tracing::debug!(subscriber = id, "subscriber connected");
    }

    pub fn subscriber_disconnected(&self, id: &str) {
        let _ = self.inner.active_subscribers.fetch_update(
            Ordering::Relaxed,
            Ordering::Relaxed,
            |current| if current > 0 { Some(current - 1) } else { None },
        );
        self.inner.filter_counts.write().remove(id);
        tracing::debug!(subscriber = id, "subscriber disconnected");
    }

    pub fn subscriber_evicted(&self, _id: &str) {
        self.inner.evicted_subscribers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_sent(&self, bytes: usize) {
        self.inner.total_messages_sent.fetch_add(1, Ordering::Relaxed);
        self.inner.total_bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn active_count(&self) -> u64 {
        self.inner.active_subscribers.load(Ordering::Relaxed)
    }

    pub fn total_created(&self) -> u64 {
        self.inner.total_subscribers_created.load(Ordering::Relaxed)
    }

    pub fn total_messages(&self) -> u64 {
        self.inner.total_messages_sent.load(Ordering::Relaxed)
    }

    pub fn total_bytes(&self) -> u64 {
        self.inner.total_bytes_sent.load(Ordering::Relaxed)
    }

    pub fn evicted_count(&self) -> u64 {
        self.inner.evicted_subscribers.load(Ordering::Relaxed)
    }
}

impl Default for HubMetrics {
    fn default() -> Self {
        Self::new()
    }
}
