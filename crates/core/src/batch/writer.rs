//! Batch writer — coalesces events into bounded batches and flushes them
//! to storage on size, interval, or shutdown triggers, with retry and
//! exponential backoff (spec §4.3).

use std::sync::{Arc, Mutex};

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

use crate::batch::config::BatchConfig;
use crate::event::Event;
use crate::storage::Storage;

struct Inner {
    buffer: Mutex<Vec<Event>>,
    notify: Notify,
    config: BatchConfig,
    storage: Arc<dyn Storage>,
}

/// `add`/`add_batch` never block beyond the short mutex critical section
/// and never fail. Exactly one flush worker runs per writer.
pub struct BatchWriter {
    inner: Arc<Inner>,
    stop_tx: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl BatchWriter {
    pub fn spawn(storage: Arc<dyn Storage>, config: BatchConfig) -> Self {
        let inner = Arc::new(Inner {
            buffer: Mutex::new(Vec::with_capacity(config.batch_size)),
            notify: Notify::new(),
            config,
            storage,
        });
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(run_flush_loop(Arc::clone(&inner), stop_rx));

        Self {
            inner,
            stop_tx,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Appends one event. Triggers a flush if the buffer has reached
    /// `batch_size`; multiple size-hits between flushes coalesce onto the
    /// single wake signal, so at most one extra flush is scheduled.
    pub fn add(&self, event: Event) {
        let hit_threshold = {
            let mut buf = self.inner.buffer.lock().unwrap();
            buf.push(event);
            buf.len() >= self.inner.config.batch_size
        };
        if hit_threshold {
            self.inner.notify.notify_one();
        }
    }

    pub fn add_batch(&self, events: impl IntoIterator<Item = Event>) {
        let hit_threshold = {
            let mut buf = self.inner.buffer.lock().unwrap();
            buf.extend(events);
            buf.len() >= self.inner.config.batch_size
        };
        if hit_threshold {
            self.inner.notify.notify_one();
        }
    }

    pub fn buffered_len(&self) -> usize {
        self.inner.buffer.lock().unwrap().len()
    }

    /// Signals the flush worker to drain remaining events and perform a
    /// terminal flush, then waits for it to finish.
    pub async fn stop(&self) {
        let _ = self.stop_tx.send(true);
        let handle = self.handle.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

async fn run_flush_loop(inner: Arc<Inner>, mut stop_rx: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            _ = inner.notify.notified() => {}
            _ = tokio::time::sleep(inner.config.flush_interval) => {}
            changed = stop_rx.changed() => {
                if changed.is_ok() && *stop_rx.borrow() {
                    flush(&inner).await;
                    break;
                }
            }
        }
        flush(&inner).await;
    }
}

/// A flush of an empty buffer is a no-op; `flush(flush(batch)) ==
/// flush(batch)`.
async fn flush(inner: &Inner) {
    let batch = {
        let mut buf = inner.buffer.lock().unwrap();
        if buf.is_empty() {
            return;
        }
        std::mem::replace(&mut *buf, Vec::with_capacity(inner.config.batch_size))
    };
    write_with_retry(inner, batch).await;
}

async fn write_with_retry(inner: &Inner, batch: Vec<Event>) {
    let mut backoff = inner.config.initial_backoff;
    let total_attempts = inner.config.max_retries + 1;

    for attempt in 0..total_attempts {
        match write_batch_once(&inner.storage, &batch).await {
            Ok(()) => return,
            Err(e) => {
                let is_last = attempt + 1 == total_attempts;
                if is_last {
                    tracing::error!(
                        error = %e,
                        batch_size = batch.len(),
                        "batch write failed after {} retries, dropping batch",
                        inner.config.max_retries
                    );
                    return;
                }
                tracing::warn!(error = %e, attempt, backoff = ?backoff, "batch write failed, retrying");
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
        }
    }
}

async fn write_batch_once(storage: &Arc<dyn Storage>, batch: &[Event]) -> Result<(), crate::error::StorageError> {
    for event in batch {
        storage.insert(event).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn sample_event(msg: &str) -> Event {
        let mut e = Event::empty();
        e.message = msg.to_string();
        e.service = "svc".to_string();
        e.level = "info".to_string();
        e
    }

    #[tokio::test]
    async fn flushes_on_size_trigger() {
        let storage = Arc::new(InMemoryStorage::new());
        let writer = BatchWriter::spawn(
            storage.clone(),
            BatchConfig {
                batch_size: 3,
                flush_interval: Duration::from_secs(60),
                max_retries: 0,
                initial_backoff: Duration::from_millis(1),
            },
        );
        for i in 0..3 {
            writer.add(sample_event(&format!("m{i}")));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(storage.snapshot().len(), 3);
        writer.stop().await;
    }

    #[tokio::test]
    async fn stop_drains_remaining_events() {
        let storage = Arc::new(InMemoryStorage::new());
        let writer = BatchWriter::spawn(
            storage.clone(),
            BatchConfig {
                batch_size: 1000,
                flush_interval: Duration::from_secs(60),
                max_retries: 0,
                initial_backoff: Duration::from_millis(1),
            },
        );
        writer.add(sample_event("a"));
        writer.add(sample_event("b"));
        writer.stop().await;
        assert_eq!(storage.snapshot().len(), 2);
    }

    struct FlakyStorage {
        failures_remaining: AtomicU32,
        inner: InMemoryStorage,
    }

    #[async_trait::async_trait]
    impl Storage for FlakyStorage {
        async fn insert(&self, event: &Event) -> Result<(), crate::error::StorageError> {
            if self.failures_remaining.load(Ordering::SeqCst) > 0 {
                self.failures_remaining.fetch_sub(1, Ordering::SeqCst);
                return Err(crate::error::StorageError::new("transient"));
            }
            self.inner.insert(event).await
        }
    }

    #[tokio::test]
    async fn retries_transient_failures_then_succeeds() {
        let storage = Arc::new(FlakyStorage {
            failures_remaining: AtomicU32::new(2),
            inner: InMemoryStorage::new(),
        });
        let writer = BatchWriter::spawn(
            storage.clone(),
            BatchConfig {
                batch_size: 1,
                flush_interval: Duration::from_secs(60),
                max_retries: 3,
                initial_backoff: Duration::from_millis(5),
            },
        );
        let start = std::time::Instant::now();
        writer.add(sample_event("a"));
        writer.stop().await;
        assert!(start.elapsed() >= Duration::from_millis(15));
        assert_eq!(storage.inner.snapshot().len(), 1);
    }
}
