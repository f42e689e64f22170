//! Storage contract — the analytical database is an external
//! collaborator (spec §1, §4.3); this module defines only the trait
//! boundary plus a trivial in-memory implementation for tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StorageError;
use crate::event::Event;

/// `insert(event) -> ok | error`, called per event inside a batch. The
/// batch writer's per-batch success is the conjunction of every
/// per-event write.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn insert(&self, event: &Event) -> Result<(), StorageError>;
}

/// Used only by the tailer (spec §4.8): `(timestamp > watermark, order by
/// timestamp asc, limit)`.
#[async_trait]
pub trait Query: Send + Sync {
    async fn query_since(
        &self,
        watermark: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Event>, StorageError>;
}

/// An in-memory store used by tests and local development; never a
/// stand-in for the real analytical database.
#[derive(Default)]
pub struct InMemoryStorage {
    events: std::sync::Mutex<Vec<Event>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn insert(&self, event: &Event) -> Result<(), StorageError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

#[async_trait]
impl Query for InMemoryStorage {
    async fn query_since(
        &self,
        watermark: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Event>, StorageError> {
        let mut matches: Vec<Event> = self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.timestamp > watermark)
            .cloned()
            .collect();
        matches.sort_by_key(|e| e.timestamp);
        matches.truncate(limit);
        Ok(matches)
    }
}
