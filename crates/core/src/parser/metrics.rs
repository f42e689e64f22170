//! Per-parser success/failure counters, atomic for lock-free increments
//! on the hot ingestion path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

#[derive(Default)]
struct Counters {
    success: AtomicU64,
    failure: AtomicU64,
}

#[derive(Default)]
pub struct ParserMetrics {
    per_parser: RwLock<HashMap<String, Counters>>,
    no_suitable_parser: AtomicU64,
}

impl ParserMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, parser_name: &str) {
        self.with_counters(parser_name, |c| {
            c.success.fetch_add(1, Ordering::Relaxed);
        });
    }

    pub fn record_failure(&self, parser_name: &str) {
        self.with_counters(parser_name, |c| {
            c.failure.fetch_add(1, Ordering::Relaxed);
        });
    }

    pub fn record_no_suitable_parser(&self) {
        self.no_suitable_parser.fetch_add(1, Ordering::Relaxed);
    }

    pub fn counts(&self, parser_name: &str) -> (u64, u64) {
        let guard = self.per_parser.read().unwrap();
        guard
            .get(parser_name)
            .map(|c| (c.success.load(Ordering::Relaxed), c.failure.load(Ordering::Relaxed)))
            .unwrap_or((0, 0))
    }

    pub fn no_suitable_parser_count(&self) -> u64 {
        self.no_suitable_parser.load(Ordering::Relaxed)
    }

    fn with_counters(&self, parser_name: &str, f: impl FnOnce(&Counters)) {
        {
            let guard = self.per_parser.read().unwrap();
            if let Some(c) = guard.get(parser_name) {
                f(c);
                return;
            }
        }
        let mut guard = self.per_parser.write().unwrap();
        let c = guard.entry(parser_name.to_string()).or_default();
        f(c);
    }
}
