//! Fan-out hub (spec §4.4): broadcasts every normalized event to matching,
//! non-paused subscribers over a bounded per-subscriber outbound queue.
//!
//! Follows the same shape as a WebSocket bridge built on a tagged JSON
//! protocol over a `tokio::sync::mpsc` channel, with subscriber counters
//! tracked the way a connection-pool metrics struct would.
//! The registry uses `dashmap` rather than a single `RwLock<HashMap>`: each
//! shard is independently locked, so broadcast (many concurrent readers)
//! and register/unregister (occasional writers) don't contend on one lock
//! while still satisfying the "read lock to broadcast, write lock to
//! register" semantic the spec describes.

pub mod filter;
pub mod protocol;
pub mod ws;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use logcore::Event;
use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::metrics::HubMetrics;
use filter::FilterRule;
use protocol::{ClientMessage, ServerMessage};

struct Subscriber {
    tx: mpsc::Sender<ServerMessage>,
    filters: RwLock<Vec<FilterRule>>,
    paused: AtomicBool,
}

pub struct Hub {
    subscribers: DashMap<String, Subscriber>,
    metrics: HubMetrics,
    channel_bound: usize,
    next_id: AtomicU64,
}

impl Hub {
    pub fn new(channel_bound: usize, metrics: HubMetrics) -> Arc<Self> {
        Arc::new(Self {
            subscribers: DashMap::new(),
            metrics,
            channel_bound,
            next_id: AtomicU64::new(0),
        })
    }

    pub fn metrics(&self) -> &HubMetrics {
        &self.metrics
    }

    /// Registers a new subscriber and delivers the initial `connection`
    /// control message onto its outbound channel.
    pub fn register(&self) -> (String, mpsc::Receiver<ServerMessage>) {
        let id = format!("sub-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.channel_bound);

        let _ = tx.try_send(ServerMessage::connection(&id));

        self.subscribers.insert(
            id.clone(),
            Subscriber {
                tx,
                filters: RwLock::new(Vec::new()),
                paused: AtomicBool::new(false),
            },
        );
        self.metrics.subscriber_connected(&id);
        (id, rx)
    }

    /// Removes a subscriber; dropping its sender closes the outbound
    /// channel (spec §4.4 "unregistration closes the outbound channel").
    pub fn unregister(&self, id: &str) {
        if self.subscribers.remove(id).is_some() {
            self.metrics.subscriber_disconnected(id);
        }
    }

    /// Applies a client control message. A reply (currently only `pong`
    /// for `ping`) is queued directly onto the subscriber's own outbound
    /// channel rather than returned, so callers don't need a separate
    /// delivery path.
    pub fn apply_control(&self, id: &str, msg: ClientMessage) -> Option<ServerMessage> {
        let sub = self.subscribers.get(id)?;
        match msg {
            ClientMessage::Filter { filters } => {
                *sub.filters.write() = filters;
                None
            }
            ClientMessage::Pause {} => {
                sub.paused.store(true, Ordering::Relaxed);
                None
            }
            ClientMessage::Resume {} => {
                sub.paused.store(false, Ordering::Relaxed);
                None
            }
            ClientMessage::Ping {} => {
                let reply = ServerMessage::pong();
                let _ = sub.tx.try_send(ServerMessage::pong());
                Some(reply)
            }
        }
    }

    /// Offers `event` to every matching, non-paused subscriber. A full
    /// outbound channel evicts the subscriber rather than blocking the
    /// broadcaster (spec §4.4 backpressure policy).
    pub fn broadcast(&self, event: &Event) {
        let approx_size = event.message.len() + 64;
        let mut evicted = Vec::new();

        for entry in self.subscribers.iter() {
            let sub = entry.value();
            if sub.paused.load(Ordering::Relaxed) {
                continue;
            }
            if !filter::matches(&sub.filters.read(), event) {
                continue;
            }
            match sub.tx.try_send(ServerMessage::Log { data: event.clone() }) {
                Ok(()) => self.metrics.message_sent(approx_size),
                Err(mpsc::error::TrySendError::Full(_)) | Err(mpsc::error::TrySendError::Closed(_)) => {
                    evicted.push(entry.key().clone());
                }
            }
        }

        for id in evicted {
            self.subscribers.remove(&id);
            self.metrics.subscriber_evicted(&id);
            tracing::warn!("{}", crate::error::SubscriberOverflow(id));
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Closes every subscriber channel and empties the registry (testable
    /// property 5: "after `stop()`, no subscriber's outbound channel
    /// remains open and the registry is empty").
    pub fn close(&self) {
        self.subscribers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use filter::FilterOp;

    fn event_with_level(level: &str) -> Event {
        let mut e = Event::empty();
        e.level = level.to_string();
        e.stamp_defaults(Utc::now());
        e
    }

    #[tokio::test]
    async fn register_delivers_connection_message() {
        let hub = Hub::new(8, HubMetrics::new());
        let (id, mut rx) = hub.register();
        let msg = rx.recv().await.unwrap();
        match msg {
            ServerMessage::Connection { data } => assert_eq!(data.subscriber_id, id),
            _ => panic!("expected connection message"),
        }
    }

    #[tokio::test]
    async fn broadcast_respects_filter() {
        let hub = Hub::new(8, HubMetrics::new());
        let (id, mut rx) = hub.register();
        rx.recv().await.unwrap(); // drain connection message

        hub.apply_control(
            &id,
            ClientMessage::Filter {
                filters: vec![FilterRule {
                    field: "level".into(),
                    operator: FilterOp::Equals,
                    value: "error".into(),
                }],
            },
        );

        hub.broadcast(&event_with_level("info"));
        hub.broadcast(&event_with_level("error"));

        let msg = rx.try_recv().unwrap();
        match msg {
            ServerMessage::Log { data } => assert_eq!(data.level, "error"),
            _ => panic!("expected log message"),
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn paused_subscriber_receives_nothing() {
        let hub = Hub::new(8, HubMetrics::new());
        let (id, mut rx) = hub.register();
        rx.recv().await.unwrap();
        hub.apply_control(&id, ClientMessage::Pause {});
        hub.broadcast(&event_with_level("error"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn full_channel_evicts_subscriber() {
        let hub = Hub::new(1, HubMetrics::new());
        let (_id, _rx) = hub.register(); // channel now holds the connection message, full (bound=1)
        assert_eq!(hub.subscriber_count(), 1);
        hub.broadcast(&event_with_level("error"));
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn close_empties_registry() {
        let hub = Hub::new(8, HubMetrics::new());
        hub.register();
        hub.register();
        assert_eq!(hub.subscriber_count(), 2);
        hub.close();
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn ping_elicits_pong() {
        let hub = Hub::new(8, HubMetrics::new());
        let (id, mut rx) = hub.register();
        rx.recv().await.unwrap();
        let reply = hub.apply_control(&id, ClientMessage::Ping {});
        assert!(matches!(reply, Some(ServerMessage::Status { .. })));
    }
}
