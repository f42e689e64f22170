use std::sync::Arc;

use logcore::{default_registry, BatchWriter, ParserRegistry, Query, RuleEngine, RuleSet, Storage};

use crate::config::ServerConfig;
use crate::hub::Hub;
use crate::metrics::HubMetrics;

/// Shared application state, cloned into every receiver and the hub's
/// WebSocket handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub parsers: Arc<ParserRegistry>,
    pub rules: Arc<RuleEngine>,
    /// Used only by the tailer (spec §4.8). `None` when the configured
    /// storage backend doesn't support polling queries — the tailer is
    /// then simply not started.
    pub query: Option<Arc<dyn Query>>,
    pub batch_writer: Arc<BatchWriter>,
    pub hub: Arc<Hub>,
    /// Watch channel for shutdown signaling; unlike broadcast, receivers
    /// always see the latest value even if they subscribe late.
    pub shutdown_tx: tokio::sync::watch::Sender<bool>,
}

impl AppState {
    pub fn new(config: ServerConfig, rules: RuleSet, storage: Arc<dyn Storage>, query: Option<Arc<dyn Query>>) -> Self {
        let (shutdown_tx, _) = tokio::sync::watch::channel(false);
        let batch_writer = Arc::new(BatchWriter::spawn(storage.clone(), config.batch_config()));
        let hub = Hub::new(config.hub_channel_bound, HubMetrics::new());

        Self {
            config: Arc::new(config),
            parsers: Arc::new(default_registry()),
            rules: Arc::new(RuleEngine::new(rules)),
            query,
            batch_writer,
            hub,
            shutdown_tx,
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_tx.subscribe().borrow()
    }

    pub fn signal_shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}
