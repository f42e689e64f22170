//! Tailer (spec §4.8): when an external caller wants recent logs without
//! running producers on this node, polls storage for events newer than a
//! watermark and republishes them to the hub. Short-circuits while
//! nobody is listening.

use std::sync::Arc;

use logcore::Query;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::state::AppState;

pub async fn run(state: AppState, query: Arc<dyn Query>, mut shutdown: watch::Receiver<bool>) {
    let mut watermark = chrono::Utc::now();
    let mut interval = tokio::time::interval(state.config.tailer_poll());

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if state.hub.subscriber_count() == 0 {
                    continue;
                }
                match query.query_since(watermark, state.config.tailer_batch).await {
                    Ok(rows) => {
                        for event in &rows {
                            if event.timestamp > watermark {
                                watermark = event.timestamp;
                            }
                            state.hub.broadcast(event);
                        }
                    }
                    Err(e) => warn!(error = %e, "tailer query failed"),
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    debug!("tailer stopping: shutdown signaled");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logcore::{Event, InMemoryStorage, RuleSet, Storage};
    use std::time::Duration;

    fn test_state() -> (AppState, Arc<InMemoryStorage>) {
        let config = crate::config::ServerConfig::default();
        let storage = Arc::new(InMemoryStorage::new());
        let state = AppState::new(config, RuleSet::default_strict(), storage.clone(), Some(storage.clone()));
        (state, storage)
    }

    #[tokio::test]
    async fn short_circuits_with_no_subscribers() {
        let (state, storage) = test_state();
        let query: Arc<dyn Query> = storage.clone();
        storage.insert(&Event::empty()).await.unwrap();

        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let tailer_state = state.clone();
        tokio::spawn(run(tailer_state, query, shutdown_rx));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(state.hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn republishes_new_rows_to_subscribers() {
        let (state, storage) = test_state();
        let query: Arc<dyn Query> = storage.clone();

        let (_id, mut rx) = state.hub.register();
        rx.recv().await.unwrap(); // drain connection message

        let mut event = Event::empty();
        event.message = "from storage".to_string();
        event.service = "svc".to_string();
        event.timestamp = chrono::Utc::now() + chrono::Duration::seconds(5);
        storage.insert(&event).await.unwrap();

        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(run(state.clone(), query, shutdown_rx));

        let msg = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
        match msg {
            crate::hub::protocol::ServerMessage::Log { data } => assert_eq!(data.message, "from storage"),
            _ => panic!("expected a log message"),
        }
    }
}
