//! Line-framed TCP receiver (spec §4.6): one connection per client, one
//! task per connection so a slow peer never head-of-line blocks another.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::state::AppState;

pub async fn run(state: AppState, mut shutdown: watch::Receiver<bool>) -> std::io::Result<()> {
    let listener = TcpListener::bind(&state.config.tcp_bind).await?;
    info!(addr = %state.config.tcp_bind, "TCP receiver listening");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (socket, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!(error = %e, "TCP accept failed");
                        continue;
                    }
                };
                let state = state.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    handle_connection(socket, state, shutdown).await;
                    debug!(peer = %peer, "TCP connection closed");
                });
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("TCP receiver stopping: shutdown signaled");
                    return Ok(());
                }
            }
        }
    }
}

async fn handle_connection(socket: TcpStream, state: AppState, mut shutdown: watch::Receiver<bool>) {
    let idle_timeout = state.config.tcp_read_idle_timeout();
    let (reader, mut writer) = socket.into_split();
    let mut lines = BufReader::new(reader).lines();

    loop {
        let next_line = tokio::select! {
            line = tokio::time::timeout(idle_timeout, lines.next_line()) => line,
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
                continue;
            }
        };

        let line = match next_line {
            Ok(Ok(Some(line))) => line,
            Ok(Ok(None)) => return, // peer closed
            Ok(Err(e)) => {
                warn!(error = %e, "TCP read error");
                return;
            }
            Err(_) => {
                debug!("TCP connection idle timeout");
                return;
            }
        };

        if line.is_empty() {
            continue;
        }

        let ack = match crate::ingest::parse_and_normalize(&state, line.as_bytes()) {
            Some(event) => {
                crate::ingest::publish(&state, event, true);
                b"OK\n".as_slice()
            }
            None => b"ERR\n".as_slice(),
        };

        if writer.write_all(ack).await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logcore::{InMemoryStorage, RuleSet};
    use std::sync::Arc;

    fn test_state(bind: &str) -> AppState {
        let config = crate::config::ServerConfig {
            tcp_bind: bind.to_string(),
            ..Default::default()
        };
        let storage = Arc::new(InMemoryStorage::new());
        AppState::new(config, RuleSet::default_strict(), storage.clone(), Some(storage))
    }

    #[tokio::test]
    async fn valid_line_is_acked_ok_and_published() {
        let state = test_state("127.0.0.1:0");
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let state_clone = state.clone();
        tokio::spawn(async move {
            loop {
                let (socket, _) = listener.accept().await.unwrap();
                let state = state_clone.clone();
                let shutdown = shutdown_rx.clone();
                tokio::spawn(handle_connection(socket, state, shutdown));
            }
        });

        let mut client = TcpStream::connect(addr).await.unwrap();
        client
            .write_all(b"{\"message\":\"hi\",\"service\":\"svc\",\"level\":\"info\"}\n")
            .await
            .unwrap();

        let mut reader = tokio::io::BufReader::new(client);
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        assert_eq!(line, "OK\n");

        let _ = shutdown_tx;
    }

    #[tokio::test]
    async fn oversized_message_is_acked_err_without_closing() {
        let state = test_state("127.0.0.1:0");
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            handle_connection(socket, state, shutdown_rx).await;
        });

        let mut client = TcpStream::connect(addr).await.unwrap();
        let oversized = "a".repeat(10_001);
        client.write_all(oversized.as_bytes()).await.unwrap();
        client.write_all(b"\n").await.unwrap();
        client
            .write_all(b"{\"message\":\"after\",\"service\":\"svc\",\"level\":\"info\"}\n")
            .await
            .unwrap();

        let mut reader = tokio::io::BufReader::new(client);
        let mut first = String::new();
        reader.read_line(&mut first).await.unwrap();
        assert_eq!(first, "ERR\n");

        // The connection stays open: a valid line right after is still acked.
        let mut second = String::new();
        reader.read_line(&mut second).await.unwrap();
        assert_eq!(second, "OK\n");
    }
}
