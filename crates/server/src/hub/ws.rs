//! Live-stream WebSocket upgrade (spec §4.4): relays the hub's outbound
//! queue to the client and the client's control messages into the hub.
//! Structured the same way a split-socket relay with `tokio::select!`
//! task coordination would be: one task reads, one task writes, the
//! connection ends when either side closes.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tracing::{debug, warn};

use super::protocol::ClientMessage;
use crate::state::AppState;

pub async fn live_stream_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let ws = ws.max_message_size(state.config.ws_max_message);
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (id, mut outbound_rx) = state.hub.register();
    let (mut ws_tx, mut ws_rx) = socket.split();

    let ping_period = state.config.ws_ping_period();
    let pong_wait = state.config.ws_pong_wait();

    let writer = {
        let id = id.clone();
        tokio::spawn(async move {
            let mut ping_interval = tokio::time::interval(ping_period);
            ping_interval.tick().await; // consume the immediate first tick
            let mut awaiting_pong = false;
            let mut pong_deadline = Box::pin(tokio::time::sleep(pong_wait));

            loop {
                tokio::select! {
                    biased;
                    msg = outbound_rx.recv() => {
                        let Some(msg) = msg else { return };
                        let text = serde_json::to_string(&msg).unwrap();
                        if ws_tx.send(Message::Text(text.into())).await.is_err() {
                            return;
                        }
                    }
                    _ = ping_interval.tick() => {
                        if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                            return;
                        }
                        awaiting_pong = true;
                        pong_deadline.as_mut().reset(tokio::time::Instant::now() + pong_wait);
                    }
                    _ = &mut pong_deadline, if awaiting_pong => {
                        debug!(subscriber = %id, "closing WebSocket: pong deadline exceeded");
                        return;
                    }
                }
            }
        })
    };

    let reader = {
        let state = state.clone();
        let id = id.clone();
        tokio::spawn(async move {
            while let Some(result) = ws_rx.next().await {
                match result {
                    Ok(Message::Text(text)) => {
                        if text.len() > 10 * 1024 {
                            warn!(subscriber = %id, "closing WebSocket: oversized control message");
                            return;
                        }
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(msg) => {
                                state.hub.apply_control(&id, msg);
                            }
                            Err(e) => debug!(subscriber = %id, error = %e, "ignoring unparseable control message"),
                        }
                    }
                    Ok(Message::Close(_)) => return,
                    Ok(Message::Pong(_)) | Ok(Message::Ping(_)) | Ok(Message::Binary(_)) => {}
                    Err(e) => {
                        warn!(subscriber = %id, error = %e, "WebSocket read error");
                        return;
                    }
                }
            }
        })
    };

    tokio::select! {
        _ = writer => {},
        _ = reader => {},
    }

    state.hub.unregister(&id);
}
