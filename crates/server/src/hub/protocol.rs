//! Live-stream WebSocket JSON protocol (spec §4.4, §6).
//!
//! **Client → Server:** `{type, action?, data?, filters?}` with
//! `type ∈ {filter, pause, resume, ping}`.
//! **Server → Client:** `{type, data}` with `type ∈ {connection, log, status}`.

use logcore::Event;
use serde::{Deserialize, Serialize};

use super::filter::FilterRule;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Filter { filters: Vec<FilterRule> },
    Pause {},
    Resume {},
    Ping {},
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Connection { data: ConnectionInfo },
    Log { data: Event },
    Status { data: StatusInfo },
}

#[derive(Debug, Serialize)]
pub struct ConnectionInfo {
    pub subscriber_id: String,
}

#[derive(Debug, Serialize)]
pub struct StatusInfo {
    pub message: String,
}

impl ServerMessage {
    pub fn connection(subscriber_id: impl Into<String>) -> Self {
        ServerMessage::Connection {
            data: ConnectionInfo { subscriber_id: subscriber_id.into() },
        }
    }

    pub fn pong() -> Self {
        ServerMessage::Status { data: StatusInfo { message: "pong".to_string() } }
    }
}
