//! Syslog receiver (spec §4.7): UDP and TCP, RFC3164/5424, pre-parsed
//! with `syslog_loose` (grounded on `vector`'s
//! `codecs::decoding::format::syslog` use of the same crate).

use logcore::Event;
use syslog_loose::{Message, Variant};
use tokio::io::{AsyncReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::state::AppState;

const MAX_DATAGRAM: usize = 64 * 1024;

pub async fn run_udp(state: AppState, mut shutdown: watch::Receiver<bool>) -> std::io::Result<()> {
    let socket = UdpSocket::bind(&state.config.syslog_udp_bind).await?;
    info!(addr = %state.config.syslog_udp_bind, "Syslog UDP receiver listening");

    let mut buf = vec![0u8; MAX_DATAGRAM];
    loop {
        tokio::select! {
            received = socket.recv_from(&mut buf) => {
                match received {
                    Ok((len, _peer)) => {
                        if let Ok(text) = std::str::from_utf8(&buf[..len]) {
                            process_line(&state, text);
                        }
                    }
                    Err(e) => warn!(error = %e, "Syslog UDP recv error"),
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("Syslog UDP receiver stopping: shutdown signaled");
                    return Ok(());
                }
            }
        }
    }
}

pub async fn run_tcp(state: AppState, mut shutdown: watch::Receiver<bool>) -> std::io::Result<()> {
    let listener = TcpListener::bind(&state.config.syslog_tcp_bind).await?;
    info!(addr = %state.config.syslog_tcp_bind, "Syslog TCP receiver listening");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (socket, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!(error = %e, "Syslog TCP accept failed");
                        continue;
                    }
                };
                let state = state.clone();
                tokio::spawn(async move {
                    handle_tcp_connection(socket, state).await;
                    debug!(peer = %peer, "Syslog TCP connection closed");
                });
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("Syslog TCP receiver stopping: shutdown signaled");
                    return Ok(());
                }
            }
        }
    }
}

/// Frames messages as either newline-terminated or RFC6587
/// octet-counted (`<len> <message>`), detected per-message by whether
/// the next byte is an ASCII digit.
async fn handle_tcp_connection(socket: TcpStream, state: AppState) {
    let mut reader = BufReader::new(socket);

    loop {
        let mut first = [0u8; 1];
        match reader.read_exact(&mut first).await {
            Ok(_) => {}
            Err(_) => return,
        }

        if first[0].is_ascii_digit() {
            let mut digits = vec![first[0]];
            loop {
                let mut b = [0u8; 1];
                if reader.read_exact(&mut b).await.is_err() {
                    return;
                }
                if b[0] == b' ' {
                    break;
                }
                if !b[0].is_ascii_digit() {
                    return; // malformed framing, drop the connection
                }
                digits.push(b[0]);
            }
            let len: usize = match std::str::from_utf8(&digits).ok().and_then(|s| s.parse().ok()) {
                Some(n) => n,
                None => return,
            };
            let mut body = vec![0u8; len];
            if reader.read_exact(&mut body).await.is_err() {
                return;
            }
            if let Ok(text) = std::str::from_utf8(&body) {
                process_line(&state, text);
            }
        } else {
            let mut line = vec![first[0]];
            loop {
                let mut b = [0u8; 1];
                match reader.read_exact(&mut b).await {
                    Ok(_) => {
                        if b[0] == b'\n' {
                            break;
                        }
                        line.push(b[0]);
                    }
                    Err(_) => {
                        if line.len() <= 1 {
                            return;
                        }
                        break;
                    }
                }
            }
            if let Ok(text) = std::str::from_utf8(&line) {
                process_line(&state, text);
            }
        }
    }
}

fn process_line(state: &AppState, line: &str) {
    let trimmed = line.trim_end_matches(['\r', '\n']);
    if trimmed.is_empty() {
        return;
    }
    let message = syslog_loose::parse_message(trimmed, Variant::Either);
    let event = to_event(message);
    if let Some(event) = crate::ingest::normalize_event(state, event) {
        crate::ingest::publish(state, event, true);
    }
}

/// Maps a `syslog_loose::Message` onto the canonical event: severity →
/// standard level, app-name (or tag) → service.
fn to_event(message: Message<&str>) -> Event {
    let mut event = Event::empty();

    event.level = severity_to_level(message.severity).to_string();
    if let Some(ts) = message.timestamp {
        event.timestamp = ts.with_timezone(&chrono::Utc);
    }
    event.service = message.appname.unwrap_or("unknown").to_string();
    event.message = message.msg.to_string();

    event
}

fn severity_to_level(severity: Option<syslog_loose::SyslogSeverity>) -> &'static str {
    use syslog_loose::SyslogSeverity::*;
    match severity {
        Some(SEV_EMERG) | Some(SEV_ALERT) | Some(SEV_CRIT) => "fatal",
        Some(SEV_ERR) => "error",
        Some(SEV_WARNING) => "warn",
        Some(SEV_NOTICE) | Some(SEV_INFO) | None => "info",
        Some(SEV_DEBUG) => "debug",
    }
}
