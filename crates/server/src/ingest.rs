//! The shared "parse → stamp → validate → broadcast → enqueue" pipeline
//! every receiver (HTTP, TCP, Syslog) funnels events through (spec §2's
//! data-flow tee: `Receiver → Parser registry → Rule engine → (Batch
//! writer ∥ Fan-out hub)`).

use logcore::Event;
use tracing::debug;

use crate::state::AppState;

/// Runs one raw log line/object through the parser registry and rule
/// engine and returns the canonical event. Ingest-time defaults (id,
/// timestamp, level, service) are stamped by the registry between parse
/// and validation (spec §4.5), so a structured event only missing a
/// defaultable slot validates as itself. `None` means the line was
/// dropped (counted and logged at debug per spec §4.8's failure
/// semantics) — never propagated as a hard error.
pub fn parse_and_normalize(state: &AppState, raw: &[u8]) -> Option<Event> {
    let result = state.parsers.parse_validated(raw, &state.rules);
    match result.event {
        Some(event) => Some(event),
        None => {
            debug!(
                sample = %String::from_utf8_lossy(&raw[..raw.len().min(200)]),
                "dropping event: no suitable parser or failed validation"
            );
            None
        }
    }
}

/// Publishes a normalized event to both the hub (liveness) and the batch
/// writer (durability). Neither blocks the other, per spec §2.
pub fn publish(state: &AppState, event: Event, broadcast: bool) {
    if broadcast {
        state.hub.broadcast(&event);
    }
    state.batch_writer.add(event);
}

/// Runs an already-constructed event (e.g. pre-parsed by the Syslog
/// receiver's `syslog_loose` front end) through ingest-time stamping and
/// the rule engine, without going through the parser registry — there is
/// no format to detect, the receiver already produced a canonical event.
/// Stamping happens before validation, same as [`parse_and_normalize`]
/// (spec §4.5), so a syslog line only missing a defaultable slot
/// validates as itself. Returns `None` on validation failure.
pub fn normalize_event(state: &AppState, mut event: Event) -> Option<Event> {
    event.stamp_defaults(chrono::Utc::now());
    match state.rules.apply(event) {
        Ok(event) => Some(event),
        Err(e) => {
            debug!(error = %e, "dropping syslog event: validation failed");
            None
        }
    }
}
