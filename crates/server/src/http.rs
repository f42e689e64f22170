//! HTTP receiver (spec §4.5): `POST /ingest/logs`, `POST /ingest/bulk`,
//! `GET /ingest/health`. Grounded on the teacher's `cluster::main` axum
//! `Router` + CORS + `DefaultBodyLimit` + timeout-layer wiring.

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tracing::warn;

use crate::state::AppState;

/// Broadcasts are capped to the first N events of a bulk payload even
/// when broadcast isn't explicitly suppressed, per spec §4.5.
const BULK_BROADCAST_CAP: usize = 100;

pub fn router(state: AppState) -> Router {
    let cors = if state.config.enable_cors {
        let origins = state
            .config
            .cors_origins
            .iter()
            .filter_map(|s| s.parse::<axum::http::HeaderValue>().ok())
            .collect::<Vec<_>>();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE])
    } else {
        CorsLayer::new()
    };

    let request_timeout = std::time::Duration::from_secs(state.config.write_timeout_secs);

    Router::new()
        .route(
            "/ingest/logs",
            post(ingest_logs_handler).route_layer(DefaultBodyLimit::max(state.config.http_body_limit_single)),
        )
        .route(
            "/ingest/bulk",
            post(ingest_bulk_handler).route_layer(DefaultBodyLimit::max(state.config.http_body_limit_bulk)),
        )
        .route("/ingest/health", get(ingest_health_handler))
        .route("/ingest/metrics", get(ingest_metrics_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, request_timeout))
                .layer(cors),
        )
        .with_state(state)
}

fn accepted(received: usize, message: &str) -> impl IntoResponse {
    (
        StatusCode::ACCEPTED,
        Json(json!({ "status": "accepted", "received": received, "message": message })),
    )
}

/// `POST /ingest/logs` — a single event object or a JSON array,
/// autodetected by the first non-whitespace byte.
async fn ingest_logs_handler(State(state): State<AppState>, body: Bytes) -> axum::response::Response {
    let trimmed_start = body.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(body.len());
    let first_byte = body.get(trimmed_start);

    let raws: Vec<Vec<u8>> = match first_byte {
        Some(b'[') => match serde_json::from_slice::<Vec<Value>>(&body) {
            Ok(values) => values
                .into_iter()
                .filter_map(|v| serde_json::to_vec(&v).ok())
                .collect(),
            Err(e) => {
                warn!(raw = %String::from_utf8_lossy(&body), error = %e, "invalid JSON array body");
                return crate::error::IngressDecodeError::InvalidJson(e.to_string()).into_response();
            }
        },
        Some(_) => match serde_json::from_slice::<Value>(&body) {
            Ok(_) => vec![body.to_vec()],
            Err(e) => {
                warn!(raw = %String::from_utf8_lossy(&body), error = %e, "invalid JSON body");
                return crate::error::IngressDecodeError::InvalidJson(e.to_string()).into_response();
            }
        },
        None => return crate::error::IngressDecodeError::InvalidJson("empty body".to_string()).into_response(),
    };

    let received = process_and_publish(&state, raws, true);
    accepted(received, "logs accepted").into_response()
}

#[derive(Deserialize)]
struct BulkRequest {
    logs: Vec<Value>,
    #[serde(default)]
    options: BulkOptions,
}

#[derive(Deserialize, Default)]
struct BulkOptions {
    #[serde(default)]
    skip_broadcast: bool,
}

/// `POST /ingest/bulk` — `{logs: [...], options: {skip_broadcast}}`.
async fn ingest_bulk_handler(State(state): State<AppState>, body: Bytes) -> axum::response::Response {
    let request: BulkRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "invalid bulk JSON body");
            return crate::error::IngressDecodeError::InvalidJson(e.to_string()).into_response();
        }
    };

    if request.logs.is_empty() {
        return crate::error::IngressDecodeError::EmptyBulk.into_response();
    }

    let raws: Vec<Vec<u8>> = request
        .logs
        .into_iter()
        .filter_map(|v| serde_json::to_vec(&v).ok())
        .collect();

    let received = process_and_publish_bulk(&state, raws, request.options.skip_broadcast);
    accepted(received, "bulk accepted").into_response()
}

async fn ingest_health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let status_code = if state.is_shutting_down() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (
        status_code,
        Json(json!({
            "status": if state.is_shutting_down() { "shutting_down" } else { "healthy" },
            "time": Utc::now().to_rfc3339(),
            "service": "logserver",
        })),
    )
}

async fn ingest_metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let hub_metrics = state.hub.metrics();
    Json(json!({
        "hub": {
            "active_subscribers": hub_metrics.active_count(),
            "total_subscribers_created": hub_metrics.total_created(),
            "total_messages_sent": hub_metrics.total_messages(),
            "total_bytes_sent": hub_metrics.total_bytes(),
            "evicted_subscribers": hub_metrics.evicted_count(),
        },
        "batch_writer": {
            "buffered_events": state.batch_writer.buffered_len(),
        },
    }))
}

fn process_and_publish(state: &AppState, raws: Vec<Vec<u8>>, broadcast: bool) -> usize {
    let mut received = 0;
    for raw in raws {
        if let Some(event) = crate::ingest::parse_and_normalize(state, &raw) {
            crate::ingest::publish(state, event, broadcast);
            received += 1;
        }
    }
    received
}

fn process_and_publish_bulk(state: &AppState, raws: Vec<Vec<u8>>, skip_broadcast: bool) -> usize {
    let mut received = 0;
    for (i, raw) in raws.into_iter().enumerate() {
        if let Some(event) = crate::ingest::parse_and_normalize(state, &raw) {
            let broadcast = !skip_broadcast && i < BULK_BROADCAST_CAP;
            crate::ingest::publish(state, event, broadcast);
            received += 1;
        }
    }
    received
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use logcore::{InMemoryStorage, RuleSet};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let storage = Arc::new(InMemoryStorage::new());
        AppState::new(
            crate::config::ServerConfig::default(),
            RuleSet::default_strict(),
            storage.clone(),
            Some(storage),
        )
    }

    #[tokio::test]
    async fn single_event_alias_scenario() {
        let state = test_state();
        let app = router(state);
        let body = r#"{"ts":"2024-01-15T10:30:00Z","lvl":"INFO","msg":"ok","app":"svc"}"#;
        let req = axum::http::Request::builder()
            .method("POST")
            .uri("/ingest/logs")
            .header("content-type", "application/json")
            .body(axum::body::Body::from(body))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["received"], 1);
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let state = test_state();
        let app = router(state);
        let req = axum::http::Request::builder()
            .method("POST")
            .uri("/ingest/logs")
            .body(axum::body::Body::from("{not json"))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn empty_bulk_is_bad_request() {
        let state = test_state();
        let app = router(state);
        let req = axum::http::Request::builder()
            .method("POST")
            .uri("/ingest/bulk")
            .body(axum::body::Body::from(r#"{"logs":[]}"#))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn bulk_array_is_accepted() {
        let state = test_state();
        let app = router(state);
        let body = r#"{"logs":[{"message":"a","service":"svc"},{"message":"b","service":"svc"}]}"#;
        let req = axum::http::Request::builder()
            .method("POST")
            .uri("/ingest/bulk")
            .body(axum::body::Body::from(body))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["received"], 2);
    }

    #[tokio::test]
    async fn health_endpoint_reports_healthy() {
        let state = test_state();
        let app = router(state);
        let req = axum::http::Request::builder()
            .method("GET")
            .uri("/ingest/health")
            .body(axum::body::Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
