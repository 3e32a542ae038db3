//! Health and time endpoints
//!
//! /health and /healthz are liveness probes: 200 whenever the service is
//! running, regardless of coordinator reachability (the coordinator is
//! consulted per admission attempt, not held as a connection).

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use serde_json::json;

use crate::routes::json_response;
use crate::server::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub status: &'static str,
    pub version: &'static str,
    pub node_id: String,
    pub coordinator_url: String,
    pub timestamp: String,
}

/// Handle GET /health, /healthz
pub fn health_check(state: &AppState) -> Response<Full<Bytes>> {
    let response = HealthResponse {
        healthy: true,
        status: "online",
        version: env!("CARGO_PKG_VERSION"),
        node_id: state.args.node_id.to_string(),
        coordinator_url: state.args.coordinator_url.clone(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };

    json_response(StatusCode::OK, &response)
}

/// Handle GET /time
pub fn server_time() -> Response<Full<Bytes>> {
    json_response(
        StatusCode::OK,
        &json!({
            "server_time_utc": chrono::Utc::now(),
            "_links": {
                "self": { "href": "/time" },
                "bookings": { "href": "/bookings", "method": "GET" },
                "create_booking": { "href": "/bookings", "method": "POST" }
            }
        }),
    )
}
