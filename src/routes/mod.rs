//! HTTP routes for the scheduler

pub mod bookings;
pub mod health;
pub mod setup;

pub use bookings::{handle_cancel_booking, handle_create_booking, handle_list_bookings};
pub use health::{health_check, server_time};
pub use setup::handle_setup;

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;

/// Serialize `body` as a JSON response with the given status
pub(crate) fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json_body = serde_json::to_string(body)
        .unwrap_or_else(|_| r#"{"error":"Serialization failed"}"#.to_string());

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(json_body)))
        .unwrap()
}

/// Plain `{"error": ...}` response
pub(crate) fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    json_response(status, &serde_json::json!({ "error": message }))
}
