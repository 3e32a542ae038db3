//! Booking endpoints
//!
//! - POST /bookings              - protected create path (admission protocol)
//! - POST /bookings/{id}/cancel  - guarded confirmed -> cancelled transition
//! - GET  /bookings              - confirmed bookings

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde_json::json;
use std::sync::Arc;
use tracing::error;

use crate::admission::AdmissionOutcome;
use crate::audit::{AuditEvent, AuditEventType, UserSummary};
use crate::db::{Booking, BookingStatus, NewBooking, TransitionResult};
use crate::routes::{error_response, json_response};
use crate::server::AppState;

/// Booking JSON body with HATEOAS links
fn booking_representation(booking: &Booking) -> serde_json::Value {
    json!({
        "id": booking.id,
        "scientist_id": booking.scientist_id,
        "start_utc": booking.start_utc,
        "end_utc": booking.end_utc,
        "status": booking.status,
        "observed_object": booking.observed_object,
        "description": booking.description,
        "_links": {
            "self": { "href": format!("/bookings/{}", booking.id) },
            "scientist": { "href": format!("/scientists/{}", booking.scientist_id) },
            "cancel": {
                "href": format!("/bookings/{}/cancel", booking.id),
                "method": "POST",
                "description": "Cancel this booking"
            }
        }
    })
}

/// Handle POST /bookings
pub async fn handle_create_booking(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<Full<Bytes>> {
    let body_bytes = match req.collect().await {
        Ok(b) => b.to_bytes(),
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("Failed to read body: {}", e),
            )
        }
    };

    let new_booking: NewBooking = match serde_json::from_slice(&body_bytes) {
        Ok(b) => b,
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, &format!("Invalid JSON body: {}", e))
        }
    };

    if new_booking.end_utc <= new_booking.start_utc {
        return error_response(StatusCode::BAD_REQUEST, "end_utc must be after start_utc");
    }

    match state.admission.create_booking(new_booking).await {
        Ok(AdmissionOutcome::Created(booking)) => {
            json_response(StatusCode::CREATED, &booking_representation(&booking))
        }
        Ok(AdmissionOutcome::ScientistNotFound { .. }) => {
            error_response(StatusCode::NOT_FOUND, "Scientist not found")
        }
        Ok(AdmissionOutcome::ResourceBusy { .. }) => json_response(
            StatusCode::CONFLICT,
            &json!({
                "error": "Resource in use",
                "details": "resource_busy"
            }),
        ),
        Ok(AdmissionOutcome::IntervalConflict { conflicting }) => json_response(
            StatusCode::CONFLICT,
            &json!({
                "error": "Time slot not available",
                "details": "interval_conflict",
                "conflicting_booking_id": conflicting.id
            }),
        ),
        Ok(AdmissionOutcome::CoordinationUnavailable) => error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Coordination service unavailable",
        ),
        Err(e) => {
            // No internal detail leaks to the caller
            error!(error = %e, "Create booking failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

/// Handle POST /bookings/{id}/cancel
pub async fn handle_cancel_booking(state: Arc<AppState>, id: i64) -> Response<Full<Bytes>> {
    let result = state
        .store
        .transition(id, BookingStatus::Confirmed, BookingStatus::Cancelled)
        .await;

    match result {
        Ok(TransitionResult::Transitioned(booking)) => {
            // Best-effort user summary; the booking row is the source of truth
            let user = match state.store.scientist(booking.scientist_id).await {
                Ok(Some(scientist)) => UserSummary::from_scientist(&scientist),
                _ => UserSummary::id_only(booking.scientist_id),
            };
            state
                .audit
                .record(AuditEvent::new(
                    AuditEventType::BookingCancelled,
                    user,
                    json!({
                        "booking_id": booking.id,
                        "start_utc": booking.start_utc,
                        "previous_status": BookingStatus::Confirmed,
                        "new_status": booking.status,
                    }),
                ))
                .await;

            json_response(
                StatusCode::OK,
                &json!({
                    "id": booking.id,
                    "status": booking.status,
                    "_links": {
                        "self": { "href": format!("/bookings/{}", booking.id) },
                        "scientist": { "href": format!("/scientists/{}", booking.scientist_id) },
                        "create_new": { "href": "/bookings", "method": "POST" }
                    }
                }),
            )
        }
        Ok(TransitionResult::NotFound) => error_response(StatusCode::NOT_FOUND, "Booking not found"),
        Ok(TransitionResult::InvalidState(status)) => json_response(
            StatusCode::BAD_REQUEST,
            &json!({
                "error": "Only confirmed bookings can be cancelled",
                "status": status
            }),
        ),
        Err(e) => {
            error!(error = %e, booking_id = id, "Cancel booking failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

/// Handle GET /bookings
pub async fn handle_list_bookings(state: &AppState) -> Response<Full<Bytes>> {
    match state.store.list_confirmed().await {
        Ok(bookings) => {
            let items: Vec<serde_json::Value> =
                bookings.iter().map(booking_representation).collect();
            json_response(
                StatusCode::OK,
                &json!({
                    "total": items.len(),
                    "bookings": items
                }),
            )
        }
        Err(e) => {
            error!(error = %e, "List bookings failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}
