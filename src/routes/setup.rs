//! Test-data seeder
//!
//! POST /setup creates the reference set of ten scientists if they do not
//! exist yet. Idempotent. This mirrors the reference deployment's seeding
//! endpoint; scientist registration proper is owned by another service.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde_json::json;
use tracing::{error, info};

use crate::routes::{error_response, json_response};
use crate::server::AppState;

/// Handle POST /setup
pub async fn handle_setup(state: &AppState) -> Response<Full<Bytes>> {
    match state.store.seed_scientists().await {
        Ok(created) => {
            if created > 0 {
                info!(created, "Setup: seeded test scientists");
            }
            json_response(
                StatusCode::OK,
                &json!({
                    "message": format!("Database initialized. {} new scientists created.", created),
                    "scientists_created": created
                }),
            )
        }
        Err(e) => {
            error!(error = %e, "Setup failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Setup failed")
        }
    }
}
