//! Client for the coordinator (lock authority)
//!
//! The coordinator grants exclusive, named holds over resource keys:
//! `POST /lock {resource_id}` -> 200 granted | 409 busy, and
//! `POST /unlock {resource_id}` -> best-effort ack. Acquisition is the only
//! cross-instance serialization point for booking admission; release is
//! best-effort and relies on the authority's own lease expiry if it fails.

use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Result of a lock acquisition attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// Exclusive hold obtained; caller owns the critical section until release.
    Granted,
    /// Another caller holds the key. Expected contention, not an error.
    Busy,
    /// Authority unreachable, timed out, or answered with an unexpected
    /// status. The caller must not enter the critical section.
    Unavailable,
}

/// Result of a lock release attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Released,
    /// Logged as a critical anomaly; the key stays held until the
    /// authority's own expiry.
    Failed,
}

#[derive(Serialize)]
struct LockRequest<'a> {
    resource_id: &'a str,
}

/// Synchronous request/response client to the coordinator
pub struct LockClient {
    http: reqwest::Client,
    base_url: String,
    acquire_timeout: Duration,
    release_timeout: Duration,
}

impl LockClient {
    pub fn new(
        base_url: impl Into<String>,
        acquire_timeout: Duration,
        release_timeout: Duration,
    ) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(acquire_timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            acquire_timeout,
            release_timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Try to acquire an exclusive hold on `resource_key`.
    ///
    /// Never errors past the outcome enum: transport failures, timeouts and
    /// unexpected statuses all map to `Unavailable`.
    pub async fn acquire(&self, resource_key: &str) -> AcquireOutcome {
        debug!(resource_key, "Requesting lock from coordinator");

        let result = self
            .http
            .post(format!("{}/lock", self.base_url))
            .timeout(self.acquire_timeout)
            .json(&LockRequest {
                resource_id: resource_key,
            })
            .send()
            .await;

        match result {
            Ok(resp) => match resp.status().as_u16() {
                200 => {
                    debug!(resource_key, "Lock granted");
                    AcquireOutcome::Granted
                }
                409 => {
                    warn!(resource_key, "Lock busy, resource already held");
                    AcquireOutcome::Busy
                }
                status => {
                    error!(resource_key, status, "Unexpected coordinator status on lock");
                    AcquireOutcome::Unavailable
                }
            },
            Err(e) => {
                error!(resource_key, error = %e, "Failed to reach coordinator at {}", self.base_url);
                AcquireOutcome::Unavailable
            }
        }
    }

    /// Release a previously granted hold. Best-effort: a failure is logged
    /// but never propagated, and never reverses a write that already
    /// committed under the hold.
    pub async fn release(&self, resource_key: &str) -> ReleaseOutcome {
        debug!(resource_key, "Releasing lock");

        let result = self
            .http
            .post(format!("{}/unlock", self.base_url))
            .timeout(self.release_timeout)
            .json(&LockRequest {
                resource_id: resource_key,
            })
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => ReleaseOutcome::Released,
            Ok(resp) => {
                error!(
                    resource_key,
                    status = resp.status().as_u16(),
                    "CRITICAL: coordinator refused lock release; key held until authority expiry"
                );
                ReleaseOutcome::Failed
            }
            Err(e) => {
                error!(
                    resource_key,
                    error = %e,
                    "CRITICAL: failed to release lock; key held until authority expiry"
                );
                ReleaseOutcome::Failed
            }
        }
    }
}
