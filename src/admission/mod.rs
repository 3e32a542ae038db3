//! Booking admission protocol
//!
//! Orchestrates the create-booking flow across the coordinator lock, the
//! conflict store and the audit trail:
//!
//! validate scientist -> derive resource key -> acquire lock ->
//! [critical section: transactional conflict check + insert] ->
//! audit -> release lock (always) -> terminal outcome
//!
//! The lock is the only cross-instance serialization point. Once `acquire`
//! returns `Granted`, `release` is issued exactly once on every exit path,
//! after the booking and audit writes, so the effective hold covers both.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::audit::{AuditEvent, AuditEventType, AuditRecorder, UserSummary};
use crate::db::{AdmitResult, Booking, NewBooking, Store};
use crate::lock::{AcquireOutcome, LockClient, ReleaseOutcome};
use crate::types::Result;

/// Terminal classification of a create-booking attempt
#[derive(Debug)]
pub enum AdmissionOutcome {
    /// Booking committed with status confirmed
    Created(Booking),
    /// The referenced scientist does not exist; no lock was attempted
    ScientistNotFound { scientist_id: i64 },
    /// Another caller holds the resource key. Retryable client condition.
    ResourceBusy { resource_key: String },
    /// A confirmed booking overlaps the requested interval
    IntervalConflict { conflicting: Booking },
    /// The coordinator could not be reached; nothing was written
    CoordinationUnavailable,
}

/// Orchestrator for the protected create-booking path
pub struct AdmissionController {
    store: Arc<Store>,
    lock: Arc<LockClient>,
    audit: AuditRecorder,
    resource_class: String,
}

impl AdmissionController {
    pub fn new(
        store: Arc<Store>,
        lock: Arc<LockClient>,
        audit: AuditRecorder,
        resource_class: impl Into<String>,
    ) -> Self {
        Self {
            store,
            lock,
            audit,
            resource_class: resource_class.into(),
        }
    }

    /// Mutual-exclusion key for a booking request. One key per distinct
    /// start instant: requests with the same start are serialized by the
    /// coordinator; overlapping requests with different starts are caught
    /// by the store's transactional check-then-insert.
    pub fn resource_key(&self, start_utc: DateTime<Utc>) -> String {
        format!(
            "{}_{}",
            self.resource_class,
            start_utc.to_rfc3339_opts(SecondsFormat::Secs, true)
        )
    }

    /// Run the admission protocol for one create-booking request.
    ///
    /// `Err(_)` means an unexpected storage failure inside the critical
    /// section; nothing was committed and the lock was still released.
    pub async fn create_booking(&self, request: NewBooking) -> Result<AdmissionOutcome> {
        let scientist = match self.store.scientist(request.scientist_id).await? {
            Some(s) => s,
            None => {
                warn!(scientist_id = request.scientist_id, "Scientist not found");
                return Ok(AdmissionOutcome::ScientistNotFound {
                    scientist_id: request.scientist_id,
                });
            }
        };
        let user = UserSummary::from_scientist(&scientist);

        let resource_key = self.resource_key(request.start_utc);
        info!(resource_key = %resource_key, "Requesting admission lock");

        match self.lock.acquire(&resource_key).await {
            AcquireOutcome::Unavailable => {
                error!(resource_key = %resource_key, "Coordinator unavailable, aborting admission");
                self.audit
                    .record(
                        self.attempt_failed_event(&request, user, "coordination_unavailable")
                            .with_metadata(json!({ "resource_key": resource_key })),
                    )
                    .await;
                return Ok(AdmissionOutcome::CoordinationUnavailable);
            }
            AcquireOutcome::Busy => {
                warn!(resource_key = %resource_key, "Resource busy, admission rejected");
                self.audit
                    .record(
                        AuditEvent::new(
                            AuditEventType::BookingRejected,
                            user,
                            json!({
                                "start_utc": request.start_utc,
                                "end_utc": request.end_utc,
                                "reason": "resource_busy",
                            }),
                        )
                        .with_metadata(json!({ "resource_key": resource_key })),
                    )
                    .await;
                return Ok(AdmissionOutcome::ResourceBusy { resource_key });
            }
            AcquireOutcome::Granted => {}
        }

        // Critical section. The lock must be released on every exit path
        // below, so the section result is captured before release runs.
        let outcome = self.critical_section(&request, user, &resource_key).await;

        if self.lock.release(&resource_key).await == ReleaseOutcome::Failed {
            // Already logged by the lock client; the admission outcome
            // determined above stands.
            warn!(resource_key = %resource_key, "Admission outcome unaffected by release failure");
        }

        outcome
    }

    /// Conflict check plus insert under the held lock, then the audit write.
    async fn critical_section(
        &self,
        request: &NewBooking,
        user: UserSummary,
        resource_key: &str,
    ) -> Result<AdmissionOutcome> {
        match self.store.admit(request).await {
            Ok(AdmitResult::Admitted(booking)) => {
                info!(booking_id = booking.id, "Booking created");
                self.audit
                    .record(
                        AuditEvent::new(
                            AuditEventType::BookingCreated,
                            user,
                            json!({
                                "booking_id": booking.id,
                                "start_utc": booking.start_utc,
                                "end_utc": booking.end_utc,
                                "status": booking.status,
                            }),
                        )
                        .with_metadata(json!({ "resource_key": resource_key })),
                    )
                    .await;
                Ok(AdmissionOutcome::Created(booking))
            }
            Ok(AdmitResult::Overlap(conflicting)) => {
                warn!(
                    conflicting_id = conflicting.id,
                    "Interval conflict, admission rejected"
                );
                self.audit
                    .record(
                        AuditEvent::new(
                            AuditEventType::BookingRejected,
                            user,
                            json!({
                                "start_utc": request.start_utc,
                                "end_utc": request.end_utc,
                                "reason": "interval_conflict",
                                "conflicting_booking_id": conflicting.id,
                            }),
                        )
                        .with_metadata(json!({ "resource_key": resource_key })),
                    )
                    .await;
                Ok(AdmissionOutcome::IntervalConflict { conflicting })
            }
            Err(e) => {
                error!(error = %e, "Storage failure inside critical section");
                self.audit
                    .record(
                        self.attempt_failed_event(request, user, "internal_error")
                            .with_metadata(json!({ "resource_key": resource_key })),
                    )
                    .await;
                Err(e)
            }
        }
    }

    fn attempt_failed_event(
        &self,
        request: &NewBooking,
        user: UserSummary,
        reason: &str,
    ) -> AuditEvent {
        AuditEvent::new(
            AuditEventType::BookingAttemptFailed,
            user,
            json!({
                "start_utc": request.start_utc,
                "end_utc": request.end_utc,
                "reason": reason,
            }),
        )
    }
}
