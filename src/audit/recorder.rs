//! Audit trail recorder
//!
//! Writes one JSON record per admission decision to an append-only JSONL
//! file, separate from operational logs. Audit writes are fire-and-forget:
//! a failure to persist a record is logged but never aborts or rolls back
//! the business transaction it describes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::db::models::Scientist;

/// Service name stamped on every record
pub const SERVICE_NAME: &str = "telescope-scheduler";

/// Audit event types, one per terminal admission or cancellation outcome
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// Booking committed and confirmed
    BookingCreated,
    /// Admission rejected: resource busy or interval conflict
    BookingRejected,
    /// Admission attempt aborted: coordination or storage failure
    BookingAttemptFailed,
    /// Confirmed booking transitioned to cancelled
    BookingCancelled,
}

/// Who triggered the audited operation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserSummary {
    pub scientist_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl UserSummary {
    pub fn from_scientist(scientist: &Scientist) -> Self {
        Self {
            scientist_id: Some(scientist.id),
            name: Some(scientist.name.clone()),
            email: Some(scientist.email.clone()),
        }
    }

    /// Summary when only the claimed id is known (e.g. unknown scientist)
    pub fn id_only(scientist_id: i64) -> Self {
        Self {
            scientist_id: Some(scientist_id),
            name: None,
            email: None,
        }
    }
}

/// Write-once audit record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp_utc: DateTime<Utc>,
    pub event_type: AuditEventType,
    pub service: String,
    pub user: UserSummary,
    pub details: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType, user: UserSummary, details: serde_json::Value) -> Self {
        Self {
            timestamp_utc: Utc::now(),
            event_type,
            service: SERVICE_NAME.to_string(),
            user,
            details,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Convert to JSONL line
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Audit recorder that appends events to a JSONL file
#[derive(Clone)]
pub struct AuditRecorder {
    inner: Arc<Mutex<Option<BufWriter<File>>>>,
}

impl AuditRecorder {
    /// Recorder with no destination; events are dropped. Used in tests.
    pub fn disabled() -> Self {
        Self {
            inner: Arc::new(Mutex::new(None)),
        }
    }

    /// Open the audit trail file in append mode
    pub fn open(path: PathBuf) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        info!("Audit trail initialized at {}", path.display());
        Ok(Self {
            inner: Arc::new(Mutex::new(Some(BufWriter::new(file)))),
        })
    }

    /// Append an event. Failures are logged and swallowed.
    pub async fn record(&self, event: AuditEvent) {
        let jsonl = match event.to_jsonl() {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to serialize audit event: {}", e);
                return;
            }
        };

        let mut inner = self.inner.lock().await;
        if let Some(ref mut writer) = *inner {
            if let Err(e) = writeln!(writer, "{}", jsonl) {
                error!("Failed to write audit event: {}", e);
            }
            // Flush per record so the trail survives a crash
            if let Err(e) = writer.flush() {
                error!("Failed to flush audit trail: {}", e);
            }
        }
    }
}
