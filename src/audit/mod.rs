//! Append-only audit trail, decoupled from operational logs

pub mod recorder;

pub use recorder::{AuditEvent, AuditEventType, AuditRecorder, UserSummary};
