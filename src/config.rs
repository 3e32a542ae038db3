//! Configuration for the scheduler
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// Telescope Scheduler - reservation service for shared observation time
///
/// Multiple stateless instances may run against the same store; admission of
/// new bookings is serialized through the external coordinator service.
#[derive(Parser, Debug, Clone)]
#[command(name = "telescope-scheduler")]
#[command(about = "Booking service for shared telescope time slots")]
pub struct Args {
    /// Unique node identifier for this service instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:5000")]
    pub listen: SocketAddr,

    /// SQLite database path
    #[arg(long, env = "DATABASE_PATH", default_value = "scheduler.db")]
    pub database_path: PathBuf,

    /// Base URL of the coordinator (lock authority)
    #[arg(long, env = "COORDINATOR_URL", default_value = "http://localhost:3000")]
    pub coordinator_url: String,

    /// Timeout for lock acquisition in milliseconds
    #[arg(long, env = "LOCK_TIMEOUT_MS", default_value = "5000")]
    pub lock_timeout_ms: u64,

    /// Timeout for lock release in milliseconds
    #[arg(long, env = "UNLOCK_TIMEOUT_MS", default_value = "2000")]
    pub unlock_timeout_ms: u64,

    /// Resource class used to derive lock keys (the lockable instrument)
    #[arg(long, env = "RESOURCE_CLASS", default_value = "Hubble-Acad")]
    pub resource_class: String,

    /// Audit trail file (JSONL, separate from operational logs)
    #[arg(long, env = "AUDIT_LOG_PATH", default_value = "audit.log")]
    pub audit_log_path: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Timeout applied to coordinator lock calls
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Timeout applied to coordinator unlock calls
    pub fn unlock_timeout(&self) -> Duration {
        Duration::from_millis(self.unlock_timeout_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.coordinator_url.starts_with("http://") && !self.coordinator_url.starts_with("https://") {
            return Err("COORDINATOR_URL must be an http(s) URL".to_string());
        }

        if self.lock_timeout_ms == 0 || self.unlock_timeout_ms == 0 {
            return Err("lock timeouts must be greater than zero".to_string());
        }

        if self.resource_class.is_empty() {
            return Err("RESOURCE_CLASS must not be empty".to_string());
        }

        Ok(())
    }
}
