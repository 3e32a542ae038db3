//! Data model for the booking store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Registered scientist, owned by the registration subsystem.
/// Read-only from the scheduler's perspective.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scientist {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub institution: String,
    pub country: Option<String>,
    pub registered_at: DateTime<Utc>,
}

/// Booking status. Confirmed bookings participate in conflict checks;
/// the only allowed transition is confirmed -> cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "confirmed" => Some(Self::Confirmed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reservation of the observation resource over [start_utc, end_utc).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: i64,
    pub scientist_id: i64,
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
    pub status: BookingStatus,
    pub observed_object: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create-booking request body
#[derive(Debug, Clone, Deserialize)]
pub struct NewBooking {
    pub scientist_id: i64,
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
    #[serde(default)]
    pub observed_object: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}
