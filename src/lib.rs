//! Telescope Scheduler - reservation service for shared observation time
//!
//! Scientists reserve non-overlapping time slots on a single shared
//! instrument. Because several stateless instances may process overlapping
//! requests at once, booking admission is serialized through an external
//! coordinator (lock authority) wrapped around a transactional conflict
//! check, with an append-only audit trail of every admission decision.
//!
//! ## Modules
//!
//! - **admission**: the booking admission protocol (lock, check, write, release)
//! - **lock**: request/response client to the coordinator
//! - **db**: relational store for scientists and bookings
//! - **audit**: JSONL audit trail, separate from operational logs
//! - **routes** / **server**: HTTP surface

pub mod admission;
pub mod audit;
pub mod config;
pub mod db;
pub mod lock;
pub mod routes;
pub mod server;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{Result, SchedulerError};
