//! Relational store for scientists and bookings

pub mod models;
pub mod store;

pub use models::{Booking, BookingStatus, NewBooking, Scientist};
pub use store::{AdmitResult, Store, TransitionResult};
