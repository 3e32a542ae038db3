//! SQLite-backed store for scientists and bookings
//!
//! All writes are atomic with respect to this store. The store provides no
//! cross-process mutual exclusion: callers inserting bookings must hold the
//! coordinator lock first (see the admission module). The conflict check and
//! the insert run inside a single transaction so the check-then-write pair
//! is at least atomic against concurrent local writers.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::db::models::{Booking, BookingStatus, NewBooking, Scientist};
use crate::types::Result;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS scientists (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    name          TEXT NOT NULL,
    email         TEXT NOT NULL UNIQUE,
    institution   TEXT NOT NULL,
    country       TEXT,
    registered_at INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS bookings (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    scientist_id    INTEGER NOT NULL REFERENCES scientists(id),
    start_utc       INTEGER NOT NULL,
    end_utc         INTEGER NOT NULL,
    status          TEXT NOT NULL DEFAULT 'confirmed',
    observed_object TEXT,
    description     TEXT,
    created_at      INTEGER NOT NULL,
    updated_at      INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_bookings_interval
    ON bookings (status, start_utc, end_utc);
";

const BOOKING_COLUMNS: &str =
    "id, scientist_id, start_utc, end_utc, status, observed_object, description, created_at, updated_at";

/// Names used by the /setup seeder, mirroring the reference deployment.
const SEED_SCIENTISTS: &[&str] = &[
    "Joao Silva",
    "Paulo Santos",
    "Ana Oliveira",
    "Beatriz Costa",
    "Carlos Pereira",
    "Daniela Ferreira",
    "Eduardo Almeida",
    "Fernanda Lima",
    "Gustavo Martins",
    "Helena Rocha",
];

/// Outcome of the transactional conflict-check-plus-insert
#[derive(Debug)]
pub enum AdmitResult {
    /// No confirmed booking overlapped; the new booking was inserted.
    Admitted(Booking),
    /// A confirmed booking overlaps the requested interval; nothing written.
    Overlap(Booking),
}

/// Outcome of a guarded status transition
#[derive(Debug)]
pub enum TransitionResult {
    Transitioned(Booking),
    NotFound,
    /// The booking exists but is not in the expected source status.
    InvalidState(BookingStatus),
}

/// Shared store handle. One connection guarded by an async mutex; queries
/// are short and never await while holding it.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) the database at `path` and ensure the schema exists
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        info!("Database opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store, used by tests
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Look up a scientist by id
    pub async fn scientist(&self, id: i64) -> Result<Option<Scientist>> {
        let conn = self.conn.lock().await;
        let scientist = conn
            .query_row(
                "SELECT id, name, email, institution, country, registered_at
                 FROM scientists WHERE id = ?1",
                params![id],
                scientist_from_row,
            )
            .optional()?;
        Ok(scientist)
    }

    /// Insert a scientist unless one with the same email already exists.
    /// Returns the stored row either way.
    pub async fn insert_scientist(
        &self,
        name: &str,
        email: &str,
        institution: &str,
        country: Option<&str>,
    ) -> Result<Scientist> {
        let conn = self.conn.lock().await;
        let existing = conn
            .query_row(
                "SELECT id, name, email, institution, country, registered_at
                 FROM scientists WHERE email = ?1",
                params![email],
                scientist_from_row,
            )
            .optional()?;
        if let Some(scientist) = existing {
            return Ok(scientist);
        }

        let now = Utc::now();
        conn.execute(
            "INSERT INTO scientists (name, email, institution, country, registered_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![name, email, institution, country, now.timestamp_millis()],
        )?;
        Ok(Scientist {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
            email: email.to_string(),
            institution: institution.to_string(),
            country: country.map(|c| c.to_string()),
            registered_at: now,
        })
    }

    /// Look up a scientist by unique email
    pub async fn scientist_by_email(&self, email: &str) -> Result<Option<Scientist>> {
        let conn = self.conn.lock().await;
        let scientist = conn
            .query_row(
                "SELECT id, name, email, institution, country, registered_at
                 FROM scientists WHERE email = ?1",
                params![email],
                scientist_from_row,
            )
            .optional()?;
        Ok(scientist)
    }

    /// Seed the reference set of test scientists. Idempotent; returns how
    /// many new rows were created.
    pub async fn seed_scientists(&self) -> Result<usize> {
        let mut created = 0;
        for name in SEED_SCIENTISTS {
            let first = name.split(' ').next().unwrap_or(name).to_lowercase();
            let email = format!("{}@email.com", first);
            if self.scientist_by_email(&email).await?.is_none() {
                self.insert_scientist(name, &email, "Test Institute", Some("Brazil"))
                    .await?;
                created += 1;
            }
        }
        Ok(created)
    }

    /// First confirmed booking whose interval intersects [start, end),
    /// using strict half-open overlap: existing.start < end AND existing.end > start.
    pub async fn find_overlapping(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<Booking>> {
        let conn = self.conn.lock().await;
        find_overlapping_in(&conn, start, end)
    }

    /// Conflict check plus insert in one transaction. Callers must hold the
    /// coordinator lock for the booking's resource key before calling this.
    pub async fn admit(&self, new: &NewBooking) -> Result<AdmitResult> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        if let Some(existing) = find_overlapping_in(&tx, new.start_utc, new.end_utc)? {
            debug!(conflicting_id = existing.id, "Overlap found, rejecting insert");
            return Ok(AdmitResult::Overlap(existing));
        }

        let now = Utc::now();
        tx.execute(
            "INSERT INTO bookings
                 (scientist_id, start_utc, end_utc, status, observed_object, description, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                new.scientist_id,
                new.start_utc.timestamp_millis(),
                new.end_utc.timestamp_millis(),
                BookingStatus::Confirmed.as_str(),
                new.observed_object,
                new.description,
                now.timestamp_millis(),
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(AdmitResult::Admitted(Booking {
            id,
            scientist_id: new.scientist_id,
            start_utc: new.start_utc,
            end_utc: new.end_utc,
            status: BookingStatus::Confirmed,
            observed_object: new.observed_object.clone(),
            description: new.description.clone(),
            created_at: now,
            updated_at: now,
        }))
    }

    /// Look up a booking by id
    pub async fn booking(&self, id: i64) -> Result<Option<Booking>> {
        let conn = self.conn.lock().await;
        let booking = conn
            .query_row(
                &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
                params![id],
                booking_from_row,
            )
            .optional()?;
        Ok(booking)
    }

    /// All confirmed bookings, ordered by start time
    pub async fn list_confirmed(&self) -> Result<Vec<Booking>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE status = 'confirmed' ORDER BY start_utc"
        ))?;
        let rows = stmt.query_map([], booking_from_row)?;
        let mut bookings = Vec::new();
        for row in rows {
            bookings.push(row?);
        }
        Ok(bookings)
    }

    /// Guarded status transition on a single row, refreshing updated_at.
    /// No coordinator lock required: the row is addressed by primary key and
    /// the source-status guard makes the transition one-way.
    pub async fn transition(
        &self,
        id: i64,
        from: BookingStatus,
        to: BookingStatus,
    ) -> Result<TransitionResult> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        let booking = tx
            .query_row(
                &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
                params![id],
                booking_from_row,
            )
            .optional()?;

        let booking = match booking {
            Some(b) => b,
            None => return Ok(TransitionResult::NotFound),
        };
        if booking.status != from {
            return Ok(TransitionResult::InvalidState(booking.status));
        }

        let now = Utc::now();
        tx.execute(
            "UPDATE bookings SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
            params![to.as_str(), now.timestamp_millis(), id, from.as_str()],
        )?;
        tx.commit()?;

        Ok(TransitionResult::Transitioned(Booking {
            status: to,
            updated_at: now,
            ..booking
        }))
    }
}

fn find_overlapping_in(
    conn: &Connection,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Option<Booking>> {
    let booking = conn
        .query_row(
            &format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings
                 WHERE start_utc < ?1 AND end_utc > ?2 AND status = 'confirmed'
                 LIMIT 1"
            ),
            params![end.timestamp_millis(), start.timestamp_millis()],
            booking_from_row,
        )
        .optional()?;
    Ok(booking)
}

fn datetime_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let ms: i64 = row.get(idx)?;
    DateTime::from_timestamp_millis(ms).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Integer,
            format!("timestamp out of range: {ms}").into(),
        )
    })
}

fn status_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<BookingStatus> {
    let s: String = row.get(idx)?;
    BookingStatus::parse(&s).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unknown booking status: {s}").into(),
        )
    })
}

fn booking_from_row(row: &Row<'_>) -> rusqlite::Result<Booking> {
    Ok(Booking {
        id: row.get(0)?,
        scientist_id: row.get(1)?,
        start_utc: datetime_col(row, 2)?,
        end_utc: datetime_col(row, 3)?,
        status: status_col(row, 4)?,
        observed_object: row.get(5)?,
        description: row.get(6)?,
        created_at: datetime_col(row, 7)?,
        updated_at: datetime_col(row, 8)?,
    })
}

fn scientist_from_row(row: &Row<'_>) -> rusqlite::Result<Scientist> {
    Ok(Scientist {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        institution: row.get(3)?,
        country: row.get(4)?,
        registered_at: datetime_col(row, 5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(hour: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, hour, min, 0).unwrap()
    }

    async fn store_with_scientist() -> (Store, i64) {
        let store = Store::open_in_memory().unwrap();
        let scientist = store
            .insert_scientist("Joao Silva", "joao@email.com", "Test Institute", Some("Brazil"))
            .await
            .unwrap();
        (store, scientist.id)
    }

    fn new_booking(scientist_id: i64, start: DateTime<Utc>, end: DateTime<Utc>) -> NewBooking {
        NewBooking {
            scientist_id,
            start_utc: start,
            end_utc: end,
            observed_object: None,
            description: None,
        }
    }

    #[tokio::test]
    async fn test_admit_then_overlap_rejected() {
        let (store, sid) = store_with_scientist().await;

        let first = store
            .admit(&new_booking(sid, ts(10, 0), ts(10, 30)))
            .await
            .unwrap();
        let first_id = match first {
            AdmitResult::Admitted(b) => b.id,
            other => panic!("expected Admitted, got {:?}", other),
        };

        let second = store
            .admit(&new_booking(sid, ts(10, 15), ts(10, 45)))
            .await
            .unwrap();
        match second {
            AdmitResult::Overlap(existing) => assert_eq!(existing.id, first_id),
            other => panic!("expected Overlap, got {:?}", other),
        }

        assert_eq!(store.list_confirmed().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_adjacent_intervals_do_not_conflict() {
        let (store, sid) = store_with_scientist().await;

        store
            .admit(&new_booking(sid, ts(10, 0), ts(10, 30)))
            .await
            .unwrap();
        let adjacent = store
            .admit(&new_booking(sid, ts(10, 30), ts(11, 0)))
            .await
            .unwrap();
        assert!(matches!(adjacent, AdmitResult::Admitted(_)));
        assert_eq!(store.list_confirmed().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_bookings_do_not_conflict() {
        let (store, sid) = store_with_scientist().await;

        let booking = match store
            .admit(&new_booking(sid, ts(10, 0), ts(10, 30)))
            .await
            .unwrap()
        {
            AdmitResult::Admitted(b) => b,
            other => panic!("expected Admitted, got {:?}", other),
        };

        store
            .transition(booking.id, BookingStatus::Confirmed, BookingStatus::Cancelled)
            .await
            .unwrap();

        assert!(store
            .find_overlapping(ts(10, 0), ts(10, 30))
            .await
            .unwrap()
            .is_none());
        let retry = store
            .admit(&new_booking(sid, ts(10, 0), ts(10, 30)))
            .await
            .unwrap();
        assert!(matches!(retry, AdmitResult::Admitted(_)));
    }

    #[tokio::test]
    async fn test_transition_guards() {
        let (store, sid) = store_with_scientist().await;

        let booking = match store
            .admit(&new_booking(sid, ts(10, 0), ts(10, 30)))
            .await
            .unwrap()
        {
            AdmitResult::Admitted(b) => b,
            other => panic!("expected Admitted, got {:?}", other),
        };

        let first = store
            .transition(booking.id, BookingStatus::Confirmed, BookingStatus::Cancelled)
            .await
            .unwrap();
        let cancelled = match first {
            TransitionResult::Transitioned(b) => b,
            other => panic!("expected Transitioned, got {:?}", other),
        };
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert!(cancelled.updated_at >= booking.updated_at);

        // Second cancel is rejected, not silently accepted
        let second = store
            .transition(booking.id, BookingStatus::Confirmed, BookingStatus::Cancelled)
            .await
            .unwrap();
        assert!(matches!(
            second,
            TransitionResult::InvalidState(BookingStatus::Cancelled)
        ));

        let missing = store
            .transition(9999, BookingStatus::Confirmed, BookingStatus::Cancelled)
            .await
            .unwrap();
        assert!(matches!(missing, TransitionResult::NotFound));
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.seed_scientists().await.unwrap(), 10);
        assert_eq!(store.seed_scientists().await.unwrap(), 0);
        let joao = store.scientist(1).await.unwrap().unwrap();
        assert_eq!(joao.email, "joao@email.com");
    }
}
