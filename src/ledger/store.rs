use chrono::{DateTime, NaiveDate, Utc};

use crate::models::{
    Booking, BookingSnapshot, BookingStatus, PaymentEvent, PaymentStatus, Route, ScheduleDetail,
    Seat,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("seat {0} is already booked on this schedule")]
    SeatClaimed(String),

    #[error("not enough seats left on this schedule")]
    SoldOut,

    #[error("booking was modified concurrently")]
    StaleBooking,

    #[error("booking {0} not found")]
    BookingMissing(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store error: {0}")]
    Backend(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(rusqlite::ErrorCode::DatabaseBusy) | Some(rusqlite::ErrorCode::DatabaseLocked) => {
                StoreError::Unavailable(err.to_string())
            }
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

impl From<anyhow::Error> for StoreError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<rusqlite::Error>() {
            Ok(sqlite) => StoreError::from(sqlite),
            Err(other) => StoreError::Backend(other.to_string()),
        }
    }
}

/// A write applied atomically by the store: either every effect lands or none.
#[derive(Debug, Clone)]
pub enum StoreCommand {
    /// Persist a new booking, claim each of its seats on the schedule and take
    /// the seats out of the schedule's capacity.
    ClaimSeats { booking: Booking },

    /// Cancel the booking and return its seats to the schedule.
    ReleaseSeats {
        booking_id: String,
        at: DateTime<Utc>,
    },

    /// Move the payment status from `expected` to `payment_status`. Fails with
    /// `StaleBooking` when another writer got there first.
    RecordPayment {
        booking_id: String,
        expected: PaymentStatus,
        payment_status: PaymentStatus,
        booking_status: BookingStatus,
        release_seats: bool,
        reference: Option<String>,
        at: DateTime<Utc>,
    },

    /// Append to the payment audit trail without touching the booking.
    LogPayment { event: PaymentEvent },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOutcome {
    Claimed,
    Released {
        schedule_id: String,
        seat_ids: Vec<String>,
    },
    PaymentRecorded {
        released: Option<(String, Vec<String>)>,
    },
    PaymentLogged,
}

pub trait BookingStore: Send + Sync {
    fn schedule_detail(&self, schedule_id: &str) -> Result<Option<ScheduleDetail>, StoreError>;

    fn seats_on_bus(&self, bus_id: &str, seat_ids: &[String]) -> Result<Vec<Seat>, StoreError>;

    fn booking(&self, booking_id: &str) -> Result<Option<Booking>, StoreError>;

    fn find_route(&self, source: &str, destination: &str) -> Result<Option<Route>, StoreError>;

    fn schedules_on(
        &self,
        route_id: &str,
        date: NaiveDate,
        min_seats: i64,
        limit: i64,
    ) -> Result<Vec<ScheduleDetail>, StoreError>;

    fn snapshot(&self, booking_id: &str) -> Result<Option<BookingSnapshot>, StoreError>;

    fn apply(&self, command: StoreCommand) -> Result<StoreOutcome, StoreError>;
}
