use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDate;
use rusqlite::{Connection, TransactionBehavior};

use crate::db::queries;
use crate::ledger::store::{BookingStore, StoreCommand, StoreError, StoreOutcome};
use crate::models::{
    Booking, BookingSnapshot, BookingStatus, PaymentEvent, Route, ScheduleDetail, Seat,
};

/// SQLite-backed store. Every command runs inside one IMMEDIATE transaction,
/// so the write lock is taken before the first read and a failed step rolls
/// back everything before it.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("database lock poisoned".to_string()))
    }
}

impl BookingStore for SqliteStore {
    fn schedule_detail(&self, schedule_id: &str) -> Result<Option<ScheduleDetail>, StoreError> {
        let conn = self.lock()?;
        Ok(queries::get_schedule_detail(&conn, schedule_id)?)
    }

    fn seats_on_bus(&self, bus_id: &str, seat_ids: &[String]) -> Result<Vec<Seat>, StoreError> {
        let conn = self.lock()?;
        Ok(queries::get_seats_by_ids(&conn, bus_id, seat_ids)?)
    }

    fn booking(&self, booking_id: &str) -> Result<Option<Booking>, StoreError> {
        let conn = self.lock()?;
        Ok(queries::get_booking(&conn, booking_id)?)
    }

    fn find_route(&self, source: &str, destination: &str) -> Result<Option<Route>, StoreError> {
        let conn = self.lock()?;
        Ok(queries::find_route(&conn, source, destination)?)
    }

    fn schedules_on(
        &self,
        route_id: &str,
        date: NaiveDate,
        min_seats: i64,
        limit: i64,
    ) -> Result<Vec<ScheduleDetail>, StoreError> {
        let conn = self.lock()?;
        Ok(queries::find_schedules_on(
            &conn, route_id, date, min_seats, limit,
        )?)
    }

    fn snapshot(&self, booking_id: &str) -> Result<Option<BookingSnapshot>, StoreError> {
        let conn = self.lock()?;
        Ok(queries::get_booking_snapshot(&conn, booking_id)?)
    }

    fn apply(&self, command: StoreCommand) -> Result<StoreOutcome, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let outcome = match command {
            StoreCommand::ClaimSeats { booking } => {
                queries::insert_booking(&tx, &booking)?;

                for seat_id in booking.seat_ids() {
                    let claimed = queries::insert_seat_claim(
                        &tx,
                        &booking.schedule_id,
                        &seat_id,
                        &booking.id,
                        &booking.created_at,
                    )?;
                    if !claimed {
                        return Err(StoreError::SeatClaimed(seat_id));
                    }
                }

                let seats = booking.passengers.len() as i64;
                if !queries::reserve_capacity(&tx, &booking.schedule_id, seats)? {
                    return Err(StoreError::SoldOut);
                }

                StoreOutcome::Claimed
            }

            StoreCommand::ReleaseSeats { booking_id, at } => {
                let Some(booking) = queries::get_booking(&tx, &booking_id)? else {
                    return Err(StoreError::BookingMissing(booking_id));
                };
                if queries::mark_booking_cancelled(&tx, &booking_id, &at)?.is_none() {
                    return Err(StoreError::StaleBooking);
                }
                let (schedule_id, seat_ids) = release(&tx, &booking)?;
                StoreOutcome::Released {
                    schedule_id,
                    seat_ids,
                }
            }

            StoreCommand::RecordPayment {
                booking_id,
                expected,
                payment_status,
                booking_status,
                release_seats,
                reference,
                at,
            } => {
                let Some(booking) = queries::get_booking(&tx, &booking_id)? else {
                    return Err(StoreError::BookingMissing(booking_id));
                };

                let updated = queries::set_payment_status_if(
                    &tx,
                    &booking_id,
                    expected,
                    payment_status,
                    booking_status,
                    reference.as_deref(),
                    &at,
                )?;
                if !updated {
                    return Err(StoreError::StaleBooking);
                }

                queries::insert_payment_event(
                    &tx,
                    &PaymentEvent {
                        booking_id: booking_id.clone(),
                        reference,
                        status: payment_status,
                        received_at: at,
                    },
                )?;

                let released = if release_seats && booking_status == BookingStatus::Cancelled {
                    Some(release(&tx, &booking)?)
                } else {
                    None
                };
                StoreOutcome::PaymentRecorded { released }
            }

            StoreCommand::LogPayment { event } => {
                if queries::get_booking(&tx, &event.booking_id)?.is_none() {
                    return Err(StoreError::BookingMissing(event.booking_id));
                }
                queries::insert_payment_event(&tx, &event)?;
                StoreOutcome::PaymentLogged
            }
        };

        tx.commit()?;
        Ok(outcome)
    }
}

/// Drops the booking's seat claims and hands the seats back to the schedule.
fn release(conn: &Connection, booking: &Booking) -> Result<(String, Vec<String>), StoreError> {
    let released = queries::delete_seat_claims(conn, &booking.id)?;
    queries::release_capacity(conn, &booking.schedule_id, released as i64)?;
    Ok((booking.schedule_id.clone(), booking.seat_ids()))
}
