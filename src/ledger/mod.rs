//! The booking ledger owns the booking lifecycle: seat claims on a schedule,
//! fares, cancellation, and the payment status transitions that confirm or
//! cancel a booking. Persistence goes through [`BookingStore`]; every write is
//! one [`StoreCommand`] applied atomically.

pub mod fare;
pub mod rules;
pub mod store;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::models::{
    Booking, BookingStatus, BusClass, Gender, Money, Passenger, PaymentEvent, PaymentStatus,
    ScheduleDetail,
};
use crate::services::notify::Notifier;

use fare::FareTable;
use rules::PaymentTransition;
use store::{BookingStore, StoreCommand, StoreError, StoreOutcome};

pub const SEARCH_PAGE_SIZE: i64 = 10;

const PAYMENT_UPDATE_ATTEMPTS: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("schedule {0} not found")]
    ScheduleNotFound(String),

    #[error("schedule has already departed")]
    ScheduleExpired,

    #[error("seat {0} does not belong to this bus")]
    SeatInvalid(String),

    #[error("seat {0} is not available")]
    SeatUnavailable(String),

    #[error("fare mismatch: expected {expected}, got {declared}")]
    FareMismatch { declared: Money, expected: Money },

    #[error("booking {0} not found")]
    BookingNotFound(String),

    #[error("booking is already cancelled")]
    AlreadyCancelled,

    #[error("payment completed for cancelled booking {0}")]
    PaidAfterCancellation(String),

    #[error("too close to departure to cancel this booking")]
    CancellationWindowClosed,

    #[error("payment cannot move from {} to {}", .from.as_str(), .to.as_str())]
    InvalidPaymentTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::SeatClaimed(seat_id) => LedgerError::SeatUnavailable(seat_id),
            StoreError::SoldOut => LedgerError::SeatUnavailable("capacity".to_string()),
            StoreError::BookingMissing(id) => LedgerError::BookingNotFound(id),
            other => LedgerError::Store(other),
        }
    }
}

/// Business policy handed to the ledger at construction.
#[derive(Debug, Clone)]
pub struct LedgerPolicy {
    pub fares: FareTable,
    pub cancellation_window: Duration,
    /// Cancel an unpaid booking when the gateway abandons its payment.
    pub cancel_on_payment_failure: bool,
    pub notify_timeout: std::time::Duration,
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        Self {
            fares: FareTable::default(),
            cancellation_window: Duration::hours(24),
            cancel_on_payment_failure: true,
            notify_timeout: std::time::Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPassenger {
    pub first_name: String,
    pub last_name: String,
    pub age: i64,
    pub gender: Gender,
    pub seat_id: String,
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_id: String,
    pub bus_id: String,
    pub schedule_id: String,
    pub passengers: Vec<NewPassenger>,
    pub declared_fare: Money,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleOffer {
    pub schedule_id: String,
    pub bus_id: String,
    pub bus_model: String,
    pub bus_class: BusClass,
    pub departure_at: DateTime<Utc>,
    pub departure_date: NaiveDate,
    pub departure_time: String,
    pub arrival_time: String,
    pub seats_available: i64,
    pub estimated_time: String,
    pub fare: Money,
    pub total_fare: Money,
    pub from_location: String,
    pub to_location: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SeatEvent {
    SeatClaimed {
        schedule_id: String,
        seat_ids: Vec<String>,
    },
    SeatReleased {
        schedule_id: String,
        seat_ids: Vec<String>,
    },
}

impl SeatEvent {
    pub fn schedule_id(&self) -> &str {
        match self {
            SeatEvent::SeatClaimed { schedule_id, .. } => schedule_id,
            SeatEvent::SeatReleased { schedule_id, .. } => schedule_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SeatEvent::SeatClaimed { .. } => "seat_claimed",
            SeatEvent::SeatReleased { .. } => "seat_released",
        }
    }
}

pub struct Ledger {
    store: Arc<dyn BookingStore>,
    notifier: Arc<dyn Notifier>,
    policy: LedgerPolicy,
    seat_events: broadcast::Sender<SeatEvent>,
}

impl Ledger {
    pub fn new(
        store: Arc<dyn BookingStore>,
        notifier: Arc<dyn Notifier>,
        policy: LedgerPolicy,
    ) -> Self {
        let (seat_events, _) = broadcast::channel(256);
        Self {
            store,
            notifier,
            policy,
            seat_events,
        }
    }

    pub fn policy(&self) -> &LedgerPolicy {
        &self.policy
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SeatEvent> {
        self.seat_events.subscribe()
    }

    fn publish(&self, event: SeatEvent) {
        // no subscribers is fine
        let _ = self.seat_events.send(event);
    }

    /// Fare for `seats` seats on this schedule's route and bus class.
    pub fn quote(&self, detail: &ScheduleDetail, seats: usize) -> Money {
        self.policy
            .fares
            .total(detail.route.distance_km, detail.bus.class, seats)
    }

    // ── Bookings ──

    pub fn create_booking(&self, request: NewBooking) -> Result<Booking, LedgerError> {
        self.create_booking_at(request, Utc::now())
    }

    pub fn create_booking_at(
        &self,
        request: NewBooking,
        now: DateTime<Utc>,
    ) -> Result<Booking, LedgerError> {
        rules::validate_passengers(&request.passengers)?;

        let detail = self
            .store
            .schedule_detail(&request.schedule_id)?
            .ok_or_else(|| LedgerError::ScheduleNotFound(request.schedule_id.clone()))?;

        if detail.schedule.bus_id != request.bus_id {
            return Err(LedgerError::Validation(format!(
                "bus {} does not run schedule {}",
                request.bus_id, request.schedule_id
            )));
        }
        if detail.schedule.departure_at <= now {
            return Err(LedgerError::ScheduleExpired);
        }

        let seat_ids: Vec<String> = request
            .passengers
            .iter()
            .map(|p| p.seat_id.clone())
            .collect();
        let seats: HashMap<String, _> = self
            .store
            .seats_on_bus(&request.bus_id, &seat_ids)?
            .into_iter()
            .map(|seat| (seat.id.clone(), seat))
            .collect();

        let mut passengers = Vec::with_capacity(request.passengers.len());
        for p in request.passengers {
            let Some(seat) = seats.get(&p.seat_id) else {
                return Err(LedgerError::SeatInvalid(p.seat_id));
            };
            if !seat.status.is_bookable() {
                return Err(LedgerError::SeatUnavailable(seat.seat_number.clone()));
            }
            passengers.push(Passenger {
                first_name: p.first_name.trim().to_string(),
                last_name: p.last_name.trim().to_string(),
                age: p.age,
                gender: p.gender,
                seat_number: seat.seat_number.clone(),
                seat_id: p.seat_id,
            });
        }

        let expected = self.quote(&detail, passengers.len());
        rules::check_fare(request.declared_fare, expected)?;

        let booking = Booking {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: request.user_id,
            bus_id: request.bus_id,
            schedule_id: request.schedule_id,
            passengers,
            total_fare: expected,
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_id: None,
            created_at: now,
            updated_at: now,
        };

        self.store.apply(StoreCommand::ClaimSeats {
            booking: booking.clone(),
        })?;

        tracing::info!(
            booking_id = %booking.id,
            schedule_id = %booking.schedule_id,
            seats = booking.passengers.len(),
            total = %booking.total_fare,
            "booking created"
        );
        self.publish(SeatEvent::SeatClaimed {
            schedule_id: booking.schedule_id.clone(),
            seat_ids: booking.seat_ids(),
        });

        Ok(booking)
    }

    /// The booking, if it exists and belongs to `user_id`.
    pub fn booking_for(&self, booking_id: &str, user_id: &str) -> Result<Booking, LedgerError> {
        match self.store.booking(booking_id)? {
            Some(booking) if booking.user_id == user_id => Ok(booking),
            _ => Err(LedgerError::BookingNotFound(booking_id.to_string())),
        }
    }

    pub fn cancel_booking(&self, booking_id: &str, actor: &str) -> Result<Booking, LedgerError> {
        self.cancel_booking_at(booking_id, actor, Utc::now())
    }

    pub fn cancel_booking_at(
        &self,
        booking_id: &str,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<Booking, LedgerError> {
        let booking = self.booking_for(booking_id, actor)?;
        let detail = self
            .store
            .schedule_detail(&booking.schedule_id)?
            .ok_or_else(|| LedgerError::ScheduleNotFound(booking.schedule_id.clone()))?;

        rules::check_cancellable(
            &booking,
            detail.schedule.departure_at,
            now,
            self.policy.cancellation_window,
        )?;

        let outcome = match self.store.apply(StoreCommand::ReleaseSeats {
            booking_id: booking_id.to_string(),
            at: now,
        }) {
            Ok(outcome) => outcome,
            // lost a race with another cancellation
            Err(StoreError::StaleBooking) => return Err(LedgerError::AlreadyCancelled),
            Err(e) => return Err(e.into()),
        };

        if let StoreOutcome::Released {
            schedule_id,
            seat_ids,
        } = outcome
        {
            self.publish(SeatEvent::SeatReleased {
                schedule_id,
                seat_ids,
            });
        }
        tracing::info!(booking_id = %booking_id, "booking cancelled");

        self.store
            .booking(booking_id)?
            .ok_or_else(|| LedgerError::BookingNotFound(booking_id.to_string()))
    }

    // ── Payments ──

    /// Applies a payment status reported by the gateway or the client.
    ///
    /// Safe under at-least-once delivery: the write is a compare-and-set on
    /// the payment status read just before it, and only the update that moves
    /// the booking into Completed sends the confirmation. A completed payment
    /// for a booking that is already cancelled is kept in the payment log for
    /// a refund and reported as `PaidAfterCancellation`.
    pub async fn update_payment_status(
        &self,
        booking_id: &str,
        next: PaymentStatus,
        reference: Option<String>,
    ) -> Result<Booking, LedgerError> {
        let result = self
            .record_payment(booking_id, reference.clone(), |booking| {
                rules::payment_transition(booking, next)
            })
            .await;

        if let Err(LedgerError::PaidAfterCancellation(_)) = &result {
            tracing::error!(
                booking_id = %booking_id,
                reference = reference.as_deref().unwrap_or(""),
                "payment completed for a cancelled booking, refund required"
            );
            self.store.apply(StoreCommand::LogPayment {
                event: PaymentEvent {
                    booking_id: booking_id.to_string(),
                    reference,
                    status: PaymentStatus::Completed,
                    received_at: Utc::now(),
                },
            })?;
        }
        result
    }

    /// The gateway will not collect payment for this booking any more. With
    /// `cancel_on_payment_failure` an unpaid booking is cancelled and its seats
    /// released; otherwise the failure is only recorded.
    pub async fn abandon_payment(
        &self,
        booking_id: &str,
        reference: Option<String>,
    ) -> Result<Booking, LedgerError> {
        if !self.policy.cancel_on_payment_failure {
            return self
                .update_payment_status(booking_id, PaymentStatus::Failed, reference)
                .await;
        }
        self.record_payment(booking_id, reference, rules::abandon_transition)
            .await
    }

    async fn record_payment<F>(
        &self,
        booking_id: &str,
        reference: Option<String>,
        decide: F,
    ) -> Result<Booking, LedgerError>
    where
        F: Fn(&Booking) -> Result<PaymentTransition, LedgerError>,
    {
        for _ in 0..PAYMENT_UPDATE_ATTEMPTS {
            let booking = self
                .store
                .booking(booking_id)?
                .ok_or_else(|| LedgerError::BookingNotFound(booking_id.to_string()))?;

            let (payment_status, booking_status, release_seats, confirms) =
                match decide(&booking)? {
                    PaymentTransition::Unchanged => {
                        tracing::info!(
                            booking_id = %booking_id,
                            payment_status = booking.payment_status.as_str(),
                            "payment status unchanged, ignoring repeat update"
                        );
                        return Ok(booking);
                    }
                    PaymentTransition::Apply {
                        payment_status,
                        booking_status,
                        release_seats,
                        confirms,
                    } => (payment_status, booking_status, release_seats, confirms),
                };

            let outcome = match self.store.apply(StoreCommand::RecordPayment {
                booking_id: booking_id.to_string(),
                expected: booking.payment_status,
                payment_status,
                booking_status,
                release_seats,
                reference: reference.clone(),
                at: Utc::now(),
            }) {
                Ok(outcome) => outcome,
                Err(StoreError::StaleBooking) => {
                    tracing::debug!(booking_id = %booking_id, "payment update raced, re-reading");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            if let StoreOutcome::PaymentRecorded {
                released: Some((schedule_id, seat_ids)),
            } = outcome
            {
                self.publish(SeatEvent::SeatReleased {
                    schedule_id,
                    seat_ids,
                });
            }

            tracing::info!(
                booking_id = %booking_id,
                payment_status = payment_status.as_str(),
                status = booking_status.as_str(),
                "payment status updated"
            );

            if confirms {
                self.send_confirmation(booking_id).await;
            }

            return self
                .store
                .booking(booking_id)?
                .ok_or_else(|| LedgerError::BookingNotFound(booking_id.to_string()));
        }

        Err(LedgerError::Store(StoreError::StaleBooking))
    }

    async fn send_confirmation(&self, booking_id: &str) {
        let snapshot = match self.store.snapshot(booking_id) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                tracing::warn!(booking_id = %booking_id, "no snapshot for confirmation");
                return;
            }
            Err(e) => {
                tracing::error!(booking_id = %booking_id, error = %e, "failed to load booking snapshot");
                return;
            }
        };

        match tokio::time::timeout(
            self.policy.notify_timeout,
            self.notifier.payment_confirmed(&snapshot),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!(booking_id = %booking_id, error = %e, "failed to send confirmation")
            }
            Err(_) => tracing::error!(booking_id = %booking_id, "confirmation send timed out"),
        }
    }

    // ── Search ──

    pub fn search_schedules(
        &self,
        source: &str,
        destination: &str,
        date: NaiveDate,
        passengers: i64,
    ) -> Result<Vec<ScheduleOffer>, LedgerError> {
        if passengers < 1 {
            return Err(LedgerError::Validation(
                "passengers must be at least 1".to_string(),
            ));
        }

        let Some(route) = self.store.find_route(source, destination)? else {
            return Ok(vec![]);
        };

        let schedules = self
            .store
            .schedules_on(&route.id, date, passengers, SEARCH_PAGE_SIZE)?;

        Ok(schedules
            .into_iter()
            .map(|detail| {
                let fare = self.quote(&detail, 1);
                ScheduleOffer {
                    schedule_id: detail.schedule.id,
                    bus_id: detail.bus.id,
                    bus_model: detail.bus.model,
                    bus_class: detail.bus.class,
                    departure_at: detail.schedule.departure_at,
                    departure_date: detail.schedule.departure_at.date_naive(),
                    departure_time: detail.schedule.departure_at.format("%H:%M").to_string(),
                    arrival_time: detail.schedule.arrival_time,
                    seats_available: detail.schedule.seats_available,
                    estimated_time: detail.route.estimated_time,
                    fare,
                    total_fare: fare * passengers,
                    from_location: detail.route.source,
                    to_location: detail.route.destination,
                }
            })
            .collect())
    }
}
