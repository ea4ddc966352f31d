//! State transition rules for bookings. Nothing in here touches the store.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};

use super::{LedgerError, NewPassenger};
use crate::models::{Booking, BookingStatus, Money, PaymentStatus};

pub fn validate_passengers(passengers: &[NewPassenger]) -> Result<(), LedgerError> {
    if passengers.is_empty() {
        return Err(LedgerError::Validation(
            "at least one passenger is required".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for (i, p) in passengers.iter().enumerate() {
        if p.first_name.trim().is_empty() || p.last_name.trim().is_empty() {
            return Err(LedgerError::Validation(format!(
                "passenger {} needs a first and last name",
                i + 1
            )));
        }
        if p.age < 1 {
            return Err(LedgerError::Validation(format!(
                "passenger {} has an invalid age",
                i + 1
            )));
        }
        if p.seat_id.trim().is_empty() {
            return Err(LedgerError::Validation(format!(
                "passenger {} has no seat",
                i + 1
            )));
        }
        if !seen.insert(p.seat_id.as_str()) {
            return Err(LedgerError::Validation(format!(
                "seat {} is listed more than once",
                p.seat_id
            )));
        }
    }
    Ok(())
}

pub fn check_fare(declared: Money, expected: Money) -> Result<(), LedgerError> {
    if declared != expected {
        return Err(LedgerError::FareMismatch { declared, expected });
    }
    Ok(())
}

/// A booking may be cancelled until `window` before departure. Exactly
/// `window` left is already too late.
pub fn check_cancellable(
    booking: &Booking,
    departure_at: DateTime<Utc>,
    now: DateTime<Utc>,
    window: Duration,
) -> Result<(), LedgerError> {
    if booking.status == BookingStatus::Cancelled {
        return Err(LedgerError::AlreadyCancelled);
    }
    if departure_at - now <= window {
        return Err(LedgerError::CancellationWindowClosed);
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentTransition {
    /// Already in the requested state; nothing to write or send.
    Unchanged,
    Apply {
        payment_status: PaymentStatus,
        booking_status: BookingStatus,
        release_seats: bool,
        confirms: bool,
    },
}

/// How a reported payment status moves the booking. A failed attempt leaves
/// the booking open for another try; only a completed payment confirms it.
pub fn payment_transition(
    booking: &Booking,
    next: PaymentStatus,
) -> Result<PaymentTransition, LedgerError> {
    if booking.status == BookingStatus::Cancelled {
        return Err(match next {
            PaymentStatus::Completed => LedgerError::PaidAfterCancellation(booking.id.clone()),
            _ => LedgerError::AlreadyCancelled,
        });
    }

    match (booking.payment_status, next) {
        (PaymentStatus::Completed, PaymentStatus::Completed) => Ok(PaymentTransition::Unchanged),
        (PaymentStatus::Completed, to) => Err(LedgerError::InvalidPaymentTransition {
            from: PaymentStatus::Completed,
            to,
        }),
        (_, PaymentStatus::Completed) => Ok(PaymentTransition::Apply {
            payment_status: PaymentStatus::Completed,
            booking_status: BookingStatus::Confirmed,
            release_seats: false,
            confirms: true,
        }),
        (from, to) if from == to => Ok(PaymentTransition::Unchanged),
        (_, to) => Ok(PaymentTransition::Apply {
            payment_status: to,
            booking_status: booking.status,
            release_seats: false,
            confirms: false,
        }),
    }
}

/// The gateway has given up on collecting payment. An unpaid booking is
/// cancelled and its seats go back to the schedule.
pub fn abandon_transition(booking: &Booking) -> Result<PaymentTransition, LedgerError> {
    if booking.status == BookingStatus::Cancelled {
        return Ok(PaymentTransition::Unchanged);
    }
    if booking.payment_status == PaymentStatus::Completed {
        return Err(LedgerError::InvalidPaymentTransition {
            from: PaymentStatus::Completed,
            to: PaymentStatus::Failed,
        });
    }
    Ok(PaymentTransition::Apply {
        payment_status: PaymentStatus::Failed,
        booking_status: BookingStatus::Cancelled,
        release_seats: true,
        confirms: false,
    })
}
