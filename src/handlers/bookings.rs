use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use super::require_user;
use crate::db::queries::{self, BookingFilter};
use crate::errors::AppError;
use crate::ledger::{NewBooking, NewPassenger};
use crate::models::{Booking, BookingSummary, Money, PaymentStatus};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateBookingRequest {
    bus_id: String,
    schedule_id: String,
    passengers: Vec<NewPassenger>,
    total_fare: Money,
}

// POST /api/bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let user = require_user(&state, &headers)?;

    let booking = state
        .ledger
        .create_booking(NewBooking {
            user_id: user.id,
            bus_id: req.bus_id,
            schedule_id: req.schedule_id,
            passengers: req.passengers,
            declared_fare: req.total_fare,
        })
        .inspect_err(|e| tracing::info!(error = %e, "booking rejected"))?;

    Ok((StatusCode::CREATED, Json(booking)))
}

fn list(
    state: &AppState,
    headers: &HeaderMap,
    filter: BookingFilter,
) -> Result<Json<Vec<BookingSummary>>, AppError> {
    let user = require_user(state, headers)?;
    let db = state.conn()?;
    let bookings = queries::get_bookings_for_user(&db, &user.id, filter, &Utc::now())?;
    Ok(Json(bookings))
}

// GET /api/bookings
pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<BookingSummary>>, AppError> {
    list(&state, &headers, BookingFilter::All)
}

// GET /api/bookings/active
pub async fn active_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<BookingSummary>>, AppError> {
    list(&state, &headers, BookingFilter::Active)
}

// GET /api/bookings/past
pub async fn past_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<BookingSummary>>, AppError> {
    list(&state, &headers, BookingFilter::Past)
}

// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    let user = require_user(&state, &headers)?;
    Ok(Json(state.ledger.booking_for(&id, &user.id)?))
}

// POST /api/bookings/:id/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    let user = require_user(&state, &headers)?;
    let booking = state
        .ledger
        .cancel_booking(&id, &user.id)
        .inspect_err(|e| tracing::info!(booking_id = %id, error = %e, "cancellation rejected"))?;
    Ok(Json(booking))
}

#[derive(Deserialize)]
pub struct PaymentConfirmation {
    status: PaymentStatus,
    payment_id: Option<String>,
}

// POST /api/bookings/:id/payment
pub async fn confirm_payment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<PaymentConfirmation>,
) -> Result<Json<Booking>, AppError> {
    let user = require_user(&state, &headers)?;
    state.ledger.booking_for(&id, &user.id)?;

    let reference = req.payment_id.filter(|r| !r.trim().is_empty());
    let booking = state
        .ledger
        .update_payment_status(&id, req.status, reference)
        .await?;
    Ok(Json(booking))
}
