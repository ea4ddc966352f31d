use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use super::require_user;
use crate::db::queries;
use crate::errors::AppError;
use crate::ledger::store::StoreError;
use crate::ledger::LedgerError;
use crate::models::{BookingStatus, PaymentProof, PaymentStatus};
use crate::services::payments::signature::{verify_stripe_signature, DEFAULT_TOLERANCE_SECS};
use crate::services::payments::stripe::StripeEvent;
use crate::services::payments::PaymentIntent;
use crate::services::proofs;
use crate::state::AppState;

fn ensure_payable(status: BookingStatus, payment_status: PaymentStatus) -> Result<(), AppError> {
    if status == BookingStatus::Cancelled {
        return Err(AppError::Conflict("booking is cancelled".to_string()));
    }
    if payment_status == PaymentStatus::Completed {
        return Err(AppError::Conflict("booking is already paid".to_string()));
    }
    Ok(())
}

#[derive(Deserialize)]
pub struct CreateIntentRequest {
    booking_id: String,
}

// POST /api/payments/create-intent
pub async fn create_intent(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateIntentRequest>,
) -> Result<Json<PaymentIntent>, AppError> {
    let user = require_user(&state, &headers)?;
    let booking = state.ledger.booking_for(&req.booking_id, &user.id)?;
    ensure_payable(booking.status, booking.payment_status)?;

    let intent = state
        .payments
        .create_intent(booking.total_fare, &booking.id, &user.id)
        .await
        .map_err(|e| AppError::Gateway(e.to_string()))?;

    tracing::info!(
        booking_id = %booking.id,
        payment_intent_id = %intent.payment_intent_id,
        amount = %booking.total_fare,
        "payment intent created"
    );
    Ok(Json(intent))
}

fn acknowledged() -> Response {
    (StatusCode::OK, Json(serde_json::json!({ "received": true }))).into_response()
}

fn rejected(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

// POST /api/payments/webhook
pub async fn stripe_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    // Skip signature validation when no webhook secret is configured (dev mode)
    if !state.config.stripe_webhook_secret.is_empty() {
        let signature = headers
            .get("stripe-signature")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        if let Err(e) = verify_stripe_signature(
            &state.config.stripe_webhook_secret,
            signature,
            &body,
            chrono::Utc::now().timestamp(),
            DEFAULT_TOLERANCE_SECS,
        ) {
            tracing::warn!(error = %e, "rejected webhook signature");
            return rejected(StatusCode::BAD_REQUEST, "invalid signature");
        }
    }

    let event: StripeEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "unparseable webhook payload");
            return rejected(StatusCode::BAD_REQUEST, "invalid payload");
        }
    };

    let kind = event.kind.as_str();
    if !matches!(
        kind,
        "payment_intent.succeeded" | "payment_intent.payment_failed" | "payment_intent.canceled"
    ) {
        tracing::debug!(event_id = %event.id, kind = %kind, "ignoring webhook event");
        return acknowledged();
    }

    let intent = event.data.object;
    let Some(booking_id) = intent.booking_id() else {
        tracing::warn!(event_id = %event.id, intent = %intent.id, "webhook intent has no booking_id");
        return acknowledged();
    };

    tracing::info!(
        event_id = %event.id,
        booking_id = %booking_id,
        kind = %kind,
        "payment webhook"
    );

    let reference = Some(intent.id.clone());
    let result = match kind {
        "payment_intent.succeeded" => {
            state
                .ledger
                .update_payment_status(booking_id, PaymentStatus::Completed, reference)
                .await
        }
        // a declined attempt; the intent stays open for a retry
        "payment_intent.payment_failed" => {
            state
                .ledger
                .update_payment_status(booking_id, PaymentStatus::Failed, reference)
                .await
        }
        _ => state.ledger.abandon_payment(booking_id, reference).await,
    };

    match result {
        Ok(_) => acknowledged(),
        Err(LedgerError::Store(StoreError::Unavailable(msg))) => {
            tracing::error!(booking_id = %booking_id, error = %msg, "store unavailable, asking for redelivery");
            rejected(StatusCode::SERVICE_UNAVAILABLE, "temporarily unavailable")
        }
        // already logged and kept in the payment log for a refund
        Err(LedgerError::PaidAfterCancellation(_)) => acknowledged(),
        Err(e) => {
            tracing::warn!(booking_id = %booking_id, error = %e, "webhook update not applied");
            acknowledged()
        }
    }
}

#[derive(Deserialize)]
pub struct UploadProofRequest {
    booking_id: String,
    filename: String,
    content_type: String,
    data: String,
}

// POST /api/payments/upload-proof
pub async fn upload_proof(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<UploadProofRequest>,
) -> Result<(StatusCode, Json<PaymentProof>), AppError> {
    let user = require_user(&state, &headers)?;
    let booking = state.ledger.booking_for(&req.booking_id, &user.id)?;
    ensure_payable(booking.status, booking.payment_status)?;

    let ext = proofs::check_type(&req.filename, &req.content_type)?;
    let bytes = proofs::decode(&req.data, state.config.max_proof_bytes)?;
    let proof = proofs::store(
        &state.config.upload_dir,
        &booking.id,
        &ext,
        &req.content_type,
        &bytes,
    )
    .await?;

    let snapshot = {
        let db = state.conn()?;
        queries::insert_payment_proof(&db, &proof)?;
        queries::get_booking_snapshot(&db, &booking.id)?
    };

    if let Some(snapshot) = snapshot {
        let timeout = state.ledger.policy().notify_timeout;
        match tokio::time::timeout(timeout, state.notifier.proof_received(&snapshot)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!(booking_id = %booking.id, error = %e, "failed to send proof receipt")
            }
            Err(_) => tracing::error!(booking_id = %booking.id, "proof receipt send timed out"),
        }
    }

    Ok((StatusCode::CREATED, Json(proof)))
}
