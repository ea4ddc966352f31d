pub mod smtp;

use async_trait::async_trait;

use crate::models::{BookingSnapshot, Money};

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn payment_confirmed(&self, booking: &BookingSnapshot) -> anyhow::Result<()>;

    async fn proof_received(&self, booking: &BookingSnapshot) -> anyhow::Result<()>;
}

/// Used when no SMTP relay is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn payment_confirmed(&self, booking: &BookingSnapshot) -> anyhow::Result<()> {
        tracing::info!(
            booking_id = %booking.booking_id,
            to = %booking.recipient_email,
            total = %format_currency(booking.total_fare),
            "payment confirmation (not sent, smtp disabled)"
        );
        Ok(())
    }

    async fn proof_received(&self, booking: &BookingSnapshot) -> anyhow::Result<()> {
        tracing::info!(
            booking_id = %booking.booking_id,
            to = %booking.recipient_email,
            "payment proof receipt (not sent, smtp disabled)"
        );
        Ok(())
    }
}

pub fn format_currency(amount: Money) -> String {
    format!("R{amount}")
}
