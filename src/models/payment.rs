use chrono::{DateTime, Utc};
use serde::Serialize;

use super::PaymentStatus;

#[derive(Debug, Clone, Serialize)]
pub struct PaymentEvent {
    pub booking_id: String,
    pub reference: Option<String>,
    pub status: PaymentStatus,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentProof {
    pub id: String,
    pub booking_id: String,
    pub filename: String,
    pub path: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub uploaded_at: DateTime<Utc>,
}
