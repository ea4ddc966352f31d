use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Money;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub user_id: String,
    pub bus_id: String,
    pub schedule_id: String,
    pub passengers: Vec<Passenger>,
    pub total_fare: Money,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn seat_ids(&self) -> Vec<String> {
        self.passengers.iter().map(|p| p.seat_id.clone()).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Passenger {
    pub first_name: String,
    pub last_name: String,
    pub age: i64,
    pub gender: Gender,
    pub seat_id: String,
    pub seat_number: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Gender {
    M,
    F,
    O,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::M => "M",
            Gender::F => "F",
            Gender::O => "O",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "M" => Gender::M,
            "F" => Gender::F,
            _ => Gender::O,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "Pending",
            BookingStatus::Confirmed => "Confirmed",
            BookingStatus::Cancelled => "Cancelled",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "Confirmed" => BookingStatus::Confirmed,
            "Cancelled" => BookingStatus::Cancelled,
            _ => BookingStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Completed => "Completed",
            PaymentStatus::Failed => "Failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "Completed" => PaymentStatus::Completed,
            "Failed" => PaymentStatus::Failed,
            _ => PaymentStatus::Pending,
        }
    }
}

/// A booking joined with the journey it belongs to, for listings.
#[derive(Debug, Clone, Serialize)]
pub struct BookingSummary {
    #[serde(flatten)]
    pub booking: Booking,
    pub departure_at: DateTime<Utc>,
    pub from_location: String,
    pub to_location: String,
    pub bus_model: String,
}

/// Everything a notification about a booking needs, resolved in one read.
#[derive(Debug, Clone, Serialize)]
pub struct BookingSnapshot {
    pub booking_id: String,
    pub recipient_email: String,
    pub recipient_first_name: String,
    pub from_location: String,
    pub to_location: String,
    pub departure_at: DateTime<Utc>,
    pub passengers: Vec<Passenger>,
    pub total_fare: Money,
    pub payment_status: PaymentStatus,
    pub payment_id: Option<String>,
}
