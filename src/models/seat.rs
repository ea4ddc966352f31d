use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seat {
    pub id: String,
    pub bus_id: String,
    pub seat_number: String,
    pub seat_type: SeatType,
    pub floor: i64,
    pub row: i64,
    pub column: i64,
    pub status: SeatStatus,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SeatType {
    Window,
    Aisle,
    Middle,
}

impl SeatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatType::Window => "Window",
            SeatType::Aisle => "Aisle",
            SeatType::Middle => "Middle",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "Window" => SeatType::Window,
            "Middle" => SeatType::Middle,
            _ => SeatType::Aisle,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SeatStatus {
    Available,
    Booked,
    Reserved,
    Maintenance,
}

impl SeatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatStatus::Available => "Available",
            SeatStatus::Booked => "Booked",
            SeatStatus::Reserved => "Reserved",
            SeatStatus::Maintenance => "Maintenance",
        }
    }

    /// Unrecognised values are treated as Maintenance so they are never sold.
    pub fn parse(s: &str) -> Self {
        match s {
            "Available" => SeatStatus::Available,
            "Booked" => SeatStatus::Booked,
            "Reserved" => SeatStatus::Reserved,
            _ => SeatStatus::Maintenance,
        }
    }

    pub fn is_bookable(&self) -> bool {
        matches!(self, SeatStatus::Available)
    }
}
