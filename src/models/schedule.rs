use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Bus, Route};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: String,
    pub route_id: String,
    pub bus_id: String,
    pub departure_at: DateTime<Utc>,
    pub arrival_time: String,
    pub seats_available: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleDetail {
    #[serde(flatten)]
    pub schedule: Schedule,
    pub route: Route,
    pub bus: Bus,
}
