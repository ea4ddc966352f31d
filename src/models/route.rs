use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub id: String,
    pub source: String,
    pub destination: String,
    pub distance_km: f64,
    pub estimated_time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusStop {
    pub id: String,
    pub route_id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub stop_order: i64,
    pub arrival_time: String,
    pub departure_time: String,
}
