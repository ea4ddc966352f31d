use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bus {
    pub id: String,
    pub model: String,
    pub class: BusClass,
    pub capacity: i64,
}

/// Service class; selects the per-km fare rate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum BusClass {
    Luxury,
    #[serde(rename = "Semi-Luxury")]
    SemiLuxury,
    Standard,
}

impl BusClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            BusClass::Luxury => "Luxury",
            BusClass::SemiLuxury => "Semi-Luxury",
            BusClass::Standard => "Standard",
        }
    }

    /// Unknown classes fall back to Standard.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "luxury" => BusClass::Luxury,
            "semi-luxury" | "semi_luxury" | "semiluxury" => BusClass::SemiLuxury,
            _ => BusClass::Standard,
        }
    }
}
