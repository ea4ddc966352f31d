use crate::models::{BusClass, Money};

/// Per-kilometre rates keyed by bus class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FareTable {
    pub luxury: f64,
    pub semi_luxury: f64,
    pub standard: f64,
}

impl Default for FareTable {
    fn default() -> Self {
        Self {
            luxury: 2.5,
            semi_luxury: 2.0,
            standard: 1.5,
        }
    }
}

impl FareTable {
    pub fn rate(&self, class: BusClass) -> f64 {
        match class {
            BusClass::Luxury => self.luxury,
            BusClass::SemiLuxury => self.semi_luxury,
            BusClass::Standard => self.standard,
        }
    }

    /// Fare for one seat, rounded to the cent.
    pub fn per_seat(&self, distance_km: f64, class: BusClass) -> Money {
        Money::from_amount(distance_km * self.rate(class))
    }

    pub fn total(&self, distance_km: f64, class: BusClass, seats: usize) -> Money {
        self.per_seat(distance_km, class) * seats as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_fare_for_twenty_km() {
        let fares = FareTable::default();
        assert_eq!(fares.per_seat(20.0, BusClass::Standard), Money::from_cents(3000));
        assert_eq!(fares.total(20.0, BusClass::Standard, 2), Money::from_cents(6000));
    }

    #[test]
    fn test_rate_by_class() {
        let fares = FareTable::default();
        assert_eq!(fares.per_seat(42.5, BusClass::Luxury).to_string(), "106.25");
        assert_eq!(fares.per_seat(42.5, BusClass::SemiLuxury).to_string(), "85.00");
        assert_eq!(fares.per_seat(42.5, BusClass::Standard).to_string(), "63.75");
    }

    #[test]
    fn test_per_seat_rounds_before_multiplying() {
        let fares = FareTable {
            luxury: 2.5,
            semi_luxury: 2.0,
            standard: 1.333,
        };
        // 13.33 per seat
        assert_eq!(fares.total(10.0, BusClass::Standard, 3), Money::from_cents(3999));
    }
}
