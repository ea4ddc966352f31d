pub mod booking;
pub mod bus;
pub mod money;
pub mod payment;
pub mod route;
pub mod schedule;
pub mod seat;
pub mod user;

pub use booking::{
    Booking, BookingSnapshot, BookingStatus, BookingSummary, Gender, Passenger, PaymentStatus,
};
pub use bus::{Bus, BusClass};
pub use money::Money;
pub use payment::{PaymentEvent, PaymentProof};
pub use route::{BusStop, Route};
pub use schedule::{Schedule, ScheduleDetail};
pub use seat::{Seat, SeatStatus, SeatType};
pub use user::User;
