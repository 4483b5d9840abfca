//! Reservations domain module.
//!
//! Confirmed bookings (from list-price carts or accepted offers), their
//! human-shareable codes and the admin status lifecycle. Pure domain logic:
//! no IO, no HTTP, no storage.

pub mod amounts;
pub mod code;
pub mod reservation;

pub use amounts::AmountsSummary;
pub use code::ReservationCode;
pub use reservation::{
    DEFAULT_CANCELLATION_REASON, NewReservation, Reservation, ReservationItem, ReservationStatus,
};
