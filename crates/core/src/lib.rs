//! `storefront-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the domain error model, money and customer contact details.

pub mod customer;
pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use customer::Customer;
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{DeviceId, OfferId, ReservationId};
pub use value_object::{ensure_positive_quantity, Money, ValueObject};
