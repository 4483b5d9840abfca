//! Inventory domain module.
//!
//! Business rules for the device catalog and its stock, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage). Persistence
//! backends call into [`Device::decrement`] / [`Device::increment`] inside
//! their transactions so the floor check lives in exactly one place.

pub mod catalog;
pub mod device;

pub use catalog::{DeviceFilter, FilterOptions};
pub use device::{Device, DeviceSpec, StockError, StockShortage};
