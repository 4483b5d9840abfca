//! Persistence for the storefront ledgers.
//!
//! Reads go straight through [`Store`]. Every write runs inside a
//! [`StoreTransaction`] obtained from [`Store::begin`]; nothing is visible to
//! other readers until [`StoreTransaction::commit`], and dropping or rolling
//! back a transaction discards all of its writes.
//!
//! Two backends:
//! - [`InMemoryStore`]: tests/dev. One transaction at a time (global mutex).
//! - [`PostgresStore`]: `sqlx` transactions with row locks on the devices and
//!   offers they touch.

mod in_memory;
mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use storefront_core::{DeviceId, OfferId, ReservationId};
use storefront_inventory::{Device, DeviceFilter, StockShortage};
use storefront_offers::{Offer, OfferStatus};
use storefront_reservations::{Reservation, ReservationCode};

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;

/// Store operation error.
///
/// These are infrastructure errors; business-rule failures are detected by the
/// domain types before anything reaches the store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{0}")]
    InsufficientStock(StockShortage),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(String),
}

impl StoreError {
    pub fn device_not_found(id: &DeviceId) -> Self {
        Self::NotFound {
            entity: "device",
            id: id.to_string(),
        }
    }

    pub fn offer_not_found(id: OfferId) -> Self {
        Self::NotFound {
            entity: "offer",
            id: id.to_string(),
        }
    }

    pub fn reservation_not_found(id: ReservationId) -> Self {
        Self::NotFound {
            entity: "reservation",
            id: id.to_string(),
        }
    }
}

/// Read access plus the entry point for transactional writes.
#[async_trait]
pub trait Store: Send + Sync {
    /// Start a write transaction.
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;

    async fn device(&self, id: &DeviceId) -> Result<Option<Device>, StoreError>;

    /// Devices matching `filter`, newest first.
    async fn devices(&self, filter: &DeviceFilter) -> Result<Vec<Device>, StoreError>;

    async fn offer(&self, id: OfferId) -> Result<Option<Offer>, StoreError>;

    /// Offers newest first, optionally restricted to one status.
    async fn offers(&self, status: Option<OfferStatus>) -> Result<Vec<Offer>, StoreError>;

    async fn reservation(&self, id: ReservationId) -> Result<Option<Reservation>, StoreError>;

    /// Reservations (with items) newest first.
    async fn reservations(&self) -> Result<Vec<Reservation>, StoreError>;

    /// The reservation created when `offer_id` was accepted, if any.
    async fn reservation_by_offer(
        &self,
        offer_id: OfferId,
    ) -> Result<Option<Reservation>, StoreError>;
}

/// A unit of work over devices, offers and reservations.
///
/// Methods ending in `_for_update` lock the returned row until the
/// transaction ends, so read-check-write sequences on it are serialized.
#[async_trait]
pub trait StoreTransaction: Send {
    async fn device_for_update(&mut self, id: &DeviceId) -> Result<Device, StoreError>;

    /// Insert or replace a catalog entry.
    async fn upsert_device(&mut self, device: &Device) -> Result<(), StoreError>;

    /// Subtract `quantity` from stock. `NotFound` if the device is absent,
    /// `InsufficientStock` if `stock < quantity` (nothing is changed then).
    async fn decrement_stock(&mut self, id: &DeviceId, quantity: i64) -> Result<(), StoreError>;

    /// Unconditionally add `quantity` back to stock.
    async fn increment_stock(&mut self, id: &DeviceId, quantity: i64) -> Result<(), StoreError>;

    async fn insert_offer(&mut self, offer: &Offer) -> Result<(), StoreError>;

    async fn offer_for_update(&mut self, id: OfferId) -> Result<Offer, StoreError>;

    /// Persist the status and rejection reason of `offer`.
    async fn update_offer(&mut self, offer: &Offer) -> Result<(), StoreError>;

    /// Pending offers on `device_id` other than `exclude`, locked.
    async fn pending_offers_for_device(
        &mut self,
        device_id: &DeviceId,
        exclude: OfferId,
    ) -> Result<Vec<Offer>, StoreError>;

    async fn reservation_code_exists(&mut self, code: &ReservationCode) -> Result<bool, StoreError>;

    /// Insert a reservation together with its items.
    async fn insert_reservation(&mut self, reservation: &Reservation) -> Result<(), StoreError>;

    async fn reservation_for_update(&mut self, id: ReservationId)
    -> Result<Reservation, StoreError>;

    /// Persist the status and cancellation reason of `reservation`.
    async fn update_reservation(&mut self, reservation: &Reservation) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

#[async_trait]
impl<S> Store for Arc<S>
where
    S: Store + ?Sized,
{
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        (**self).begin().await
    }

    async fn device(&self, id: &DeviceId) -> Result<Option<Device>, StoreError> {
        (**self).device(id).await
    }

    async fn devices(&self, filter: &DeviceFilter) -> Result<Vec<Device>, StoreError> {
        (**self).devices(filter).await
    }

    async fn offer(&self, id: OfferId) -> Result<Option<Offer>, StoreError> {
        (**self).offer(id).await
    }

    async fn offers(&self, status: Option<OfferStatus>) -> Result<Vec<Offer>, StoreError> {
        (**self).offers(status).await
    }

    async fn reservation(&self, id: ReservationId) -> Result<Option<Reservation>, StoreError> {
        (**self).reservation(id).await
    }

    async fn reservations(&self) -> Result<Vec<Reservation>, StoreError> {
        (**self).reservations().await
    }

    async fn reservation_by_offer(
        &self,
        offer_id: OfferId,
    ) -> Result<Option<Reservation>, StoreError> {
        (**self).reservation_by_offer(offer_id).await
    }
}
