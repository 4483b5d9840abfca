use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use storefront_core::{DeviceId, OfferId, ReservationId};
use storefront_inventory::{Device, DeviceFilter, StockError};
use storefront_offers::{Offer, OfferStatus};
use storefront_reservations::{Reservation, ReservationCode};

use super::{Store, StoreError, StoreTransaction};

#[derive(Debug, Clone, Default)]
struct StoreState {
    devices: HashMap<DeviceId, Device>,
    offers: HashMap<OfferId, Offer>,
    reservations: HashMap<ReservationId, Reservation>,
}

/// In-memory store for tests/dev.
///
/// Committed state sits behind an `RwLock` for readers. Writers take a single
/// async mutex for the whole transaction and work on a private copy, which
/// replaces the committed state on commit.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    committed: Arc<RwLock<StoreState>>,
    writer: Arc<Mutex<()>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the catalog outside of any transaction (tests, demo data).
    pub fn with_devices(devices: impl IntoIterator<Item = Device>) -> Self {
        let state = StoreState {
            devices: devices.into_iter().map(|d| (d.id.clone(), d)).collect(),
            ..Default::default()
        };
        Self {
            committed: Arc::new(RwLock::new(state)),
            writer: Arc::new(Mutex::new(())),
        }
    }

    fn read<T>(&self, f: impl FnOnce(&StoreState) -> T) -> Result<T, StoreError> {
        let state = self.committed.read().map_err(|_| poisoned())?;
        Ok(f(&state))
    }
}

fn poisoned() -> StoreError {
    StoreError::Database("in-memory store lock poisoned".to_string())
}

fn newest_first<T>(mut items: Vec<T>, created_at: impl Fn(&T) -> chrono::DateTime<chrono::Utc>) -> Vec<T> {
    items.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
    items
}

#[async_trait]
impl Store for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let guard = self.writer.clone().lock_owned().await;
        let working = self.read(StoreState::clone)?;
        Ok(Box::new(InMemoryTransaction {
            committed: self.committed.clone(),
            working,
            _guard: guard,
        }))
    }

    async fn device(&self, id: &DeviceId) -> Result<Option<Device>, StoreError> {
        self.read(|s| s.devices.get(id).cloned())
    }

    async fn devices(&self, filter: &DeviceFilter) -> Result<Vec<Device>, StoreError> {
        let mut devices = self.read(|s| {
            s.devices
                .values()
                .filter(|d| filter.matches(d))
                .cloned()
                .collect::<Vec<_>>()
        })?;
        devices.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(devices)
    }

    async fn offer(&self, id: OfferId) -> Result<Option<Offer>, StoreError> {
        self.read(|s| s.offers.get(&id).cloned())
    }

    async fn offers(&self, status: Option<OfferStatus>) -> Result<Vec<Offer>, StoreError> {
        let offers = self.read(|s| {
            s.offers
                .values()
                .filter(|o| status.is_none_or(|st| o.status() == st))
                .cloned()
                .collect::<Vec<_>>()
        })?;
        Ok(newest_first(offers, |o| o.created_at))
    }

    async fn reservation(&self, id: ReservationId) -> Result<Option<Reservation>, StoreError> {
        self.read(|s| s.reservations.get(&id).cloned())
    }

    async fn reservations(&self) -> Result<Vec<Reservation>, StoreError> {
        let reservations = self.read(|s| s.reservations.values().cloned().collect::<Vec<_>>())?;
        Ok(newest_first(reservations, |r| r.created_at))
    }

    async fn reservation_by_offer(
        &self,
        offer_id: OfferId,
    ) -> Result<Option<Reservation>, StoreError> {
        self.read(|s| {
            s.reservations
                .values()
                .find(|r| r.offer_id == Some(offer_id))
                .cloned()
        })
    }
}

/// Holds the writer mutex until committed, rolled back or dropped.
struct InMemoryTransaction {
    committed: Arc<RwLock<StoreState>>,
    working: StoreState,
    _guard: OwnedMutexGuard<()>,
}

impl InMemoryTransaction {
    fn device_mut(&mut self, id: &DeviceId) -> Result<&mut Device, StoreError> {
        self.working
            .devices
            .get_mut(id)
            .ok_or_else(|| StoreError::device_not_found(id))
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn device_for_update(&mut self, id: &DeviceId) -> Result<Device, StoreError> {
        self.device_mut(id).map(|d| d.clone())
    }

    async fn upsert_device(&mut self, device: &Device) -> Result<(), StoreError> {
        self.working
            .devices
            .insert(device.id.clone(), device.clone());
        Ok(())
    }

    async fn decrement_stock(&mut self, id: &DeviceId, quantity: i64) -> Result<(), StoreError> {
        self.device_mut(id)?
            .decrement(quantity)
            .map_err(|e| match e {
                StockError::Insufficient(shortage) => StoreError::InsufficientStock(shortage),
                StockError::InvalidQuantity(err) => StoreError::Conflict(err.to_string()),
            })
    }

    async fn increment_stock(&mut self, id: &DeviceId, quantity: i64) -> Result<(), StoreError> {
        self.device_mut(id)?
            .increment(quantity)
            .map_err(|e| StoreError::Conflict(e.to_string()))
    }

    async fn insert_offer(&mut self, offer: &Offer) -> Result<(), StoreError> {
        if self.working.offers.contains_key(&offer.id) {
            return Err(StoreError::Conflict(format!("offer '{}' already exists", offer.id)));
        }
        self.working.offers.insert(offer.id, offer.clone());
        Ok(())
    }

    async fn offer_for_update(&mut self, id: OfferId) -> Result<Offer, StoreError> {
        self.working
            .offers
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::offer_not_found(id))
    }

    async fn update_offer(&mut self, offer: &Offer) -> Result<(), StoreError> {
        match self.working.offers.get_mut(&offer.id) {
            Some(existing) => {
                *existing = offer.clone();
                Ok(())
            }
            None => Err(StoreError::offer_not_found(offer.id)),
        }
    }

    async fn pending_offers_for_device(
        &mut self,
        device_id: &DeviceId,
        exclude: OfferId,
    ) -> Result<Vec<Offer>, StoreError> {
        Ok(self
            .working
            .offers
            .values()
            .filter(|o| o.is_pending() && &o.device_id == device_id && o.id != exclude)
            .cloned()
            .collect())
    }

    async fn reservation_code_exists(&mut self, code: &ReservationCode) -> Result<bool, StoreError> {
        Ok(self.working.reservations.values().any(|r| &r.code == code))
    }

    async fn insert_reservation(&mut self, reservation: &Reservation) -> Result<(), StoreError> {
        if self.working.reservations.values().any(|r| r.code == reservation.code) {
            return Err(StoreError::Conflict(format!(
                "reservation code '{}' already exists",
                reservation.code
            )));
        }
        self.working
            .reservations
            .insert(reservation.id, reservation.clone());
        Ok(())
    }

    async fn reservation_for_update(
        &mut self,
        id: ReservationId,
    ) -> Result<Reservation, StoreError> {
        self.working
            .reservations
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::reservation_not_found(id))
    }

    async fn update_reservation(&mut self, reservation: &Reservation) -> Result<(), StoreError> {
        match self.working.reservations.get_mut(&reservation.id) {
            Some(existing) => {
                *existing = reservation.clone();
                Ok(())
            }
            None => Err(StoreError::reservation_not_found(reservation.id)),
        }
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let InMemoryTransaction {
            committed,
            working,
            _guard,
        } = *self;
        let mut state = committed.write().map_err(|_| poisoned())?;
        *state = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
