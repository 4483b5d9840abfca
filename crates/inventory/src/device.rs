use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use storefront_core::{DeviceId, DomainError, DomainResult, Entity, Money, ensure_positive_quantity};

/// Catalog attributes of a device, as provided by the catalog import/admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSpec {
    pub name: String,
    pub brand: String,
    pub device_type: String,
    pub description: String,
    pub price: Money,
    pub stock: i64,
    pub image: String,
}

impl DeviceSpec {
    fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if !self.price.is_positive() {
            return Err(DomainError::validation("price must be positive"));
        }
        if self.stock < 0 {
            return Err(DomainError::validation("stock cannot be negative"));
        }
        self.price.times(self.stock)?;
        Ok(())
    }
}

/// Entity: a device listed in the catalog.
///
/// `stock` is private: the only ways to change it are [`Device::decrement`]
/// (floor-checked) and [`Device::increment`] (restock), plus a full catalog
/// revision by an administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub brand: String,
    pub device_type: String,
    pub description: String,
    pub price: Money,
    stock: i64,
    pub image: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A cart line (or offer) asks for more units than the device has.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockShortage {
    pub device_id: DeviceId,
    pub device_name: String,
    pub requested: i64,
    pub available: i64,
}

impl core::fmt::Display for StockShortage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "insufficient stock for {}: requested {}, available {}",
            self.device_name, self.requested, self.available
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StockError {
    #[error("{0}")]
    InvalidQuantity(DomainError),

    #[error("{0}")]
    Insufficient(StockShortage),
}

impl Device {
    /// Create a new catalog entry.
    pub fn create(id: DeviceId, spec: DeviceSpec, now: DateTime<Utc>) -> DomainResult<Self> {
        spec.validate()?;
        Ok(Self::restore(id, spec, now, now))
    }

    /// Rehydrate a device from storage (no validation; storage holds valid rows).
    pub fn restore(
        id: DeviceId,
        spec: DeviceSpec,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: spec.name,
            brand: spec.brand,
            device_type: spec.device_type,
            description: spec.description,
            price: spec.price,
            stock: spec.stock,
            image: spec.image,
            created_at,
            updated_at,
        }
    }

    /// Replace catalog attributes (admin upsert). Keeps `created_at`.
    pub fn revise(&mut self, spec: DeviceSpec, now: DateTime<Utc>) -> DomainResult<()> {
        spec.validate()?;
        let created_at = self.created_at;
        *self = Self::restore(self.id.clone(), spec, created_at, now);
        Ok(())
    }

    pub fn stock(&self) -> i64 {
        self.stock
    }

    /// Pre-flight check: would `quantity` units fit in the current stock?
    pub fn ensure_available(&self, quantity: i64) -> Result<(), StockShortage> {
        if self.stock < quantity {
            return Err(self.shortage(quantity));
        }
        Ok(())
    }

    /// Remove `quantity` units. Fails without mutating if the floor would be crossed.
    pub fn decrement(&mut self, quantity: i64) -> Result<(), StockError> {
        ensure_positive_quantity(quantity).map_err(StockError::InvalidQuantity)?;
        self.ensure_available(quantity)
            .map_err(StockError::Insufficient)?;
        self.stock -= quantity;
        Ok(())
    }

    /// Put back `quantity` previously reserved units. No upper bound.
    pub fn increment(&mut self, quantity: i64) -> DomainResult<()> {
        ensure_positive_quantity(quantity)?;
        self.stock = self
            .stock
            .checked_add(quantity)
            .ok_or_else(|| DomainError::invariant("stock overflow"))?;
        Ok(())
    }

    /// Published value of this listing: `price × stock`.
    pub fn listed_value(&self) -> DomainResult<Money> {
        self.price.times(self.stock)
    }

    pub fn shortage(&self, requested: i64) -> StockShortage {
        StockShortage {
            device_id: self.id.clone(),
            device_name: self.name.clone(),
            requested,
            available: self.stock,
        }
    }

    /// Catalog attributes as a spec (round-trips through [`Device::restore`]).
    pub fn spec(&self) -> DeviceSpec {
        DeviceSpec {
            name: self.name.clone(),
            brand: self.brand.clone(),
            device_type: self.device_type.clone(),
            description: self.description.clone(),
            price: self.price,
            stock: self.stock,
            image: self.image.clone(),
        }
    }
}

impl Entity for Device {
    type Id = DeviceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
