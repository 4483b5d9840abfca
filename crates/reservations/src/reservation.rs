use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{
    Customer, DeviceId, DomainError, DomainResult, Entity, Money, OfferId, ReservationId,
    ensure_positive_quantity,
};

use crate::code::ReservationCode;

/// Reason recorded when a reservation is canceled without one.
pub const DEFAULT_CANCELLATION_REASON: &str = "Sin justificación";

/// Reservation lifecycle: `pending -> completed | canceled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Pending,
    Completed,
    Canceled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Completed => "completed",
            ReservationStatus::Canceled => "canceled",
        }
    }
}

impl core::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReservationStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(ReservationStatus::Pending),
            "completed" => Ok(ReservationStatus::Completed),
            "canceled" | "cancelled" => Ok(ReservationStatus::Canceled),
            other => Err(DomainError::validation(format!(
                "unknown reservation status '{other}'"
            ))),
        }
    }
}

/// One reserved line. `price` is what the customer is charged; `original_price`
/// is the list price snapshot at submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationItem {
    pub device_id: DeviceId,
    pub price: Money,
    pub original_price: Money,
    pub quantity: i64,
}

impl ReservationItem {
    pub fn new(
        device_id: DeviceId,
        price: Money,
        original_price: Money,
        quantity: i64,
    ) -> DomainResult<Self> {
        ensure_positive_quantity(quantity)?;
        if !price.is_positive() {
            return Err(DomainError::validation("item price must be positive"));
        }
        if !original_price.is_positive() {
            return Err(DomainError::validation("item original price must be positive"));
        }
        price.times(quantity)?;
        Ok(Self {
            device_id,
            price,
            original_price,
            quantity,
        })
    }

    pub fn line_total(&self) -> DomainResult<Money> {
        self.price.times(self.quantity)
    }
}

/// Input for opening a reservation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReservation {
    pub code: ReservationCode,
    pub customer: Customer,
    pub items: Vec<ReservationItem>,
    pub offer_id: Option<OfferId>,
}

/// Entity: a confirmed booking. Owns its items; `offer_id` is a weak
/// back-reference to the accepted offer it came from, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub code: ReservationCode,
    pub customer: Customer,
    status: ReservationStatus,
    cancellation_reason: Option<String>,
    total: Money,
    pub offer_id: Option<OfferId>,
    items: Vec<ReservationItem>,
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    /// Open a pending reservation; the total is derived from the items.
    pub fn open(id: ReservationId, new: NewReservation, now: DateTime<Utc>) -> DomainResult<Self> {
        if new.items.is_empty() {
            return Err(DomainError::validation(
                "a reservation needs at least one item",
            ));
        }
        let total = Money::total(new.items.iter().map(ReservationItem::line_total))?;
        Ok(Self {
            id,
            code: new.code,
            customer: new.customer,
            status: ReservationStatus::Pending,
            cancellation_reason: None,
            total,
            offer_id: new.offer_id,
            items: new.items,
            created_at: now,
        })
    }

    /// Rehydrate from storage.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: ReservationId,
        code: ReservationCode,
        customer: Customer,
        status: ReservationStatus,
        cancellation_reason: Option<String>,
        total: Money,
        offer_id: Option<OfferId>,
        items: Vec<ReservationItem>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            code,
            customer,
            status,
            cancellation_reason,
            total,
            offer_id,
            items,
            created_at,
        }
    }

    pub fn status(&self) -> ReservationStatus {
        self.status
    }

    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation_reason.as_deref()
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn items(&self) -> &[ReservationItem] {
        &self.items
    }

    pub fn is_pending(&self) -> bool {
        self.status == ReservationStatus::Pending
    }

    /// Mark as completed. Never touches stock.
    pub fn complete(&mut self) -> DomainResult<()> {
        self.ensure_pending(ReservationStatus::Completed)?;
        self.status = ReservationStatus::Completed;
        Ok(())
    }

    /// Cancel; a blank reason falls back to [`DEFAULT_CANCELLATION_REASON`].
    ///
    /// Returns the `(device, quantity)` pairs the caller must put back in stock.
    pub fn cancel(&mut self, reason: Option<&str>) -> DomainResult<Vec<(DeviceId, i64)>> {
        self.ensure_pending(ReservationStatus::Canceled)?;
        self.status = ReservationStatus::Canceled;
        self.cancellation_reason = Some(
            reason
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .unwrap_or(DEFAULT_CANCELLATION_REASON)
                .to_string(),
        );
        Ok(self
            .items
            .iter()
            .map(|item| (item.device_id.clone(), item.quantity))
            .collect())
    }

    fn ensure_pending(&self, target: ReservationStatus) -> DomainResult<()> {
        if !self.is_pending() {
            return Err(DomainError::conflict(format!(
                "cannot move a {} reservation to {target}",
                self.status
            )));
        }
        Ok(())
    }
}

impl Entity for Reservation {
    type Id = ReservationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
