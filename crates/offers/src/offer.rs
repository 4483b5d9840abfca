use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{
    Customer, DeviceId, DomainError, DomainResult, Entity, Money, OfferId, ensure_positive_quantity,
};

use crate::policy::OfferFloor;

/// Reason recorded when an administrator rejects without giving one.
pub const DEFAULT_REJECTION_REASON: &str = "Oferta rechazada por administrador";

/// Reason recorded on pending offers cancelled because another offer on the
/// same device was accepted.
pub const COMPETING_OFFER_ACCEPTED_REASON: &str = "Otra oferta fue aceptada para este producto";

/// Offer lifecycle. Every state except `Pending` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
}

impl OfferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferStatus::Pending => "pending",
            OfferStatus::Accepted => "accepted",
            OfferStatus::Rejected => "rejected",
            OfferStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, OfferStatus::Pending)
    }
}

impl core::fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OfferStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(OfferStatus::Pending),
            "accepted" => Ok(OfferStatus::Accepted),
            "rejected" => Ok(OfferStatus::Rejected),
            "cancelled" => Ok(OfferStatus::Cancelled),
            other => Err(DomainError::validation(format!("unknown offer status '{other}'"))),
        }
    }
}

/// Outcome an administrator communicates to the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferDecision {
    Accepted,
    Rejected,
}

/// Input for a new customer offer (one cart line priced below list).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOffer {
    pub device_id: DeviceId,
    pub customer: Customer,
    pub offer_price: Money,
    pub original_price: Money,
    pub quantity: i64,
}

/// Entity: a customer offer awaiting (or past) admin decision.
///
/// `original_price` is a snapshot of the device list price at submission
/// time and is never recomputed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Offer {
    pub id: OfferId,
    pub device_id: DeviceId,
    pub customer: Customer,
    pub offer_price: Money,
    pub original_price: Money,
    pub quantity: i64,
    status: OfferStatus,
    rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Offer {
    /// Validate and create a pending offer.
    pub fn submit(
        id: OfferId,
        new: NewOffer,
        floor: OfferFloor,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        ensure_positive_quantity(new.quantity)?;
        if !new.offer_price.is_positive() {
            return Err(DomainError::validation("offer price must be positive"));
        }
        if !new.original_price.is_positive() {
            return Err(DomainError::validation("original price must be positive"));
        }
        floor.check(new.offer_price, new.original_price)?;
        new.offer_price.times(new.quantity)?;

        Ok(Self {
            id,
            device_id: new.device_id,
            customer: new.customer,
            offer_price: new.offer_price,
            original_price: new.original_price,
            quantity: new.quantity,
            status: OfferStatus::Pending,
            rejection_reason: None,
            created_at: now,
        })
    }

    /// Rehydrate from storage.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: OfferId,
        device_id: DeviceId,
        customer: Customer,
        offer_price: Money,
        original_price: Money,
        quantity: i64,
        status: OfferStatus,
        rejection_reason: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            device_id,
            customer,
            offer_price,
            original_price,
            quantity,
            status,
            rejection_reason,
            created_at,
        }
    }

    pub fn status(&self) -> OfferStatus {
        self.status
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    pub fn is_pending(&self) -> bool {
        self.status == OfferStatus::Pending
    }

    /// Offer price × quantity.
    pub fn total(&self) -> DomainResult<Money> {
        self.offer_price.times(self.quantity)
    }

    /// The decision already taken on this offer, if any.
    pub fn decision(&self) -> Option<OfferDecision> {
        match self.status {
            OfferStatus::Accepted => Some(OfferDecision::Accepted),
            OfferStatus::Rejected => Some(OfferDecision::Rejected),
            OfferStatus::Pending | OfferStatus::Cancelled => None,
        }
    }

    pub fn accept(&mut self) -> DomainResult<()> {
        self.ensure_pending("accept")?;
        self.status = OfferStatus::Accepted;
        Ok(())
    }

    /// Reject; a blank reason falls back to [`DEFAULT_REJECTION_REASON`].
    pub fn reject(&mut self, reason: Option<&str>) -> DomainResult<()> {
        self.ensure_pending("reject")?;
        self.status = OfferStatus::Rejected;
        self.rejection_reason = Some(reason_or(reason, DEFAULT_REJECTION_REASON));
        Ok(())
    }

    /// Cancel because a competing offer on the same device was accepted.
    pub fn cancel_for_competitor(&mut self) -> DomainResult<()> {
        self.ensure_pending("cancel")?;
        self.status = OfferStatus::Cancelled;
        self.rejection_reason = Some(COMPETING_OFFER_ACCEPTED_REASON.to_string());
        Ok(())
    }

    fn ensure_pending(&self, action: &str) -> DomainResult<()> {
        if self.status.is_terminal() {
            return Err(DomainError::conflict(format!(
                "cannot {action} an offer that is already {}",
                self.status
            )));
        }
        Ok(())
    }
}

impl Entity for Offer {
    type Id = OfferId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

fn reason_or(reason: Option<&str>, fallback: &str) -> String {
    reason
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(fallback)
        .to_string()
}
