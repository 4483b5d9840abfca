//! Offer-to-reservation reconciliation.
//!
//! The engine turns a submitted cart into an immediate reservation (list-price
//! lines) plus pending offers (negotiated lines), and turns an accepted offer
//! into a reservation while cancelling the competing offers on the same device.
//!
//! ## Transactions
//!
//! Each operation runs in exactly one [`StoreTransaction`]: stock checks, ledger
//! writes and stock mutations either all commit or none do. Notifications are
//! sent only after commit and never fail the operation.

mod cart;
mod catalog;
mod offers;
mod reservations;

use std::sync::Arc;

use thiserror::Error;

use storefront_core::{Customer, DeviceId, DomainError, Money, OfferId, ReservationId};
use storefront_inventory::StockShortage;
use storefront_offers::{Offer, OfferDecision, OfferFloor};
use storefront_reservations::{Reservation, ReservationCode};

use crate::notify::{Notifier, OfferDecisionNotice, ReservationConfirmation};
use crate::store::{Store, StoreError, StoreTransaction};

pub use offers::{OfferAction, OfferActionOutcome};
pub use reservations::ReservationStatusChange;

/// Attempts at drawing an unused reservation code before giving up.
const CODE_ATTEMPTS: usize = 10;

/// Reconciliation failure.
///
/// `InsufficientStock` and `InvalidInput` are raised before anything is
/// written. `TransactionFailure` means the store rejected or lost the
/// transaction; nothing from the operation is visible.
#[derive(Debug, Error)]
pub enum ReconciliationError {
    /// Every unknown device id the operation referenced.
    #[error("device(s) not found: {}", .0.join(", "))]
    DeviceNotFound(Vec<String>),

    #[error("offer '{0}' not found")]
    OfferNotFound(String),

    #[error("reservation '{0}' not found")]
    ReservationNotFound(String),

    #[error("insufficient stock for {} device(s)", .0.len())]
    InsufficientStock(Vec<StockShortage>),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error("transaction failed: {0}")]
    TransactionFailure(String),
}

impl From<StoreError> for ReconciliationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity: "device", id } => Self::DeviceNotFound(vec![id]),
            StoreError::NotFound { entity: "offer", id } => Self::OfferNotFound(id),
            StoreError::NotFound { entity: "reservation", id } => Self::ReservationNotFound(id),
            StoreError::NotFound { entity, id } => {
                Self::TransactionFailure(format!("{entity} '{id}' vanished mid-transaction"))
            }
            StoreError::InsufficientStock(shortage) => Self::InsufficientStock(vec![shortage]),
            StoreError::Conflict(msg) | StoreError::Database(msg) => Self::TransactionFailure(msg),
        }
    }
}

impl From<DomainError> for ReconciliationError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Conflict(msg) => Self::InvalidTransition(msg),
            DomainError::Validation(msg)
            | DomainError::InvariantViolation(msg)
            | DomainError::InvalidId(msg) => Self::InvalidInput(msg),
        }
    }
}

/// One line of a submitted cart.
///
/// `price == original_price` reserves at list price; anything else is an offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub device_id: DeviceId,
    pub quantity: i64,
    pub price: Money,
    pub original_price: Money,
}

impl CartLine {
    pub fn is_list_price(&self) -> bool {
        self.price == self.original_price
    }
}

/// A cart in canonical form, whatever shape the client sent it in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartSubmission {
    pub customer: Customer,
    pub lines: Vec<CartLine>,
}

/// What a cart submission produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartOutcome {
    pub reservation: Option<Reservation>,
    pub offers: Vec<Offer>,
}

impl CartOutcome {
    pub fn reservation_code(&self) -> Option<&ReservationCode> {
        self.reservation.as_ref().map(|r| &r.code)
    }

    pub fn has_offers(&self) -> bool {
        !self.offers.is_empty()
    }

    pub fn offer_count(&self) -> usize {
        self.offers.len()
    }
}

/// Storefront workflows over a [`Store`] and a [`Notifier`].
#[derive(Clone)]
pub struct ReconciliationEngine {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    floor: OfferFloor,
}

impl ReconciliationEngine {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn Notifier>, floor: OfferFloor) -> Self {
        Self {
            store,
            notifier,
            floor,
        }
    }

    pub fn offer_floor(&self) -> OfferFloor {
        self.floor
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, ReconciliationError> {
        Ok(self.store.begin().await?)
    }

    async fn commit(&self, tx: Box<dyn StoreTransaction>) -> Result<(), ReconciliationError> {
        Ok(tx.commit().await?)
    }

    /// Roll back and hand `err` back to the caller.
    async fn abort(
        &self,
        tx: Box<dyn StoreTransaction>,
        err: ReconciliationError,
    ) -> ReconciliationError {
        if let Err(rollback_err) = tx.rollback().await {
            tracing::warn!(error = %rollback_err, "rollback failed");
        }
        err
    }

    /// Draw reservation codes until one is unused.
    async fn unique_code(
        &self,
        tx: &mut dyn StoreTransaction,
    ) -> Result<ReservationCode, ReconciliationError> {
        for _ in 0..CODE_ATTEMPTS {
            let code = ReservationCode::random();
            if !tx.reservation_code_exists(&code).await? {
                return Ok(code);
            }
            tracing::debug!(code = %code, "reservation code collision; drawing again");
        }
        Err(ReconciliationError::TransactionFailure(format!(
            "no unused reservation code after {CODE_ATTEMPTS} attempts"
        )))
    }

    async fn notify_confirmation(&self, reservation: &Reservation) {
        let confirmation = ReservationConfirmation {
            customer: reservation.customer.clone(),
            items: reservation.items().to_vec(),
            total: reservation.total(),
            code: reservation.code.clone(),
        };
        if let Err(err) = self
            .notifier
            .send_reservation_confirmation(&confirmation)
            .await
        {
            tracing::warn!(code = %reservation.code, error = %err, "reservation confirmation not delivered");
        }
    }

    /// Returns whether the notifier accepted the message.
    async fn notify_decision(
        &self,
        offer: &Offer,
        decision: OfferDecision,
        reservation_code: Option<ReservationCode>,
    ) -> bool {
        let notice = OfferDecisionNotice {
            offer: offer.clone(),
            decision,
            reservation_code,
        };
        match self.notifier.send_offer_decision(&notice).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(offer_id = %offer.id, error = %err, "offer decision not delivered");
                false
            }
        }
    }
}

fn offer_not_found(id: OfferId) -> ReconciliationError {
    ReconciliationError::OfferNotFound(id.to_string())
}

fn reservation_not_found(id: ReservationId) -> ReconciliationError {
    ReconciliationError::ReservationNotFound(id.to_string())
}
