//! Notification gateway.
//!
//! Delivery is out of scope for the storefront itself: the engine hands a
//! fully-formed message to a [`Notifier`] after its transaction has committed,
//! logs any [`NotifyError`] and moves on.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;

use storefront_core::{Customer, Money};
use storefront_offers::{Offer, OfferDecision};
use storefront_reservations::{ReservationCode, ReservationItem};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// A reservation confirmation for the list-price part of a cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationConfirmation {
    pub customer: Customer,
    pub items: Vec<ReservationItem>,
    pub total: Money,
    pub code: ReservationCode,
}

/// An admin decision on an offer, quoting the reservation code on acceptance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferDecisionNotice {
    pub offer: Offer,
    pub decision: OfferDecision,
    pub reservation_code: Option<ReservationCode>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_reservation_confirmation(
        &self,
        confirmation: &ReservationConfirmation,
    ) -> Result<(), NotifyError>;

    async fn send_offer_decision(&self, notice: &OfferDecisionNotice) -> Result<(), NotifyError>;
}

#[async_trait]
impl<N> Notifier for Arc<N>
where
    N: Notifier + ?Sized,
{
    async fn send_reservation_confirmation(
        &self,
        confirmation: &ReservationConfirmation,
    ) -> Result<(), NotifyError> {
        (**self).send_reservation_confirmation(confirmation).await
    }

    async fn send_offer_decision(&self, notice: &OfferDecisionNotice) -> Result<(), NotifyError> {
        (**self).send_offer_decision(notice).await
    }
}

/// Writes every notification to the log. Default gateway for dev deployments.
#[derive(Debug, Clone, Default)]
pub struct TracingNotifier {
    admin_recipients: Vec<String>,
}

impl TracingNotifier {
    pub fn new(admin_recipients: Vec<String>) -> Self {
        Self { admin_recipients }
    }
}

#[async_trait]
impl Notifier for TracingNotifier {
    async fn send_reservation_confirmation(
        &self,
        confirmation: &ReservationConfirmation,
    ) -> Result<(), NotifyError> {
        tracing::info!(
            to = %confirmation.customer.email,
            cc = ?self.admin_recipients,
            code = %confirmation.code,
            items = confirmation.items.len(),
            total = %confirmation.total,
            "reservation confirmation"
        );
        Ok(())
    }

    async fn send_offer_decision(&self, notice: &OfferDecisionNotice) -> Result<(), NotifyError> {
        tracing::info!(
            to = %notice.offer.customer.email,
            offer_id = %notice.offer.id,
            decision = ?notice.decision,
            reservation_code = notice.reservation_code.as_ref().map(|c| c.as_str()),
            reason = notice.offer.rejection_reason(),
            "offer decision"
        );
        Ok(())
    }
}

/// A message captured by [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentNotification {
    ReservationConfirmation(ReservationConfirmation),
    OfferDecision(OfferDecisionNotice),
}

/// Keeps every notification in memory so callers can inspect what was sent.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<SentNotification>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn record(&self, notification: SentNotification) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .map_err(|_| NotifyError::Delivery("recording notifier lock poisoned".to_string()))?
            .push(notification);
        Ok(())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_reservation_confirmation(
        &self,
        confirmation: &ReservationConfirmation,
    ) -> Result<(), NotifyError> {
        self.record(SentNotification::ReservationConfirmation(confirmation.clone()))
    }

    async fn send_offer_decision(&self, notice: &OfferDecisionNotice) -> Result<(), NotifyError> {
        self.record(SentNotification::OfferDecision(notice.clone()))
    }
}
