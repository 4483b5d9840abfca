use chrono::Utc;
use tracing::instrument;

use storefront_core::{DeviceId, OfferId, ReservationId};
use storefront_offers::{Offer, OfferDecision, OfferStatus};
use storefront_reservations::{NewReservation, Reservation, ReservationItem};

use super::{ReconciliationEngine, ReconciliationError, offer_not_found};
use crate::store::StoreTransaction;

/// Admin decision on a pending offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OfferAction {
    Accept,
    Reject { reason: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferActionOutcome {
    pub offer: Offer,
    /// Present on acceptance.
    pub reservation: Option<Reservation>,
    /// Competing pending offers cancelled by an acceptance.
    pub cancelled_offers: usize,
}

impl ReconciliationEngine {
    pub async fn decide_offer(
        &self,
        id: OfferId,
        action: OfferAction,
    ) -> Result<OfferActionOutcome, ReconciliationError> {
        match action {
            OfferAction::Accept => self.accept_offer(id).await,
            OfferAction::Reject { reason } => self.reject_offer(id, reason.as_deref()).await,
        }
    }

    /// Accept a pending offer.
    ///
    /// In one transaction: the offer becomes accepted, every other pending
    /// offer on the device is cancelled, a reservation for the offer's
    /// quantity at the offer price is created and the device stock is
    /// decremented. Stock is re-checked under the device lock first.
    #[instrument(skip(self), fields(offer_id = %id), err)]
    pub async fn accept_offer(&self, id: OfferId) -> Result<OfferActionOutcome, ReconciliationError> {
        // The device is locked before the offer rows, same order as cart
        // submission and competitor cancellation.
        let device_id = self.offer(id).await?.device_id;

        let mut tx = self.begin().await?;
        let outcome = match self.accept_in(tx.as_mut(), id, &device_id).await {
            Ok(outcome) => outcome,
            Err(err) => return Err(self.abort(tx, err).await),
        };
        self.commit(tx).await?;

        let code = outcome.reservation.as_ref().map(|r| r.code.clone());
        tracing::info!(
            reservation_code = code.as_ref().map(|c| c.as_str()),
            cancelled_offers = outcome.cancelled_offers,
            "offer accepted"
        );
        self.notify_decision(&outcome.offer, OfferDecision::Accepted, code)
            .await;
        Ok(outcome)
    }

    async fn accept_in(
        &self,
        tx: &mut dyn StoreTransaction,
        id: OfferId,
        device_id: &DeviceId,
    ) -> Result<OfferActionOutcome, ReconciliationError> {
        let device = tx.device_for_update(device_id).await?;
        let mut offer = tx.offer_for_update(id).await?;
        offer.accept()?;

        device
            .ensure_available(offer.quantity)
            .map_err(|shortage| ReconciliationError::InsufficientStock(vec![shortage]))?;

        let competitors = tx.pending_offers_for_device(&offer.device_id, offer.id).await?;
        for mut competitor in competitors.iter().cloned() {
            competitor.cancel_for_competitor()?;
            tx.update_offer(&competitor).await?;
        }
        tx.update_offer(&offer).await?;

        let item = ReservationItem::new(
            offer.device_id.clone(),
            offer.offer_price,
            offer.original_price,
            offer.quantity,
        )?;
        let code = self.unique_code(tx).await?;
        let reservation = Reservation::open(
            ReservationId::new(),
            NewReservation {
                code,
                customer: offer.customer.clone(),
                items: vec![item],
                offer_id: Some(offer.id),
            },
            Utc::now(),
        )?;
        tx.insert_reservation(&reservation).await?;
        tx.decrement_stock(&offer.device_id, offer.quantity).await?;

        Ok(OfferActionOutcome {
            offer,
            reservation: Some(reservation),
            cancelled_offers: competitors.len(),
        })
    }

    /// Reject a pending offer; a blank reason falls back to the default one.
    #[instrument(skip(self), fields(offer_id = %id), err)]
    pub async fn reject_offer(
        &self,
        id: OfferId,
        reason: Option<&str>,
    ) -> Result<OfferActionOutcome, ReconciliationError> {
        let mut tx = self.begin().await?;
        let offer = match reject_in(tx.as_mut(), id, reason).await {
            Ok(offer) => offer,
            Err(err) => return Err(self.abort(tx, err).await),
        };
        self.commit(tx).await?;

        tracing::info!(reason = offer.rejection_reason(), "offer rejected");
        self.notify_decision(&offer, OfferDecision::Rejected, None)
            .await;
        Ok(OfferActionOutcome {
            offer,
            reservation: None,
            cancelled_offers: 0,
        })
    }

    /// Re-send the decision for an accepted or rejected offer.
    ///
    /// Returns whether the notifier accepted the message.
    #[instrument(skip(self), fields(offer_id = %id), err)]
    pub async fn renotify_offer_decision(&self, id: OfferId) -> Result<bool, ReconciliationError> {
        let offer = self.store.offer(id).await?.ok_or_else(|| offer_not_found(id))?;
        let decision = offer.decision().ok_or_else(|| {
            ReconciliationError::InvalidInput(format!(
                "only accepted or rejected offers can be notified; this one is {}",
                offer.status()
            ))
        })?;
        let code = match decision {
            OfferDecision::Accepted => self
                .store
                .reservation_by_offer(id)
                .await?
                .map(|r| r.code),
            OfferDecision::Rejected => None,
        };
        Ok(self.notify_decision(&offer, decision, code).await)
    }

    pub async fn offers(&self, status: Option<OfferStatus>) -> Result<Vec<Offer>, ReconciliationError> {
        Ok(self.store.offers(status).await?)
    }

    pub async fn offer(&self, id: OfferId) -> Result<Offer, ReconciliationError> {
        self.store.offer(id).await?.ok_or_else(|| offer_not_found(id))
    }
}

async fn reject_in(
    tx: &mut dyn StoreTransaction,
    id: OfferId,
    reason: Option<&str>,
) -> Result<Offer, ReconciliationError> {
    let mut offer = tx.offer_for_update(id).await?;
    offer.reject(reason)?;
    tx.update_offer(&offer).await?;
    Ok(offer)
}
