use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use tracing::instrument;

use storefront_core::{DeviceId, Money, OfferId, ReservationId, ensure_positive_quantity};
use storefront_inventory::Device;
use storefront_offers::{NewOffer, Offer};
use storefront_reservations::{NewReservation, Reservation, ReservationItem};

use super::{CartLine, CartOutcome, CartSubmission, ReconciliationEngine, ReconciliationError};
use crate::store::{StoreError, StoreTransaction};

impl ReconciliationEngine {
    /// Submit a cart.
    ///
    /// List-price lines become one reservation (stock decremented), every other
    /// line becomes a pending offer (no stock effect). Stock is checked for all
    /// lines before anything is written; any shortfall fails the whole cart.
    #[instrument(
        skip(self, cart),
        fields(customer = %cart.customer.email, lines = cart.lines.len()),
        err
    )]
    pub async fn submit_cart(&self, cart: CartSubmission) -> Result<CartOutcome, ReconciliationError> {
        self.validate_lines(&cart.lines)?;

        let mut tx = self.begin().await?;
        let outcome = match self.submit_in(tx.as_mut(), cart, Utc::now()).await {
            Ok(outcome) => outcome,
            Err(err) => return Err(self.abort(tx, err).await),
        };
        self.commit(tx).await?;

        if let Some(reservation) = &outcome.reservation {
            tracing::info!(
                code = %reservation.code,
                total = %reservation.total(),
                "reservation created"
            );
        }
        for offer in &outcome.offers {
            tracing::info!(offer_id = %offer.id, device_id = %offer.device_id, "offer submitted");
        }

        // Only the list-price portion is confirmed; offers wait for a decision.
        if let Some(reservation) = &outcome.reservation {
            self.notify_confirmation(reservation).await;
        }
        Ok(outcome)
    }

    fn validate_lines(&self, lines: &[CartLine]) -> Result<(), ReconciliationError> {
        if lines.is_empty() {
            return Err(ReconciliationError::InvalidInput("cart is empty".to_string()));
        }
        let mut list_total = Money::ZERO;
        for (idx, line) in lines.iter().enumerate() {
            let at = |msg: String| ReconciliationError::InvalidInput(format!("item {}: {msg}", idx + 1));
            ensure_positive_quantity(line.quantity).map_err(|e| at(e.to_string()))?;
            if !line.price.is_positive() {
                return Err(at("price must be positive".to_string()));
            }
            if !line.original_price.is_positive() {
                return Err(at("original price must be positive".to_string()));
            }
            let line_total = line.price.times(line.quantity).map_err(|e| at(e.to_string()))?;
            if line.is_list_price() {
                list_total = list_total
                    .checked_add(line_total)
                    .map_err(|_| ReconciliationError::InvalidInput("cart total is too large".to_string()))?;
            } else {
                self.floor
                    .check(line.price, line.original_price)
                    .map_err(|e| at(e.to_string()))?;
            }
        }
        Ok(())
    }

    async fn submit_in(
        &self,
        tx: &mut dyn StoreTransaction,
        cart: CartSubmission,
        now: DateTime<Utc>,
    ) -> Result<CartOutcome, ReconciliationError> {
        let (list_lines, offer_lines): (Vec<CartLine>, Vec<CartLine>) =
            cart.lines.into_iter().partition(CartLine::is_list_price);

        preflight(tx, &list_lines, &offer_lines).await?;

        let mut offers = Vec::with_capacity(offer_lines.len());
        for line in offer_lines {
            let offer = Offer::submit(
                OfferId::new(),
                NewOffer {
                    device_id: line.device_id,
                    customer: cart.customer.clone(),
                    offer_price: line.price,
                    original_price: line.original_price,
                    quantity: line.quantity,
                },
                self.floor,
                now,
            )?;
            tx.insert_offer(&offer).await?;
            offers.push(offer);
        }

        let reservation = if list_lines.is_empty() {
            None
        } else {
            let items = list_lines
                .iter()
                .map(|line| {
                    ReservationItem::new(
                        line.device_id.clone(),
                        line.price,
                        line.original_price,
                        line.quantity,
                    )
                })
                .collect::<Result<Vec<_>, _>>()?;
            let code = self.unique_code(tx).await?;
            let reservation = Reservation::open(
                ReservationId::new(),
                NewReservation {
                    code,
                    customer: cart.customer,
                    items,
                    offer_id: None,
                },
                now,
            )?;
            tx.insert_reservation(&reservation).await?;
            for line in &list_lines {
                tx.decrement_stock(&line.device_id, line.quantity).await?;
            }
            Some(reservation)
        };

        Ok(CartOutcome {
            reservation,
            offers,
        })
    }
}

/// Check every line against current stock and report all shortfalls at once.
///
/// List-price lines on the same device are summed since they are all taken
/// from stock together; offer lines are checked one by one. Devices are locked
/// in id order so concurrent carts cannot deadlock each other. Unknown devices
/// are reported together, before any stock check.
async fn preflight(
    tx: &mut dyn StoreTransaction,
    list_lines: &[CartLine],
    offer_lines: &[CartLine],
) -> Result<(), ReconciliationError> {
    let mut reserved: BTreeMap<&DeviceId, i64> = BTreeMap::new();
    for line in list_lines {
        let total = reserved.entry(&line.device_id).or_default();
        *total = total.checked_add(line.quantity).ok_or_else(|| {
            ReconciliationError::InvalidInput(format!(
                "total quantity for device '{}' is too large",
                line.device_id
            ))
        })?;
    }
    let demands: Vec<(&DeviceId, i64)> = reserved
        .into_iter()
        .chain(offer_lines.iter().map(|l| (&l.device_id, l.quantity)))
        .collect();

    let ids: BTreeSet<&DeviceId> = demands.iter().map(|(id, _)| *id).collect();
    let mut devices: BTreeMap<&DeviceId, Device> = BTreeMap::new();
    let mut missing = Vec::new();
    for id in ids {
        match tx.device_for_update(id).await {
            Ok(device) => {
                devices.insert(id, device);
            }
            Err(StoreError::NotFound { .. }) => missing.push(id.to_string()),
            Err(err) => return Err(err.into()),
        }
    }
    if !missing.is_empty() {
        return Err(ReconciliationError::DeviceNotFound(missing));
    }

    let shortages: Vec<_> = demands
        .iter()
        .filter_map(|(id, quantity)| {
            devices
                .get(id)
                .and_then(|device| device.ensure_available(*quantity).err())
        })
        .collect();

    if shortages.is_empty() {
        Ok(())
    } else {
        Err(ReconciliationError::InsufficientStock(shortages))
    }
}
