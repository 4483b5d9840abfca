use tracing::instrument;

use storefront_core::ReservationId;
use storefront_inventory::DeviceFilter;
use storefront_reservations::{AmountsSummary, Reservation};

use super::{ReconciliationEngine, ReconciliationError, reservation_not_found};
use crate::store::StoreTransaction;

/// Admin status change on a pending reservation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReservationStatusChange {
    Complete,
    Cancel { reason: Option<String> },
}

impl ReconciliationEngine {
    /// Complete or cancel a pending reservation.
    ///
    /// Cancelling puts every item's quantity back in stock within the same
    /// transaction; completing never touches stock.
    #[instrument(skip(self), fields(reservation_id = %id), err)]
    pub async fn update_reservation_status(
        &self,
        id: ReservationId,
        change: ReservationStatusChange,
    ) -> Result<Reservation, ReconciliationError> {
        let mut tx = self.begin().await?;
        let reservation = match change_status_in(tx.as_mut(), id, &change).await {
            Ok(reservation) => reservation,
            Err(err) => return Err(self.abort(tx, err).await),
        };
        self.commit(tx).await?;

        tracing::info!(
            code = %reservation.code,
            status = %reservation.status(),
            reason = reservation.cancellation_reason(),
            "reservation status updated"
        );
        Ok(reservation)
    }

    pub async fn reservations(&self) -> Result<Vec<Reservation>, ReconciliationError> {
        Ok(self.store.reservations().await?)
    }

    pub async fn reservation(&self, id: ReservationId) -> Result<Reservation, ReconciliationError> {
        self.store
            .reservation(id)
            .await?
            .ok_or_else(|| reservation_not_found(id))
    }

    /// Published, offered and paid totals for the admin dashboard.
    pub async fn amounts(&self) -> Result<AmountsSummary, ReconciliationError> {
        let devices = self.store.devices(&DeviceFilter::default()).await?;
        let reservations = self.store.reservations().await?;
        Ok(AmountsSummary::tally(
            devices.iter().map(|d| d.listed_value()),
            &reservations,
        )?)
    }
}

async fn change_status_in(
    tx: &mut dyn StoreTransaction,
    id: ReservationId,
    change: &ReservationStatusChange,
) -> Result<Reservation, ReconciliationError> {
    let mut reservation = tx.reservation_for_update(id).await?;
    match change {
        ReservationStatusChange::Complete => reservation.complete()?,
        ReservationStatusChange::Cancel { reason } => {
            let restock = reservation.cancel(reason.as_deref())?;
            for (device_id, quantity) in restock {
                tx.increment_stock(&device_id, quantity).await?;
            }
        }
    }
    tx.update_reservation(&reservation).await?;
    Ok(reservation)
}
