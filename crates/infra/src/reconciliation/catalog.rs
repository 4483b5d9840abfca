use chrono::Utc;
use tracing::instrument;

use storefront_core::DeviceId;
use storefront_inventory::{Device, DeviceFilter, DeviceSpec, FilterOptions};

use super::{ReconciliationEngine, ReconciliationError};
use crate::store::{StoreError, StoreTransaction};

impl ReconciliationEngine {
    pub async fn devices(&self, filter: &DeviceFilter) -> Result<Vec<Device>, ReconciliationError> {
        Ok(self.store.devices(filter).await?)
    }

    pub async fn device(&self, id: &DeviceId) -> Result<Device, ReconciliationError> {
        self.store
            .device(id)
            .await?
            .ok_or_else(|| ReconciliationError::DeviceNotFound(vec![id.to_string()]))
    }

    /// Distinct types and brands across the whole catalog.
    pub async fn filter_options(&self) -> Result<FilterOptions, ReconciliationError> {
        let devices = self.store.devices(&DeviceFilter::default()).await?;
        Ok(FilterOptions::from_devices(&devices))
    }

    /// Create or replace a catalog entry.
    #[instrument(skip(self, spec), fields(device_id = %id), err)]
    pub async fn upsert_device(
        &self,
        id: DeviceId,
        spec: DeviceSpec,
    ) -> Result<Device, ReconciliationError> {
        let mut tx = self.begin().await?;
        let device = match upsert_in(tx.as_mut(), id, spec).await {
            Ok(device) => device,
            Err(err) => return Err(self.abort(tx, err).await),
        };
        self.commit(tx).await?;
        tracing::info!(stock = device.stock(), price = %device.price, "device saved");
        Ok(device)
    }
}

async fn upsert_in(
    tx: &mut dyn StoreTransaction,
    id: DeviceId,
    spec: DeviceSpec,
) -> Result<Device, ReconciliationError> {
    let now = Utc::now();
    let device = match tx.device_for_update(&id).await {
        Ok(mut existing) => {
            existing.revise(spec, now)?;
            existing
        }
        Err(StoreError::NotFound { .. }) => Device::create(id, spec, now)?,
        Err(err) => return Err(err.into()),
    };
    tx.upsert_device(&device).await?;
    Ok(device)
}
