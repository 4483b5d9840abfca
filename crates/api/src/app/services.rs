//! Service wiring: picks the store backend and notifier from configuration.

use std::sync::Arc;

use anyhow::Context;

use storefront_infra::{
    InMemoryStore, Notifier, PostgresStore, ReconciliationEngine, Store, StorefrontConfig,
    TracingNotifier,
};

/// Shared state handed to every handler.
pub struct AppServices {
    pub engine: ReconciliationEngine,
}

impl AppServices {
    pub fn new(engine: ReconciliationEngine) -> Self {
        Self { engine }
    }
}

pub async fn build_services(config: &StorefrontConfig) -> anyhow::Result<AppServices> {
    let store: Arc<dyn Store> = match &config.database {
        Some(db) => {
            let store = PostgresStore::connect(&db.url, db.max_connections)
                .await
                .context("failed to connect to postgres")?;
            tracing::info!(max_connections = db.max_connections, "using postgres store");
            Arc::new(store)
        }
        None => {
            tracing::info!("using in-memory store");
            Arc::new(InMemoryStore::new())
        }
    };

    let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier::new(config.admin_emails.clone()));

    Ok(AppServices::new(ReconciliationEngine::new(
        store,
        notifier,
        config.offer_floor,
    )))
}
