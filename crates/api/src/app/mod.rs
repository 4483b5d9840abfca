//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store/notifier selection and the reconciliation engine
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request normalization and response views
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use storefront_infra::StorefrontConfig;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router from configuration (used by `main.rs`).
pub async fn build_app(config: &StorefrontConfig) -> anyhow::Result<Router> {
    let services = services::build_services(config).await?;
    Ok(router(services, &config.admin_token))
}

/// Router over already-built services; tests inject their own engine here.
pub fn router(services: services::AppServices, admin_token: &str) -> Router {
    let services = Arc::new(services);
    let admin_auth = middleware::AdminAuth {
        token: Arc::from(admin_token),
    };

    let admin = routes::admin_router().layer(axum::middleware::from_fn_with_state(
        admin_auth,
        middleware::admin_middleware,
    ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::public_router())
        .nest("/admin", admin)
        .layer(Extension(services))
        .layer(ServiceBuilder::new())
}
