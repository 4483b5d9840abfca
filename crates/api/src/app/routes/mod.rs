use axum::{routing::post, Router};

pub mod devices;
pub mod offers;
pub mod reservations;
pub mod system;

/// Storefront endpoints open to customers.
pub fn public_router() -> Router {
    Router::new()
        .nest("/devices", devices::router())
        .route("/reservations", post(reservations::submit_cart))
}

/// Endpoints behind the admin bearer token (mounted under `/admin`).
pub fn admin_router() -> Router {
    Router::new()
        .nest("/devices", devices::admin_router())
        .nest("/offers", offers::router())
        .nest("/reservations", reservations::admin_router())
}
