use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use storefront_core::ReservationId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn admin_router() -> Router {
    Router::new()
        .route("/", get(list_reservations))
        .route("/amounts", get(amounts))
        .route("/:id", get(get_reservation))
        .route("/:id/status", post(update_status))
}

fn parse_reservation_id(id: &str) -> Result<ReservationId, axum::response::Response> {
    id.parse().map_err(|_| errors::invalid_id("reservation"))
}

/// Customer cart submission: list-price lines are reserved now, the rest
/// become pending offers.
pub async fn submit_cart(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::SubmitCartRequest>,
) -> axum::response::Response {
    let cart = match body.into_submission() {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    match services.engine.submit_cart(cart).await {
        Ok(outcome) => (StatusCode::CREATED, Json(dto::CartResponse::from(&outcome))).into_response(),
        Err(e) => errors::reconciliation_error_to_response(e),
    }
}

pub async fn list_reservations(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.engine.reservations().await {
        Ok(reservations) => {
            let views: Vec<dto::ReservationView> =
                reservations.iter().map(dto::ReservationView::from).collect();
            (StatusCode::OK, Json(views)).into_response()
        }
        Err(e) => errors::reconciliation_error_to_response(e),
    }
}

pub async fn get_reservation(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_reservation_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.engine.reservation(id).await {
        Ok(r) => (StatusCode::OK, Json(dto::ReservationView::from(&r))).into_response(),
        Err(e) => errors::reconciliation_error_to_response(e),
    }
}

pub async fn update_status(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::ReservationStatusRequest>,
) -> axum::response::Response {
    let id = match parse_reservation_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let change = match body.into_change() {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    match services.engine.update_reservation_status(id, change).await {
        Ok(r) => (StatusCode::OK, Json(dto::ReservationView::from(&r))).into_response(),
        Err(e) => errors::reconciliation_error_to_response(e),
    }
}

pub async fn amounts(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.engine.amounts().await {
        Ok(summary) => (StatusCode::OK, Json(dto::AmountsView::from(summary))).into_response(),
        Err(e) => errors::reconciliation_error_to_response(e),
    }
}
