use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use storefront_core::OfferId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_offers))
        .route("/:id", get(get_offer))
        .route("/:id/action", post(offer_action))
        .route("/:id/notify", post(renotify_offer))
}

fn parse_offer_id(id: &str) -> Result<OfferId, axum::response::Response> {
    id.parse().map_err(|_| errors::invalid_id("offer"))
}

pub async fn list_offers(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::OffersQuery>,
) -> axum::response::Response {
    let status = match query.status() {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    match services.engine.offers(status).await {
        Ok(offers) => {
            let views: Vec<dto::OfferView> = offers.iter().map(dto::OfferView::from).collect();
            (StatusCode::OK, Json(views)).into_response()
        }
        Err(e) => errors::reconciliation_error_to_response(e),
    }
}

pub async fn get_offer(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_offer_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.engine.offer(id).await {
        Ok(offer) => (StatusCode::OK, Json(dto::OfferView::from(&offer))).into_response(),
        Err(e) => errors::reconciliation_error_to_response(e),
    }
}

/// Accept or reject a pending offer.
pub async fn offer_action(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::OfferActionRequest>,
) -> axum::response::Response {
    let id = match parse_offer_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let action = match body.into_action() {
        Ok(a) => a,
        Err(resp) => return resp,
    };

    match services.engine.decide_offer(id, action).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(dto::OfferActionResponse::from(&outcome)),
        )
            .into_response(),
        Err(e) => errors::reconciliation_error_to_response(e),
    }
}

pub async fn renotify_offer(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_offer_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.engine.renotify_offer_decision(id).await {
        Ok(delivered) => (
            StatusCode::OK,
            Json(serde_json::json!({ "delivered": delivered })),
        )
            .into_response(),
        Err(e) => errors::reconciliation_error_to_response(e),
    }
}
