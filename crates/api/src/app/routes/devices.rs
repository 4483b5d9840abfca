use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};

use storefront_core::DeviceId;
use storefront_inventory::DeviceFilter;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_devices))
        .route("/filters", get(filter_options))
        .route("/:id", get(get_device))
}

pub fn admin_router() -> Router {
    Router::new().route("/:id", put(upsert_device))
}

pub async fn list_devices(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::DeviceQuery>,
) -> axum::response::Response {
    let filter = DeviceFilter::from(query);
    match services.engine.devices(&filter).await {
        Ok(devices) => {
            let views: Vec<dto::DeviceView> = devices.iter().map(dto::DeviceView::from).collect();
            (StatusCode::OK, Json(views)).into_response()
        }
        Err(e) => errors::reconciliation_error_to_response(e),
    }
}

pub async fn filter_options(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.engine.filter_options().await {
        Ok(options) => (StatusCode::OK, Json(options)).into_response(),
        Err(e) => errors::reconciliation_error_to_response(e),
    }
}

pub async fn get_device(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match DeviceId::new(id) {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("device"),
    };

    match services.engine.device(&id).await {
        Ok(device) => (StatusCode::OK, Json(dto::DeviceView::from(&device))).into_response(),
        Err(e) => errors::reconciliation_error_to_response(e),
    }
}

pub async fn upsert_device(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::DeviceRequest>,
) -> axum::response::Response {
    let id = match DeviceId::new(id) {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("device"),
    };

    match services.engine.upsert_device(id, body.into()).await {
        Ok(device) => (StatusCode::OK, Json(dto::DeviceView::from(&device))).into_response(),
        Err(e) => errors::reconciliation_error_to_response(e),
    }
}
