use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use storefront_infra::ReconciliationError;
use storefront_inventory::StockShortage;

pub fn reconciliation_error_to_response(err: ReconciliationError) -> axum::response::Response {
    match err {
        ReconciliationError::DeviceNotFound(ids) => device_not_found(&ids),
        ReconciliationError::OfferNotFound(id) => json_error(
            StatusCode::NOT_FOUND,
            "offer_not_found",
            format!("offer '{id}' not found"),
        ),
        ReconciliationError::ReservationNotFound(id) => json_error(
            StatusCode::NOT_FOUND,
            "reservation_not_found",
            format!("reservation '{id}' not found"),
        ),
        ReconciliationError::InsufficientStock(shortages) => insufficient_stock(&shortages),
        ReconciliationError::InvalidInput(msg) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        ReconciliationError::InvalidTransition(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invalid_transition", msg)
        }
        ReconciliationError::TransactionFailure(msg) => {
            tracing::error!(error = %msg, "transaction failed");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "transaction_failed",
                "the operation could not be completed; nothing was changed",
            )
        }
    }
}

/// 404 naming every unknown device; `details.deviceIds` carries them all.
fn device_not_found(ids: &[String]) -> axum::response::Response {
    let message = match ids {
        [id] => format!("device '{id}' not found"),
        _ => format!("devices not found: {}", ids.join(", ")),
    };
    json_error_with_details(
        StatusCode::NOT_FOUND,
        "device_not_found",
        message,
        json!({ "deviceIds": ids }),
    )
}

/// 409 listing every device that could not be covered.
fn insufficient_stock(shortages: &[StockShortage]) -> axum::response::Response {
    let message = shortages
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    let details = json!({
        "shortages": shortages
            .iter()
            .map(|s| json!({
                "deviceId": s.device_id.as_str(),
                "deviceName": s.device_name,
                "requested": s.requested,
                "available": s.available,
            }))
            .collect::<Vec<_>>(),
    });
    json_error_with_details(StatusCode::CONFLICT, "insufficient_stock", message, details)
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn json_error_with_details(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
    details: serde_json::Value,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
            "details": details,
        })),
    )
        .into_response()
}

pub fn invalid_id(what: &str) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id"))
}
