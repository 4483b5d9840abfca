use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{Customer, DeviceId, Money};
use storefront_infra::{
    CartLine, CartOutcome, CartSubmission, OfferAction, OfferActionOutcome,
    ReservationStatusChange,
};
use storefront_inventory::{Device, DeviceFilter, DeviceSpec};
use storefront_offers::{Offer, OfferStatus};
use storefront_reservations::{AmountsSummary, Reservation, ReservationItem};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CustomerRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub comments: Option<String>,
}

/// Cart submission body.
///
/// Accepts the customer either nested (`customer: {...}`) or flattened
/// (`customerName`, `customerEmail`, ...). A client-sent `total` is ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitCartRequest {
    pub customer: Option<CustomerRequest>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub comments: Option<String>,
    #[serde(default)]
    pub items: Vec<CartItemRequest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemRequest {
    #[serde(alias = "id")]
    pub device_id: String,
    pub quantity: i64,
    pub price: Money,
    /// Defaults to `price`, i.e. a list-price line.
    pub original_price: Option<Money>,
}

impl SubmitCartRequest {
    pub fn into_submission(self) -> Result<CartSubmission, axum::response::Response> {
        let customer = match self.customer {
            Some(c) => Customer::new(c.name, c.email, c.phone, c.comments),
            None => match (self.customer_name, self.customer_email, self.customer_phone) {
                (Some(name), Some(email), Some(phone)) => {
                    Customer::new(name, email, phone, self.comments)
                }
                _ => {
                    return Err(errors::json_error(
                        StatusCode::BAD_REQUEST,
                        "validation_error",
                        "customer name, email and phone are required",
                    ));
                }
            },
        }
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string()))?;

        let lines = self
            .items
            .into_iter()
            .map(|item| {
                let device_id = DeviceId::new(item.device_id).map_err(|_| errors::invalid_id("device"))?;
                Ok(CartLine {
                    device_id,
                    quantity: item.quantity,
                    price: item.price,
                    original_price: item.original_price.unwrap_or(item.price),
                })
            })
            .collect::<Result<Vec<_>, axum::response::Response>>()?;

        Ok(CartSubmission { customer, lines })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferActionRequest {
    pub action: String,
    pub rejection_reason: Option<String>,
}

impl OfferActionRequest {
    pub fn into_action(self) -> Result<OfferAction, axum::response::Response> {
        match self.action.trim().to_lowercase().as_str() {
            "accept" => Ok(OfferAction::Accept),
            "reject" => Ok(OfferAction::Reject {
                reason: self.rejection_reason,
            }),
            _ => Err(errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_action",
                "action must be one of: accept, reject",
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationStatusRequest {
    pub status: String,
    pub cancellation_reason: Option<String>,
}

impl ReservationStatusRequest {
    pub fn into_change(self) -> Result<ReservationStatusChange, axum::response::Response> {
        match self.status.trim().to_lowercase().as_str() {
            "completed" => Ok(ReservationStatusChange::Complete),
            "canceled" | "cancelled" => Ok(ReservationStatusChange::Cancel {
                reason: self.cancellation_reason,
            }),
            _ => Err(errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_status",
                "status must be one of: completed, canceled",
            )),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceQuery {
    #[serde(rename = "type")]
    pub device_type: Option<String>,
    pub brand: Option<String>,
    pub min_price: Option<Money>,
    pub max_price: Option<Money>,
    pub search: Option<String>,
}

impl From<DeviceQuery> for DeviceFilter {
    fn from(q: DeviceQuery) -> Self {
        DeviceFilter {
            device_type: q.device_type,
            brand: q.brand,
            min_price: q.min_price,
            max_price: q.max_price,
            search: q.search,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct OffersQuery {
    pub status: Option<String>,
}

impl OffersQuery {
    pub fn status(&self) -> Result<Option<OfferStatus>, axum::response::Response> {
        match self.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None => Ok(None),
            Some(s) => s.parse::<OfferStatus>().map(Some).map_err(|_| {
                errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_status",
                    "status must be one of: pending, accepted, rejected, cancelled",
                )
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DeviceRequest {
    pub name: String,
    #[serde(default)]
    pub brand: String,
    #[serde(rename = "type", default)]
    pub device_type: String,
    #[serde(default)]
    pub description: String,
    pub price: Money,
    pub stock: i64,
    #[serde(default)]
    pub image: String,
}

impl From<DeviceRequest> for DeviceSpec {
    fn from(r: DeviceRequest) -> Self {
        DeviceSpec {
            name: r.name,
            brand: r.brand,
            device_type: r.device_type,
            description: r.description,
            price: r.price,
            stock: r.stock,
            image: r.image,
        }
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceView {
    pub id: String,
    pub name: String,
    pub brand: String,
    #[serde(rename = "type")]
    pub device_type: String,
    pub description: String,
    pub price: Money,
    pub stock: i64,
    pub image: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Device> for DeviceView {
    fn from(d: &Device) -> Self {
        Self {
            id: d.id.to_string(),
            name: d.name.clone(),
            brand: d.brand.clone(),
            device_type: d.device_type.clone(),
            description: d.description.clone(),
            price: d.price,
            stock: d.stock(),
            image: d.image.clone(),
            created_at: d.created_at,
            updated_at: d.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferView {
    pub id: String,
    pub device_id: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub comments: String,
    pub offer_price: Money,
    pub original_price: Money,
    pub quantity: i64,
    pub status: OfferStatus,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Offer> for OfferView {
    fn from(o: &Offer) -> Self {
        Self {
            id: o.id.to_string(),
            device_id: o.device_id.to_string(),
            customer_name: o.customer.name.clone(),
            customer_email: o.customer.email.clone(),
            customer_phone: o.customer.phone.clone(),
            comments: o.customer.comments.clone(),
            offer_price: o.offer_price,
            original_price: o.original_price,
            quantity: o.quantity,
            status: o.status(),
            rejection_reason: o.rejection_reason().map(str::to_string),
            created_at: o.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationItemView {
    pub device_id: String,
    pub price: Money,
    pub original_price: Money,
    pub quantity: i64,
}

impl From<&ReservationItem> for ReservationItemView {
    fn from(i: &ReservationItem) -> Self {
        Self {
            device_id: i.device_id.to_string(),
            price: i.price,
            original_price: i.original_price,
            quantity: i.quantity,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationView {
    pub id: String,
    pub code: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub comments: String,
    pub status: String,
    pub cancellation_reason: Option<String>,
    pub total: Money,
    pub offer_id: Option<String>,
    pub items: Vec<ReservationItemView>,
    pub created_at: DateTime<Utc>,
}

impl From<&Reservation> for ReservationView {
    fn from(r: &Reservation) -> Self {
        Self {
            id: r.id.to_string(),
            code: r.code.to_string(),
            customer_name: r.customer.name.clone(),
            customer_email: r.customer.email.clone(),
            customer_phone: r.customer.phone.clone(),
            comments: r.customer.comments.clone(),
            status: r.status().to_string(),
            cancellation_reason: r.cancellation_reason().map(str::to_string),
            total: r.total(),
            offer_id: r.offer_id.map(|id| id.to_string()),
            items: r.items().iter().map(ReservationItemView::from).collect(),
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartResponse {
    pub reservation_code: Option<String>,
    pub has_offers: bool,
    pub offer_count: usize,
}

impl From<&CartOutcome> for CartResponse {
    fn from(outcome: &CartOutcome) -> Self {
        Self {
            reservation_code: outcome.reservation_code().map(ToString::to_string),
            has_offers: outcome.has_offers(),
            offer_count: outcome.offer_count(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferActionResponse {
    pub offer: OfferView,
    pub reservation: Option<ReservationView>,
    pub reservation_code: Option<String>,
    pub cancelled_offers: usize,
}

impl From<&OfferActionOutcome> for OfferActionResponse {
    fn from(outcome: &OfferActionOutcome) -> Self {
        Self {
            offer: OfferView::from(&outcome.offer),
            reservation: outcome.reservation.as_ref().map(ReservationView::from),
            reservation_code: outcome.reservation.as_ref().map(|r| r.code.to_string()),
            cancelled_offers: outcome.cancelled_offers,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AmountsView {
    pub published_amount: Money,
    pub offered_amount: Money,
    pub paid_amount: Money,
}

impl From<AmountsSummary> for AmountsView {
    fn from(a: AmountsSummary) -> Self {
        Self {
            published_amount: a.published,
            offered_amount: a.offered,
            paid_amount: a.paid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cart(value: serde_json::Value) -> Result<CartSubmission, StatusCode> {
        let req: SubmitCartRequest = serde_json::from_value(value).unwrap();
        req.into_submission().map_err(|r| r.status())
    }

    #[test]
    fn nested_and_flat_customers_normalize_to_the_same_cart() {
        let nested = cart(json!({
            "customer": {"name": "Ana Pérez", "email": "ana@example.com", "phone": "5550101000"},
            "items": [{"deviceId": "d1", "quantity": 2, "price": 100, "originalPrice": 100}],
        }))
        .unwrap();
        let flat = cart(json!({
            "customerName": "Ana Pérez",
            "customerEmail": "ana@example.com",
            "customerPhone": "5550101000",
            "items": [{"id": "d1", "quantity": 2, "price": "100"}],
            "total": 999,
        }))
        .unwrap();

        assert_eq!(nested, flat);
        assert!(flat.lines[0].is_list_price());
    }

    #[test]
    fn missing_customer_fields_are_bad_requests() {
        let status = cart(json!({
            "customerName": "Ana Pérez",
            "items": [{"deviceId": "d1", "quantity": 1, "price": 100}],
        }))
        .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let status = cart(json!({
            "customer": {"name": "Ana", "email": "not-an-email", "phone": "5550101000"},
            "items": [],
        }))
        .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn offer_action_and_status_parsing() {
        let accept: OfferActionRequest = serde_json::from_value(json!({"action": "ACCEPT"})).unwrap();
        assert_eq!(accept.into_action().unwrap(), OfferAction::Accept);

        let reject: OfferActionRequest =
            serde_json::from_value(json!({"action": "reject", "rejectionReason": "bajo"})).unwrap();
        assert_eq!(
            reject.into_action().unwrap(),
            OfferAction::Reject {
                reason: Some("bajo".to_string())
            }
        );

        let cancel: ReservationStatusRequest =
            serde_json::from_value(json!({"status": "cancelled"})).unwrap();
        assert_eq!(
            cancel.into_change().unwrap(),
            ReservationStatusChange::Cancel { reason: None }
        );

        let pending: ReservationStatusRequest =
            serde_json::from_value(json!({"status": "pending"})).unwrap();
        assert_eq!(pending.into_change().unwrap_err().status(), StatusCode::BAD_REQUEST);
    }
}
