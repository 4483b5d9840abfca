//! Catalog browsing: filter matching and the distinct filter options.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use storefront_core::Money;

use crate::device::Device;

/// Storefront catalog query. Every field is optional; `None` matches all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFilter {
    pub device_type: Option<String>,
    pub brand: Option<String>,
    pub min_price: Option<Money>,
    pub max_price: Option<Money>,
    pub search: Option<String>,
}

impl DeviceFilter {
    pub fn matches(&self, device: &Device) -> bool {
        if let Some(t) = non_blank(&self.device_type) {
            if !eq_folded(&device.device_type, t) {
                return false;
            }
        }
        if let Some(b) = non_blank(&self.brand) {
            if !eq_folded(&device.brand, b) {
                return false;
            }
        }
        if self.min_price.is_some_and(|min| device.price < min) {
            return false;
        }
        if self.max_price.is_some_and(|max| device.price > max) {
            return false;
        }
        if let Some(q) = non_blank(&self.search) {
            let q = q.to_lowercase();
            let hit = [&device.name, &device.description, &device.brand]
                .iter()
                .any(|field| field.to_lowercase().contains(&q));
            if !hit {
                return false;
            }
        }
        true
    }
}

/// Distinct values the storefront offers as filter choices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOptions {
    pub types: Vec<String>,
    pub brands: Vec<String>,
}

impl FilterOptions {
    pub fn from_devices<'a>(devices: impl IntoIterator<Item = &'a Device>) -> Self {
        let mut types = BTreeSet::new();
        let mut brands = BTreeSet::new();
        for device in devices {
            let t = device.device_type.trim();
            if !t.is_empty() {
                types.insert(t.to_string());
            }
            let b = device.brand.trim();
            if !b.is_empty() {
                brands.insert(b.to_string());
            }
        }
        Self {
            types: types.into_iter().collect(),
            brands: brands.into_iter().collect(),
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn eq_folded(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.to_lowercase()
}
