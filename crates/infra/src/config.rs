//! Configuration loading and representation.
//!
//! Everything comes from environment variables. Unset optional values fall
//! back to dev defaults; malformed values are errors.

use std::net::SocketAddr;

use thiserror::Error;

use storefront_offers::OfferFloor;
pub use storefront_observability::LogFormat;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_ADMIN_TOKEN: &str = "dev-admin-token";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("{0} must be set when USE_PERSISTENT_STORES=true")]
    Missing(&'static str),
}

/// Postgres connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorefrontConfig {
    pub bind_addr: SocketAddr,
    /// `None` selects the in-memory store.
    pub database: Option<DatabaseConfig>,
    pub admin_token: String,
    pub admin_emails: Vec<String>,
    pub offer_floor: OfferFloor,
    pub log_format: LogFormat,
}

impl StorefrontConfig {
    /// In-memory defaults; what tests and `cargo run` without env get.
    pub fn dev() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            database: None,
            admin_token: DEFAULT_ADMIN_TOKEN.to_string(),
            admin_emails: Vec::new(),
            offer_floor: OfferFloor::default(),
            log_format: LogFormat::Json,
        }
    }

    /// True when ADMIN_TOKEN was left unset; callers log a warning once
    /// logging is up.
    pub fn uses_default_admin_token(&self) -> bool {
        self.admin_token == DEFAULT_ADMIN_TOKEN
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup (tests pass a map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = var("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| invalid("BIND_ADDR", e))?;

        let persistent = match var("USE_PERSISTENT_STORES") {
            Some(v) => parse_bool(&v).ok_or_else(|| invalid("USE_PERSISTENT_STORES", "expected true/false"))?,
            None => false,
        };

        let database = if persistent {
            let url = var("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
            let max_connections = match var("DATABASE_MAX_CONNECTIONS") {
                Some(v) => v
                    .parse::<u32>()
                    .map_err(|e| invalid("DATABASE_MAX_CONNECTIONS", e))?,
                None => DEFAULT_MAX_CONNECTIONS,
            };
            Some(DatabaseConfig {
                url,
                max_connections,
            })
        } else {
            None
        };

        let admin_token = var("ADMIN_TOKEN").unwrap_or_else(|| DEFAULT_ADMIN_TOKEN.to_string());

        let admin_emails = var("ADMIN_EMAILS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|e| !e.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let offer_floor = match var("OFFER_FLOOR_PERCENT") {
            Some(v) => {
                let percent = v
                    .parse::<u32>()
                    .map_err(|e| invalid("OFFER_FLOOR_PERCENT", e))?;
                OfferFloor::new(percent).map_err(|e| invalid("OFFER_FLOOR_PERCENT", e))?
            }
            None => OfferFloor::default(),
        };

        let log_format = match var("LOG_FORMAT") {
            Some(v) => v.parse::<LogFormat>().map_err(|e| invalid("LOG_FORMAT", e))?,
            None => LogFormat::default(),
        };

        Ok(Self {
            bind_addr,
            database,
            admin_token,
            admin_emails,
            offer_floor,
            log_format,
        })
    }
}

fn invalid(name: &'static str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        name,
        reason: reason.to_string(),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
