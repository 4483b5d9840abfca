//! Infrastructure layer: persistence, notifications, config and the
//! reconciliation workflows that tie them to the domain crates.

pub mod config;
pub mod notify;
pub mod reconciliation;
pub mod store;

mod integration_tests;

pub use config::{ConfigError, DatabaseConfig, LogFormat, StorefrontConfig};
pub use notify::{
    Notifier, NotifyError, OfferDecisionNotice, RecordingNotifier, ReservationConfirmation,
    SentNotification, TracingNotifier,
};
pub use reconciliation::{
    CartLine, CartOutcome, CartSubmission, OfferAction, OfferActionOutcome, ReconciliationEngine,
    ReconciliationError, ReservationStatusChange,
};
pub use store::{InMemoryStore, PostgresStore, Store, StoreError, StoreTransaction};
