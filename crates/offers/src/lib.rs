//! Offers domain module.
//!
//! Customer price offers on catalog devices and the admin decision state
//! machine, implemented purely as deterministic domain logic (no IO, no HTTP,
//! no storage).

pub mod offer;
pub mod policy;

pub use offer::{
    COMPETING_OFFER_ACCEPTED_REASON, DEFAULT_REJECTION_REASON, NewOffer, Offer, OfferDecision,
    OfferStatus,
};
pub use policy::OfferFloor;
