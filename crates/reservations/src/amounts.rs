use serde::{Deserialize, Serialize};

use storefront_core::{DomainResult, Money};

use crate::reservation::{Reservation, ReservationItem, ReservationStatus};

/// Dashboard totals.
///
/// - `published`: Σ device price × stock over the catalog
/// - `offered`: Σ item price × quantity over pending reservations
/// - `paid`: Σ total over completed reservations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountsSummary {
    pub published: Money,
    pub offered: Money,
    pub paid: Money,
}

impl AmountsSummary {
    pub fn tally<'a>(
        listed_values: impl IntoIterator<Item = DomainResult<Money>>,
        reservations: impl IntoIterator<Item = &'a Reservation>,
    ) -> DomainResult<Self> {
        let published = Money::total(listed_values)?;
        let mut offered = Money::ZERO;
        let mut paid = Money::ZERO;
        for reservation in reservations {
            match reservation.status() {
                ReservationStatus::Pending => {
                    let lines = Money::total(reservation.items().iter().map(ReservationItem::line_total))?;
                    offered = offered.checked_add(lines)?;
                }
                ReservationStatus::Completed => paid = paid.checked_add(reservation.total())?,
                ReservationStatus::Canceled => {}
            }
        }
        Ok(Self {
            published,
            offered,
            paid,
        })
    }
}
