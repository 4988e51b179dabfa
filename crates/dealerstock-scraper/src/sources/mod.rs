//! Per-origin parsers. Each source kind pairs a fixed tier list with the
//! pure `(markup) -> candidates` functions those tiers call.

pub mod car_marketplace;
pub mod dealer_api;
pub mod machinery_marketplace;
pub mod truck_marketplace;

use dealerstock_core::SourceKind;

use crate::error::ScraperError;
use crate::heuristic::proximity_scan;
use crate::tiers::Tier;
use crate::types::RawListing;

/// Markup parsers for one source kind.
///
/// Defaults find nothing, so a kind only overrides the tiers it lists.
pub trait ListingParser: Send + Sync {
    /// Tiers in priority order.
    fn tiers(&self) -> &'static [Tier];

    /// Marker expected in rendered markup once listings have loaded.
    fn ready_marker(&self) -> Option<&'static str> {
        None
    }

    /// Structured data embedded in the page.
    ///
    /// # Errors
    ///
    /// [`ScraperError::UpstreamMalformed`] or [`ScraperError::Deserialize`]
    /// when an embedded block is present but unreadable.
    fn parse_embedded(&self, _markup: &str) -> Result<Vec<RawListing>, ScraperError> {
        Ok(Vec::new())
    }

    /// Repeating listing blocks in served markup.
    fn parse_static(&self, _markup: &str) -> Vec<RawListing> {
        Vec::new()
    }

    /// Rendered markup is read with the embedded parser first and the
    /// static parser second.
    fn parse_rendered(&self, markup: &str) -> Vec<RawListing> {
        match self.parse_embedded(markup) {
            Ok(listings) if !listings.is_empty() => listings,
            Ok(_) => self.parse_static(markup),
            Err(e) => {
                tracing::debug!(error = %e, "embedded data unreadable in rendered markup");
                self.parse_static(markup)
            }
        }
    }

    fn parse_heuristic(&self, markup: &str) -> Vec<RawListing> {
        proximity_scan(markup)
    }
}

static DEALER_API: dealer_api::DealerApiParser = dealer_api::DealerApiParser;
static CAR: car_marketplace::CarMarketplaceParser = car_marketplace::CarMarketplaceParser;
static TRUCK: truck_marketplace::TruckMarketplaceParser =
    truck_marketplace::TruckMarketplaceParser;
static MACHINERY: machinery_marketplace::MachineryMarketplaceParser =
    machinery_marketplace::MachineryMarketplaceParser;

/// The parser set for `kind`.
#[must_use]
pub fn parser_for(kind: SourceKind) -> &'static dyn ListingParser {
    match kind {
        SourceKind::DealerApi => &DEALER_API,
        SourceKind::CarMarketplace => &CAR,
        SourceKind::TruckMarketplace => &TRUCK,
        SourceKind::MachineryMarketplace => &MACHINERY,
    }
}
