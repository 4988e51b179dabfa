//! Intermediate types between extraction tiers and the normalizer.

use dealerstock_core::Vehicle;

use crate::error::ErrorKind;
use crate::tiers::{Tier, TierAttempt};

/// Price as found in the origin, before coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum RawPrice {
    /// Free text such as `"36.990 €"`, `"36990.0"` or `"Preis auf Anfrage"`.
    Text(String),
    Number(f64),
    /// The origin flagged the price as on request.
    OnRequest,
}

/// One listing candidate as extracted by a tier. Every field is optional;
/// the normalizer decides whether the record is usable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawListing {
    pub id: Option<String>,
    pub title: Option<String>,
    pub price: Option<RawPrice>,
    /// Registration or build date text, e.g. `"05/2019"` or `"201905"`.
    pub year: Option<String>,
    /// Odometer text, e.g. `"130.438 km"`.
    pub mileage: Option<String>,
    pub fuel: Option<String>,
    /// Combined power text such as `"110 kW (150 PS)"`.
    pub power_text: Option<String>,
    pub power_kw: Option<f64>,
    pub power_ps: Option<f64>,
    pub transmission: Option<String>,
    /// Image URLs in display order; may be relative.
    pub images: Vec<String>,
    pub url: Option<String>,
    /// Origin-provided category or body type, used by the classifier.
    pub category_hint: Option<String>,
}

impl RawListing {
    /// Fills every `None` field of `self` from `other`.
    pub(crate) fn fill_from(&mut self, other: RawListing) {
        macro_rules! fill {
            ($($field:ident),*) => {
                $(if self.$field.is_none() { self.$field = other.$field; })*
            };
        }
        fill!(
            id,
            title,
            price,
            year,
            mileage,
            fuel,
            power_text,
            power_kw,
            power_ps,
            transmission,
            url,
            category_hint
        );
        if self.images.is_empty() {
            self.images = other.images;
        }
    }
}

/// Outcome of one adapter run. Never an error: source-level failures are
/// carried in `error` with `partial = true`.
#[derive(Debug, Clone)]
pub struct SourceAdapterResult {
    pub source_id: String,
    pub priority: u8,
    pub vehicles: Vec<Vehicle>,
    pub partial: bool,
    pub error: Option<String>,
    pub error_kind: Option<ErrorKind>,
    /// Tier that produced `vehicles`, if any did.
    pub tier: Option<Tier>,
    pub attempts: Vec<TierAttempt>,
}

impl SourceAdapterResult {
    #[must_use]
    pub fn failed(source_id: &str, priority: u8, kind: ErrorKind, error: String) -> Self {
        Self {
            source_id: source_id.to_owned(),
            priority,
            vehicles: Vec::new(),
            partial: true,
            error: Some(error),
            error_kind: Some(kind),
            tier: None,
            attempts: Vec::new(),
        }
    }
}
