//! Canonical vehicle types shared by every origin.
//!
//! These are the two wire shapes handed to the HTTP layer: the list payload
//! ([`VehiclesResponse`]) and the deep-link payload ([`VehicleDetail`]).
//! Field names serialize in camelCase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Inventory bucket a listing is shown under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Pkw,
    Nutzfahrzeuge,
    Baumaschine,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Pkw => write!(f, "pkw"),
            Category::Nutzfahrzeuge => write!(f, "nutzfahrzeuge"),
            Category::Baumaschine => write!(f, "baumaschine"),
        }
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pkw" => Ok(Category::Pkw),
            "nutzfahrzeuge" => Ok(Category::Nutzfahrzeuge),
            "baumaschine" => Ok(Category::Baumaschine),
            other => Err(format!("unknown category \"{other}\"")),
        }
    }
}

/// Asking price in whole currency units, or the explicit "price on request"
/// marker. Serializes as a bare integer or the string `"on_request"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Price {
    Amount(u64),
    OnRequest,
}

const ON_REQUEST: &str = "on_request";

impl Price {
    #[must_use]
    pub fn amount(self) -> Option<u64> {
        match self {
            Price::Amount(v) => Some(v),
            Price::OnRequest => None,
        }
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Price::Amount(v) => serializer.serialize_u64(*v),
            Price::OnRequest => serializer.serialize_str(ON_REQUEST),
        }
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Amount(u64),
            Marker(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Amount(v) => Ok(Price::Amount(v)),
            Repr::Marker(s) if s == ON_REQUEST => Ok(Price::OnRequest),
            Repr::Marker(s) => Err(serde::de::Error::custom(format!(
                "expected integer price or \"{ON_REQUEST}\", got \"{s}\""
            ))),
        }
    }
}

/// Engine output in both units. Both are always populated after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Power {
    pub kw: u32,
    pub ps: u32,
}

/// A normalized, source-independent listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    /// Origin-supplied id where available, otherwise a content hash.
    pub id: String,
    /// Configured id of the source that produced this record.
    pub source: String,
    pub title: String,
    pub price: Price,
    pub year: Option<u16>,
    /// Odometer reading in kilometres.
    pub mileage: Option<u32>,
    pub fuel_type: Option<String>,
    pub power: Option<Power>,
    pub transmission: Option<String>,
    pub image: Option<String>,
    #[serde(default)]
    pub all_images: Vec<String>,
    pub category: Category,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSpec {
    pub capacity_ccm: Option<u32>,
    pub cylinders: Option<u8>,
    pub emission_class: Option<String>,
    pub co2_emission_g_km: Option<u32>,
    pub consumption_combined_l_100km: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dimensions {
    pub length_mm: Option<u32>,
    pub width_mm: Option<u32>,
    pub height_mm: Option<u32>,
    pub weight_kg: Option<u32>,
    pub seats: Option<u8>,
    pub doors: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeasingTerms {
    pub monthly_rate: u64,
    pub duration_months: Option<u16>,
    pub down_payment: Option<u64>,
    pub annual_mileage_km: Option<u32>,
}

/// Extended record for deep-link views. Only ever built from the structured
/// detail API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleDetail {
    #[serde(flatten)]
    pub vehicle: Vehicle,
    pub engine: EngineSpec,
    pub dimensions: Dimensions,
    #[serde(default)]
    pub equipment: Vec<String>,
    pub description: Option<String>,
    pub warranty: Option<String>,
    pub leasing: Option<LeasingTerms>,
    pub color: Option<String>,
    pub previous_owners: Option<u8>,
    pub condition: Option<String>,
}

/// Payload returned by the list operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehiclesResponse {
    pub vehicles: Vec<Vehicle>,
    /// `true` when the list came from the cache rather than a live pass.
    pub cached: bool,
    /// `true` when a refresh failed and an expired list is being served.
    #[serde(default)]
    pub stale: bool,
    pub timestamp: DateTime<Utc>,
    pub count: usize,
    /// Generic failure marker, set only when no list has ever been cached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
