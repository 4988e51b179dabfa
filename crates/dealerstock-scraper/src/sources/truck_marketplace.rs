//! Commercial-vehicle marketplace. Result pages carry schema.org JSON-LD
//! (an `ItemList` of offers, or standalone `Vehicle`/`Product` nodes) and
//! link every hit as `/angebote/<slug>-<id>`.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::ListingParser;
use crate::error::ScraperError;
use crate::extract::{first_capture, id_windows, json_f64, json_str, jsonld_nodes, jsonld_type_is};
use crate::fields::{fill_generic, price_in_text};
use crate::tiers::Tier;
use crate::types::{RawListing, RawPrice};

const VEHICLE_TYPES: &[&str] = &["Vehicle", "Car", "Product", "BusOrCoach", "Motorcycle"];
/// Result cards open with their offer link, so blocks start at the link.
const CARD_WINDOW: usize = 3_000;

static OFFER_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)href\s*=\s*["'][^"']*/angebote/[a-z0-9-]+-(\d+)\b[^"']*["']"#)
        .expect("valid regex")
});

static OFFER_HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)href\s*=\s*["']([^"']*/angebote/[a-z0-9-]+-\d+[^"']*)["']"#)
        .expect("valid regex")
});

static URL_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-(\d+)(?:[/?#.]|$)").expect("valid regex"));

static TITLE_CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)class\s*=\s*["'][^"']*\b(?:title|headline)\b[^"']*["'][^>]*>(.*?)</"#)
        .expect("valid regex")
});

static PRICE_CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)class\s*=\s*["'][^"']*\bprice\b[^"']*["'][^>]*>(.*?)</"#).expect("valid regex")
});

pub struct TruckMarketplaceParser;

impl ListingParser for TruckMarketplaceParser {
    fn tiers(&self) -> &'static [Tier] {
        &[
            Tier::EmbeddedData,
            Tier::RenderedDom,
            Tier::StaticHtml,
            Tier::Heuristic,
        ]
    }

    fn ready_marker(&self) -> Option<&'static str> {
        Some("/angebote/")
    }

    fn parse_embedded(&self, markup: &str) -> Result<Vec<RawListing>, ScraperError> {
        let mut listings = Vec::new();
        let mut seen = HashSet::new();
        let mut push = |listing: RawListing, listings: &mut Vec<RawListing>| {
            let key = listing.id.clone().or_else(|| listing.url.clone());
            if key.is_none_or(|k| seen.insert(k)) {
                listings.push(listing);
            }
        };

        for node in jsonld_nodes(markup) {
            if jsonld_type_is(&node, &["ItemList"]) {
                let elements = node
                    .get("itemListElement")
                    .and_then(Value::as_array)
                    .ok_or_else(|| ScraperError::UpstreamMalformed {
                        context: "JSON-LD ItemList without itemListElement array".to_string(),
                    })?;
                for element in elements {
                    let item = element.get("item").unwrap_or(element);
                    if let Some(listing) = vehicle_node(item) {
                        push(listing, &mut listings);
                    }
                }
            } else if jsonld_type_is(&node, VEHICLE_TYPES) && node.get("offers").is_some() {
                if let Some(listing) = vehicle_node(&node) {
                    push(listing, &mut listings);
                }
            }
        }
        Ok(listings)
    }

    fn parse_static(&self, markup: &str) -> Vec<RawListing> {
        id_windows(markup, &OFFER_LINK_RE, 0, CARD_WINDOW)
            .into_iter()
            .map(|block| {
                let needle = format!("-{}", block.id);
                let url = OFFER_HREF_RE
                    .captures_iter(block.window)
                    .filter_map(|caps| caps.get(1))
                    .map(|m| m.as_str().to_string())
                    .find(|href| href.contains(&needle));
                let mut listing = RawListing {
                    id: Some(block.id),
                    title: first_capture(&TITLE_CLASS_RE, block.window),
                    price: first_capture(&PRICE_CLASS_RE, block.window)
                        .and_then(|text| price_in_text(&text).or(Some(RawPrice::Text(text)))),
                    url,
                    ..RawListing::default()
                };
                fill_generic(&mut listing, block.window);
                listing
            })
            .collect()
    }
}

/// Maps one schema.org vehicle/product node. Nodes with neither a name nor
/// an offer are not listings.
fn vehicle_node(node: &Value) -> Option<RawListing> {
    let offer = match node.get("offers") {
        Some(Value::Array(offers)) => offers.first(),
        other => other,
    };
    let name = json_str(node.get("name")).or_else(|| {
        let brand = json_str(node.get("brand").and_then(|b| b.get("name")))
            .or_else(|| json_str(node.get("brand")));
        let model = json_str(node.get("model"));
        let joined = [brand, model].into_iter().flatten().collect::<Vec<_>>().join(" ");
        (!joined.is_empty()).then_some(joined)
    });
    if name.is_none() && offer.is_none() {
        return None;
    }

    let url = json_str(node.get("url"))
        .or_else(|| offer.and_then(|o| json_str(o.get("url"))));
    let id = ["sku", "productID", "vehicleIdentificationNumber"]
        .iter()
        .find_map(|key| json_str(node.get(*key)))
        .or_else(|| identifier(node.get("identifier")))
        .or_else(|| {
            url.as_deref()
                .and_then(|u| URL_ID_RE.captures(u))
                .map(|caps| caps[1].to_string())
        });

    let engine = match node.get("vehicleEngine") {
        Some(Value::Array(engines)) => engines.first(),
        other => other,
    };
    let (power_kw, power_ps, power_text) = engine_power(engine.and_then(|e| e.get("enginePower")));

    Some(RawListing {
        id,
        title: name,
        price: offer.and_then(offer_price),
        year: ["dateVehicleFirstRegistered", "productionDate", "vehicleModelDate"]
            .iter()
            .find_map(|key| json_str(node.get(*key))),
        mileage: node.get("mileageFromOdometer").and_then(|m| {
            json_str(m.get("value")).or_else(|| json_str(Some(m)))
        }),
        fuel: json_str(node.get("fuelType"))
            .or_else(|| json_str(engine.and_then(|e| e.get("fuelType")))),
        power_text,
        power_kw,
        power_ps,
        transmission: json_str(node.get("vehicleTransmission")),
        images: images(node.get("image")),
        url,
        category_hint: json_str(node.get("bodyType")).or_else(|| json_str(node.get("category"))),
    })
}

fn identifier(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Object(map) => json_str(map.get("value")),
        other => json_str(Some(other)),
    }
}

fn offer_price(offer: &Value) -> Option<RawPrice> {
    let price = offer
        .get("price")
        .or_else(|| offer.pointer("/priceSpecification/price"))?;
    match price {
        Value::Number(n) => n.as_f64().map(RawPrice::Number),
        Value::String(s) if !s.trim().is_empty() => Some(RawPrice::Text(s.clone())),
        _ => None,
    }
}

/// `enginePower` is a `QuantitativeValue` (`unitCode` `KWT` or `BHP`) or
/// free text.
fn engine_power(value: Option<&Value>) -> (Option<f64>, Option<f64>, Option<String>) {
    match value {
        Some(Value::Object(map)) => {
            let amount = json_f64(map.get("value"));
            let unit = json_str(map.get("unitCode")).unwrap_or_default();
            match unit.to_ascii_uppercase().as_str() {
                "KWT" | "KW" => (amount, None, None),
                "BHP" | "PS" | "HP" => (None, amount, None),
                _ => (None, None, json_str(map.get("value"))),
            }
        }
        Some(Value::Array(items)) => engine_power(items.first()),
        Some(other) => (None, None, json_str(Some(other))),
        None => (None, None, None),
    }
}

fn images(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().flat_map(|i| images(Some(i))).collect(),
        Some(Value::Object(map)) => json_str(map.get("url"))
            .or_else(|| json_str(map.get("contentUrl")))
            .into_iter()
            .collect(),
        Some(other) => json_str(Some(other)).into_iter().collect(),
        None => Vec::new(),
    }
}
