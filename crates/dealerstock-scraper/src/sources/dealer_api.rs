//! Structured listing API scoped by dealer account: paginated search for the
//! list view and single-ad lookup for the detail view.

use dealerstock_core::{Dimensions, EngineSpec, LeasingTerms, VehicleDetail};
use serde_json::Value;

use super::ListingParser;
use crate::classify::CategoryClassifier;
use crate::client::HttpFetcher;
use crate::error::ScraperError;
use crate::extract::{clean_text, json_f64, json_str};
use crate::normalize::normalize_listing;
use crate::tiers::Tier;
use crate::types::{RawListing, RawPrice};

/// Page size requested from the search endpoint.
pub const PAGE_SIZE: u32 = 100;
/// Hard stop for pagination.
pub const MAX_PAGES: u32 = 20;

pub struct DealerApiParser;

impl ListingParser for DealerApiParser {
    fn tiers(&self) -> &'static [Tier] {
        &[Tier::StructuredApi]
    }
}

/// Fetches every listing for `account_id`, page by page, until an empty
/// page, the reported page count, or [`MAX_PAGES`].
///
/// # Errors
///
/// Any fetch or shape error on the first page. Later-page failures end
/// pagination and keep what was collected.
pub async fn fetch_listings(
    fetcher: &HttpFetcher,
    base_url: &str,
    account_id: &str,
) -> Result<Vec<RawListing>, ScraperError> {
    let search_url = format!("{}/search", base_url.trim_end_matches('/'));
    let mut listings = Vec::new();

    for page in 1..=MAX_PAGES {
        let query = [
            ("customerNumber", account_id.to_string()),
            ("page.size", PAGE_SIZE.to_string()),
            ("page.number", page.to_string()),
        ];
        let parsed = match fetcher.fetch_json(&search_url, &query).await {
            Ok(body) => parse_search_page(&body),
            Err(e) => Err(e),
        };
        let (ads, total_pages) = match parsed {
            Ok(page_data) => page_data,
            Err(e) if page > 1 => {
                tracing::warn!(page, error = %e, "search page failed; keeping earlier pages");
                break;
            }
            Err(e) => return Err(e),
        };
        tracing::debug!(page, count = ads.len(), total_pages, "fetched search page");
        if ads.is_empty() {
            break;
        }
        listings.extend(ads);
        if total_pages.is_some_and(|total| page >= total) {
            break;
        }
    }
    Ok(listings)
}

/// Reads one search response: `{"ads": [...], "totalPages"?: n}` or a bare
/// array of ads.
///
/// # Errors
///
/// [`ScraperError::UpstreamMalformed`] for any other shape.
pub fn parse_search_page(body: &Value) -> Result<(Vec<RawListing>, Option<u32>), ScraperError> {
    let (ads, total_pages) = match body {
        Value::Array(ads) => (ads, None),
        Value::Object(map) => {
            let ads = map.get("ads").and_then(Value::as_array).ok_or_else(|| {
                ScraperError::UpstreamMalformed {
                    context: "search response has no \"ads\" array".to_string(),
                }
            })?;
            let total = map
                .get("totalPages")
                .or_else(|| map.get("maxPages"))
                .and_then(Value::as_u64)
                .and_then(|n| u32::try_from(n).ok());
            (ads, total)
        }
        _ => {
            return Err(ScraperError::UpstreamMalformed {
                context: "search response is neither an object nor an array".to_string(),
            })
        }
    };
    Ok((ads.iter().filter_map(ad_to_listing).collect(), total_pages))
}

/// Maps one API ad. Ads without an id are skipped.
#[must_use]
pub fn ad_to_listing(ad: &Value) -> Option<RawListing> {
    let id = json_str(ad.get("mobileAdId")).or_else(|| json_str(ad.get("id")))?;

    let title = [
        json_str(ad.get("make")),
        json_str(ad.get("model")),
        json_str(ad.get("modelDescription")),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(" ");

    let price = ad.get("price").and_then(|p| {
        let gross = p.get("consumerPriceGross").unwrap_or(p);
        match gross {
            Value::Number(n) => n.as_f64().map(RawPrice::Number),
            Value::String(s) if !s.trim().is_empty() => Some(RawPrice::Text(s.clone())),
            _ => None,
        }
    });

    let images = ad
        .get("images")
        .and_then(Value::as_array)
        .map(|imgs| {
            imgs.iter()
                .filter_map(|img| match img {
                    Value::String(s) => Some(s.clone()),
                    other => json_str(other.get("url")).or_else(|| json_str(other.get("ref"))),
                })
                .collect()
        })
        .unwrap_or_default();

    Some(RawListing {
        id: Some(id),
        title: (!title.is_empty()).then_some(title),
        price,
        year: json_str(ad.get("firstRegistration")),
        mileage: json_str(ad.get("mileage")),
        fuel: json_str(ad.get("fuel")).map(|code| fuel_label(&code)),
        power_kw: json_f64(ad.get("power")),
        transmission: json_str(ad.get("gearbox")).map(|code| gearbox_label(&code)),
        images,
        url: json_str(ad.get("detailPageUrl")),
        category_hint: json_str(ad.get("category")),
        ..RawListing::default()
    })
}

/// German display label for an API fuel code; unknown codes pass through.
#[must_use]
pub fn fuel_label(code: &str) -> String {
    match code.trim().to_ascii_uppercase().as_str() {
        "DIESEL" => "Diesel",
        "PETROL" | "BENZIN" => "Benzin",
        "ELECTRICITY" | "ELECTRIC" => "Elektro",
        "HYBRID" | "HYBRID_PETROL" => "Hybrid (Benzin/Elektro)",
        "HYBRID_DIESEL" => "Hybrid (Diesel/Elektro)",
        "LPG" => "Autogas (LPG)",
        "CNG" => "Erdgas (CNG)",
        "HYDROGENIUM" | "HYDROGEN" => "Wasserstoff",
        _ => return code.trim().to_string(),
    }
    .to_string()
}

/// German display label for an API gearbox code; unknown codes pass through.
#[must_use]
pub fn gearbox_label(code: &str) -> String {
    match code.trim().to_ascii_uppercase().as_str() {
        "MANUAL_GEARBOX" => "Schaltgetriebe",
        "AUTOMATIC_GEARBOX" => "Automatik",
        "SEMIAUTOMATIC_GEARBOX" => "Halbautomatik",
        _ => return code.trim().to_string(),
    }
    .to_string()
}

fn condition_label(code: &str) -> String {
    match code.trim().to_ascii_uppercase().as_str() {
        "NEW" => "Neu",
        "USED" => "Gebraucht",
        "DEMONSTRATION" => "Vorführfahrzeug",
        "EMPLOYEES_CAR" => "Jahreswagen",
        _ => return code.trim().to_string(),
    }
    .to_string()
}

/// Fetches one ad for the detail view.
///
/// # Errors
///
/// - [`ScraperError::NotFound`]: the API has no such ad.
/// - [`ScraperError::UpstreamMalformed`] / [`ScraperError::ValidationRejected`]:
///   the record is unusable.
/// - Network and status errors from [`HttpFetcher::fetch_json`].
pub async fn fetch_detail(
    fetcher: &HttpFetcher,
    base_url: &str,
    vid: &str,
    source_id: &str,
    classifier: &dyn CategoryClassifier,
) -> Result<VehicleDetail, ScraperError> {
    let url = format!("{}/ad/{vid}", base_url.trim_end_matches('/'));
    let body = fetcher.fetch_json(&url, &[]).await?;
    parse_detail(&body, source_id, &url, classifier)
}

/// Builds a [`VehicleDetail`] from an ad document (`{"ad": {...}}` or the ad
/// itself).
///
/// # Errors
///
/// [`ScraperError::UpstreamMalformed`] when the document is not an ad;
/// [`ScraperError::ValidationRejected`] when it lacks title or price.
pub fn parse_detail(
    body: &Value,
    source_id: &str,
    base_url: &str,
    classifier: &dyn CategoryClassifier,
) -> Result<VehicleDetail, ScraperError> {
    let ad = body.get("ad").unwrap_or(body);
    let raw = ad_to_listing(ad).ok_or_else(|| ScraperError::UpstreamMalformed {
        context: "detail response has no ad id".to_string(),
    })?;
    let category = classifier.classify(&raw);
    let vehicle = normalize_listing(raw, source_id, base_url, category)?;

    let engine = EngineSpec {
        capacity_ccm: json_u32(ad.get("cubicCapacity")),
        cylinders: json_u32(ad.get("cylinders")).and_then(|c| u8::try_from(c).ok()),
        emission_class: json_str(ad.get("emissionClass")),
        co2_emission_g_km: json_u32(
            ad.get("envkv")
                .and_then(|e| e.get("co2Emission"))
                .or_else(|| ad.get("co2Emission")),
        ),
        consumption_combined_l_100km: json_f64(
            ad.get("envkv")
                .and_then(|e| e.get("consumptionCombined"))
                .or_else(|| ad.get("combinedConsumption")),
        ),
    };

    let dimensions = Dimensions {
        length_mm: json_u32(ad.get("length")),
        width_mm: json_u32(ad.get("width")),
        height_mm: json_u32(ad.get("height")),
        weight_kg: json_u32(ad.get("grossWeight").or_else(|| ad.get("weight"))),
        seats: json_u32(ad.get("numSeats")).and_then(|v| u8::try_from(v).ok()),
        doors: json_u32(ad.get("doorCount")).and_then(|v| u8::try_from(v).ok()),
    };

    let equipment = ad
        .get("features")
        .and_then(Value::as_array)
        .map(|features| {
            features
                .iter()
                .filter_map(|f| json_str(Some(f)).or_else(|| json_str(f.get("name"))))
                .map(|f| clean_text(&f))
                .filter(|f| !f.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let description = json_str(ad.get("description"))
        // The API separates paragraphs with a backslash.
        .map(|d| clean_text(&d.replace('\\', "\n")))
        .filter(|d| !d.is_empty());

    let warranty = match ad.get("warranty") {
        Some(Value::Bool(true)) => Some("Garantie".to_string()),
        other => json_str(other).map(|w| clean_text(&w)),
    };

    let leasing = ad.get("leasing").and_then(|l| {
        let monthly_rate = json_f64(l.get("rate").or_else(|| l.get("monthlyRate")))?;
        if monthly_rate <= 0.0 {
            return None;
        }
        Some(LeasingTerms {
            monthly_rate: round_u64(monthly_rate)?,
            duration_months: json_u32(l.get("duration")).and_then(|d| u16::try_from(d).ok()),
            down_payment: json_f64(l.get("downPayment")).and_then(round_u64),
            annual_mileage_km: json_u32(l.get("annualMileage")),
        })
    });

    Ok(VehicleDetail {
        vehicle,
        engine,
        dimensions,
        equipment,
        description,
        warranty,
        leasing,
        color: json_str(ad.get("exteriorColor"))
            .or_else(|| json_str(ad.get("manufacturerColorName"))),
        previous_owners: json_u32(ad.get("numberOfPreviousOwners"))
            .and_then(|v| u8::try_from(v).ok()),
        condition: json_str(ad.get("condition")).map(|c| condition_label(&c)),
    })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn round_u64(value: f64) -> Option<u64> {
    (value.is_finite() && value >= 0.0).then(|| value.round() as u64)
}

fn json_u32(value: Option<&Value>) -> Option<u32> {
    json_f64(value)
        .and_then(round_u64)
        .and_then(|v| u32::try_from(v).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::KeywordClassifier;
    use dealerstock_core::{Category, Power, Price};
    use serde_json::json;

    fn sample_ad() -> Value {
        json!({
            "mobileAdId": 412_345_678,
            "make": "Volkswagen",
            "model": "Golf",
            "modelDescription": "1.5 TSI Life",
            "price": {"consumerPriceGross": "24990.0"},
            "firstRegistration": "201905",
            "mileage": 32500,
            "fuel": "PETROL",
            "power": 96,
            "gearbox": "MANUAL_GEARBOX",
            "images": [{"ref": "https://img.example.com/1.jpg"}, {"url": "https://img.example.com/2.jpg"}],
            "detailPageUrl": "https://suchen.example.com/fahrzeuge/details.html?id=412345678",
            "category": "Limousine"
        })
    }

    #[test]
    fn maps_ad_fields() {
        let raw = ad_to_listing(&sample_ad()).unwrap();
        assert_eq!(raw.id.as_deref(), Some("412345678"));
        assert_eq!(raw.title.as_deref(), Some("Volkswagen Golf 1.5 TSI Life"));
        assert_eq!(raw.price, Some(RawPrice::Text("24990.0".to_string())));
        assert_eq!(raw.year.as_deref(), Some("201905"));
        assert_eq!(raw.mileage.as_deref(), Some("32500"));
        assert_eq!(raw.fuel.as_deref(), Some("Benzin"));
        assert_eq!(raw.power_kw, Some(96.0));
        assert_eq!(raw.transmission.as_deref(), Some("Schaltgetriebe"));
        assert_eq!(raw.images.len(), 2);
        assert_eq!(raw.category_hint.as_deref(), Some("Limousine"));
    }

    #[test]
    fn ad_without_id_is_skipped() {
        assert!(ad_to_listing(&json!({"make": "VW"})).is_none());
    }

    #[test]
    fn search_page_accepts_object_and_bare_array() {
        let (ads, total) = parse_search_page(&json!({"ads": [sample_ad()], "totalPages": 3})).unwrap();
        assert_eq!(ads.len(), 1);
        assert_eq!(total, Some(3));

        let (ads, total) = parse_search_page(&json!([sample_ad(), {"make": "no id"}])).unwrap();
        assert_eq!(ads.len(), 1);
        assert!(total.is_none());
    }

    #[test]
    fn search_page_rejects_unknown_shapes() {
        for body in [json!({"results": []}), json!("nope"), json!(null)] {
            let err = parse_search_page(&body).unwrap_err();
            assert!(matches!(err, ScraperError::UpstreamMalformed { .. }));
        }
    }

    #[test]
    fn code_labels() {
        assert_eq!(fuel_label("DIESEL"), "Diesel");
        assert_eq!(fuel_label("HYBRID"), "Hybrid (Benzin/Elektro)");
        assert_eq!(fuel_label("ETHANOL"), "ETHANOL");
        assert_eq!(gearbox_label("AUTOMATIC_GEARBOX"), "Automatik");
        assert_eq!(gearbox_label("SEMIAUTOMATIC_GEARBOX"), "Halbautomatik");
    }

    #[test]
    fn detail_carries_specification_fields() {
        let mut ad = sample_ad();
        let extra = json!({
            "cubicCapacity": 1498,
            "cylinders": 4,
            "emissionClass": "EURO6D",
            "envkv": {"co2Emission": 118, "consumptionCombined": "5.2"},
            "numSeats": 5,
            "doorCount": 5,
            "features": ["Klimaautomatik", "Navigationssystem", ""],
            "description": "Scheckheftgepflegt\\\\Nichtraucherfahrzeug",
            "warranty": true,
            "leasing": {"rate": 289.0, "duration": 48, "annualMileage": 10000},
            "exteriorColor": "Grau",
            "numberOfPreviousOwners": 1,
            "condition": "USED"
        });
        if let (Some(target), Some(source)) = (ad.as_object_mut(), extra.as_object()) {
            target.extend(source.clone());
        }

        let detail = parse_detail(
            &json!({"ad": ad}),
            "dealer-api",
            "https://services.example.com/search-api/ad/412345678",
            &KeywordClassifier,
        )
        .unwrap();

        assert_eq!(detail.vehicle.id, "412345678");
        assert_eq!(detail.vehicle.price, Price::Amount(24_990));
        assert_eq!(detail.vehicle.power, Some(Power { kw: 96, ps: 131 }));
        assert_eq!(detail.vehicle.year, Some(2019));
        assert_eq!(detail.vehicle.category, Category::Pkw);
        assert_eq!(detail.engine.capacity_ccm, Some(1498));
        assert_eq!(detail.engine.co2_emission_g_km, Some(118));
        assert_eq!(detail.engine.consumption_combined_l_100km, Some(5.2));
        assert_eq!(detail.dimensions.seats, Some(5));
        assert_eq!(detail.equipment, vec!["Klimaautomatik", "Navigationssystem"]);
        assert_eq!(
            detail.description.as_deref(),
            Some("Scheckheftgepflegt Nichtraucherfahrzeug")
        );
        assert_eq!(detail.warranty.as_deref(), Some("Garantie"));
        let leasing = detail.leasing.unwrap();
        assert_eq!(leasing.monthly_rate, 289);
        assert_eq!(leasing.duration_months, Some(48));
        assert_eq!(detail.previous_owners, Some(1));
        assert_eq!(detail.condition.as_deref(), Some("Gebraucht"));
    }

    #[test]
    fn detail_without_price_is_rejected() {
        let body = json!({"ad": {"mobileAdId": "1", "make": "VW", "model": "Polo"}});
        let err = parse_detail(&body, "dealer-api", "https://x.example.com", &KeywordClassifier)
            .unwrap_err();
        assert!(matches!(err, ScraperError::ValidationRejected { .. }));
    }

    #[test]
    fn detail_without_ad_is_malformed() {
        let err = parse_detail(&json!({"error": "gone"}), "d", "https://x.example.com", &KeywordClassifier)
            .unwrap_err();
        assert!(matches!(err, ScraperError::UpstreamMalformed { .. }));
    }
}
