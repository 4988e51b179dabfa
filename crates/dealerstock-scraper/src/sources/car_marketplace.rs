//! Passenger-car marketplace: a server-rendered app that ships its search
//! results as `__NEXT_DATA__` and renders each hit as an
//! `<article data-guid=…>` block.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::ListingParser;
use crate::error::ScraperError;
use crate::extract::{attr, clean_text, first_capture, id_windows, json_f64, json_str};
use crate::fields::fill_generic;
use crate::tiers::Tier;
use crate::types::{RawListing, RawPrice};

const ARTICLE_WINDOW: usize = 6_000;

static ARTICLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<article\b[^>]*\bdata-guid\s*=\s*["']([^"']+)["']"#).expect("valid regex")
});

static TESTID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)data-testid\s*=\s*["']VehicleDetails-([a-z_]+)["'][^>]*>(.*?)</span>"#)
        .expect("valid regex")
});

static REGULAR_PRICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)data-testid\s*=\s*["']regular-price["'][^>]*>(.*?)</"#).expect("valid regex")
});

static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\b[^>]*\bhref\s*=\s*["']([^"'#]+)["']"#).expect("valid regex")
});

pub struct CarMarketplaceParser;

impl ListingParser for CarMarketplaceParser {
    fn tiers(&self) -> &'static [Tier] {
        &[
            Tier::EmbeddedData,
            Tier::RenderedDom,
            Tier::StaticHtml,
            Tier::Heuristic,
        ]
    }

    fn ready_marker(&self) -> Option<&'static str> {
        Some("data-guid")
    }

    fn parse_embedded(&self, markup: &str) -> Result<Vec<RawListing>, ScraperError> {
        let Some(parsed) = crate::extract::script_json_by_id(markup, "__NEXT_DATA__") else {
            return Ok(Vec::new());
        };
        let data = parsed.map_err(|source| ScraperError::Deserialize {
            context: "__NEXT_DATA__".to_string(),
            source,
        })?;
        let listings = data
            .pointer("/props/pageProps/listings")
            .and_then(Value::as_array)
            .ok_or_else(|| ScraperError::UpstreamMalformed {
                context: "__NEXT_DATA__ has no props.pageProps.listings array".to_string(),
            })?;
        Ok(listings.iter().filter_map(embedded_listing).collect())
    }

    fn parse_static(&self, markup: &str) -> Vec<RawListing> {
        id_windows(markup, &ARTICLE_RE, 0, ARTICLE_WINDOW)
            .into_iter()
            .map(|block| article_listing(block.id, block.window))
            .collect()
    }
}

fn embedded_listing(listing: &Value) -> Option<RawListing> {
    let id = json_str(listing.get("id"))?;
    let vehicle = listing.get("vehicle");
    let field = |name: &str| json_str(vehicle.and_then(|v| v.get(name)));

    let title = [field("make"), field("model"), field("modelVersionInput")]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");

    let price = listing.get("price").and_then(|p| {
        json_str(p.get("priceFormatted"))
            .map(RawPrice::Text)
            .or_else(|| json_f64(p.get("price")).map(RawPrice::Number))
    });

    let images = listing
        .get("images")
        .and_then(Value::as_array)
        .map(|imgs| imgs.iter().filter_map(|i| json_str(Some(i))).collect())
        .unwrap_or_default();

    Some(RawListing {
        id: Some(id),
        title: (!title.is_empty()).then_some(title),
        price,
        year: json_str(listing.pointer("/tracking/firstRegistration")),
        mileage: field("mileageInKm"),
        fuel: field("fuel"),
        power_text: field("power"),
        power_kw: json_f64(listing.pointer("/tracking/power")),
        transmission: field("transmission"),
        images,
        url: json_str(listing.get("url")),
        category_hint: field("bodyType"),
        ..RawListing::default()
    })
}

/// Reads one article block: `data-*` attributes on the opening tag first,
/// then the labelled detail spans, then generic patterns.
fn article_listing(id: String, window: &str) -> RawListing {
    let title = [attr(window, "data-make"), attr(window, "data-model")]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");

    let mut listing = RawListing {
        id: Some(id),
        title: (!title.trim().is_empty()).then_some(title),
        price: attr(window, "data-price")
            .filter(|p| !p.trim().is_empty())
            .map(RawPrice::Text)
            .or_else(|| first_capture(&REGULAR_PRICE_RE, window).map(RawPrice::Text)),
        year: attr(window, "data-first-registration"),
        mileage: attr(window, "data-mileage"),
        fuel: attr(window, "data-fuel-type"),
        url: first_capture(&LINK_RE, window),
        ..RawListing::default()
    };

    let details: HashMap<String, String> = TESTID_RE
        .captures_iter(window)
        .filter_map(|caps| {
            let value = clean_text(caps.get(2)?.as_str());
            (!value.is_empty()).then(|| (caps[1].to_ascii_lowercase(), value))
        })
        .collect();
    listing.fill_from(RawListing {
        mileage: details.get("mileage_road").cloned(),
        year: details.get("calendar").cloned(),
        power_text: details.get("speedometer").cloned(),
        fuel: details.get("gas_pump").cloned(),
        transmission: details.get("transmission").cloned(),
        ..RawListing::default()
    });

    fill_generic(&mut listing, window);
    listing
}

#[cfg(test)]
mod tests {
    use super::*;

    const NEXT_DATA_PAGE: &str = r#"<html><head></head><body>
        <div id="__next"></div>
        <script id="__NEXT_DATA__" type="application/json">{"props":{"pageProps":{"listings":[
          {"id":"7f3c-11","url":"/angebote/vw-golf-7f3c-11",
           "vehicle":{"make":"Volkswagen","model":"Golf","modelVersionInput":"1.5 TSI Life",
                      "mileageInKm":"32.500 km","fuel":"Benzin","transmission":"Schaltgetriebe",
                      "bodyType":"Limousine"},
           "price":{"priceFormatted":"€ 24.990,-"},
           "tracking":{"firstRegistration":"05-2021","power":"96"},
           "images":["https://img.example.com/golf-1.jpg","https://img.example.com/golf-2.jpg"]},
          {"vehicle":{"make":"Opel"}}
        ]}}}</script></body></html>"#;

    #[test]
    fn next_data_listings_are_mapped() {
        let listings = CarMarketplaceParser.parse_embedded(NEXT_DATA_PAGE).unwrap();
        assert_eq!(listings.len(), 1, "listing without id is skipped");
        let golf = &listings[0];
        assert_eq!(golf.id.as_deref(), Some("7f3c-11"));
        assert_eq!(golf.title.as_deref(), Some("Volkswagen Golf 1.5 TSI Life"));
        assert_eq!(golf.price, Some(RawPrice::Text("€ 24.990,-".to_string())));
        assert_eq!(golf.year.as_deref(), Some("05-2021"));
        assert_eq!(golf.mileage.as_deref(), Some("32.500 km"));
        assert_eq!(golf.power_kw, Some(96.0));
        assert_eq!(golf.category_hint.as_deref(), Some("Limousine"));
        assert_eq!(golf.images.len(), 2);
    }

    #[test]
    fn page_without_next_data_yields_nothing() {
        let listings = CarMarketplaceParser
            .parse_embedded("<html><body>shell</body></html>")
            .unwrap();
        assert!(listings.is_empty());
    }

    #[test]
    fn next_data_without_listings_is_malformed() {
        let markup = r#"<script id="__NEXT_DATA__">{"props":{"pageProps":{}}}</script>"#;
        let err = CarMarketplaceParser.parse_embedded(markup).unwrap_err();
        assert!(matches!(err, ScraperError::UpstreamMalformed { .. }));

        let markup = r#"<script id="__NEXT_DATA__">{"props": </script>"#;
        let err = CarMarketplaceParser.parse_embedded(markup).unwrap_err();
        assert!(matches!(err, ScraperError::Deserialize { .. }));
    }

    const ARTICLES: &str = r#"
        <article data-guid="a-1" data-make="BMW" data-model="320d" data-price="31990"
                 data-mileage="58000" data-first-registration="03-2020" data-fuel-type="d">
          <a href="/angebote/bmw-320d-a-1"><h2>BMW 320d Touring</h2></a>
          <img src="/img/a-1.jpg">
          <span data-testid="VehicleDetails-speedometer">140 kW (190 PS)</span>
          <span data-testid="VehicleDetails-transmission">Automatik</span>
        </article>
        <article data-guid="a-2">
          <h2>Skoda Octavia Combi</h2>
          <img src="/img/a-2.jpg">
          <span data-testid="VehicleDetails-mileage_road">112.000 km</span>
          <span data-testid="VehicleDetails-calendar">EZ 07/2018</span>
          <span data-testid="VehicleDetails-gas_pump">Diesel</span>
          <p data-testid="regular-price">16.450 €</p>
        </article>"#;

    #[test]
    fn articles_prefer_data_attributes() {
        let listings = CarMarketplaceParser.parse_static(ARTICLES);
        assert_eq!(listings.len(), 2);

        let bmw = &listings[0];
        assert_eq!(bmw.id.as_deref(), Some("a-1"));
        assert_eq!(bmw.title.as_deref(), Some("BMW 320d"));
        assert_eq!(bmw.price, Some(RawPrice::Text("31990".to_string())));
        assert_eq!(bmw.mileage.as_deref(), Some("58000"));
        assert_eq!(bmw.fuel.as_deref(), Some("d"));
        assert_eq!(bmw.power_text.as_deref(), Some("140 kW (190 PS)"));
        assert_eq!(bmw.transmission.as_deref(), Some("Automatik"));
        assert_eq!(bmw.url.as_deref(), Some("/angebote/bmw-320d-a-1"));
        assert_eq!(bmw.images, vec!["/img/a-1.jpg".to_string()]);
    }

    #[test]
    fn articles_fall_back_to_detail_spans_and_headings() {
        let listings = CarMarketplaceParser.parse_static(ARTICLES);
        let skoda = &listings[1];
        assert_eq!(skoda.title.as_deref(), Some("Skoda Octavia Combi"));
        assert_eq!(skoda.price, Some(RawPrice::Text("16.450 €".to_string())));
        assert_eq!(skoda.mileage.as_deref(), Some("112.000 km"));
        assert_eq!(skoda.year.as_deref(), Some("EZ 07/2018"));
        assert_eq!(skoda.fuel.as_deref(), Some("Diesel"));
        assert_eq!(skoda.images, vec!["/img/a-2.jpg".to_string()]);
    }

    #[test]
    fn rendered_markup_without_next_data_uses_articles() {
        let listings = CarMarketplaceParser.parse_rendered(ARTICLES);
        assert_eq!(listings.len(), 2);
    }
}
