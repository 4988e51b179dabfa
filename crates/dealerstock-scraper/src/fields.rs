//! Generic textual field patterns, the last step of every per-field fallback
//! chain. Parsers try their origin-specific markers first and call
//! [`fill_generic`] for whatever is still missing.

use std::sync::LazyLock;

use regex::Regex;

use crate::extract::{attr, clean_text, first_capture, image_urls};
use crate::parse::is_on_request;
use crate::types::{RawListing, RawPrice};

pub(crate) static PRICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(\d{1,3}(?:[.\x{A0}\x{202F} ]\d{3})+(?:,\d{1,2})?|\d{3,}(?:[.,]\d{1,2})?)(?:,-)?\s*(?:€|EUR\b)|(?:€|EUR)\s*(\d{1,3}(?:[.\x{A0}\x{202F} ]\d{3})+(?:,\d{1,2})?|\d{3,}(?:[.,]\d{1,2})?)",
    )
    .expect("valid regex")
});

static ON_REQUEST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:preis auf anfrage|auf anfrage|price on request)\b").expect("valid regex")
});

static MILEAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,3}(?:[.,\x{A0}\x{202F} ]\d{3})+|\d+)\s*km\b").expect("valid regex")
});

static LABELLED_YEAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:EZ|Erstzulassung|Baujahr|Bj\.?|first registration)\s*:?\s*((?:\d{1,2}/)?(?:19|20)\d{2})",
    )
    .expect("valid regex")
});

static MONTH_YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{2}/(?:19|20)\d{2})\b").expect("valid regex"));

static POWER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d+(?:[.,]\d+)?\s*kW(?:\s*\(\s*\d+\s*(?:PS|hp)\s*\))?|\d+\s*(?:PS|hp)\b)")
        .expect("valid regex")
});

static FUEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(Hybrid \((?:Benzin|Diesel)/Elektro\)|Plug-in-Hybrid|Diesel|Benzin|Elektro|Hybrid|Autogas \(LPG\)|Autogas|LPG|Erdgas \(CNG\)|Erdgas|CNG|Wasserstoff|Petrol|Electric)\b",
    )
    .expect("valid regex")
});

static TRANSMISSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(Schaltgetriebe|Halbautomatik|Automatikgetriebe|Automatik|Manual|Automatic)\b")
        .expect("valid regex")
});

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<h[1-4][^>]*>(.*?)</h[1-4]>").expect("valid regex"));

static IMG_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<img\b[^>]*>").expect("valid regex"));

/// First price in plain text: an amount, or the on-request marker.
#[must_use]
pub fn price_in_text(text: &str) -> Option<RawPrice> {
    if let Some(caps) = PRICE_RE.captures(text) {
        let amount = caps.get(1).or_else(|| caps.get(2))?;
        return Some(RawPrice::Text(amount.as_str().to_string()));
    }
    if ON_REQUEST_RE.is_match(text) || is_on_request(text) {
        return Some(RawPrice::OnRequest);
    }
    None
}

/// Heading text, falling back to an image `alt` or `title` attribute.
#[must_use]
pub fn title_in_markup(markup: &str) -> Option<String> {
    if let Some(title) = first_capture(&HEADING_RE, markup) {
        return Some(title);
    }
    IMG_TAG_RE.find_iter(markup).find_map(|tag| {
        attr(tag.as_str(), "alt")
            .or_else(|| attr(tag.as_str(), "title"))
            .map(|t| clean_text(&t))
            .filter(|t| t.chars().count() >= 3)
    })
}

/// Fills every still-missing field of `raw` from generic patterns applied to
/// `window` (markup).
pub fn fill_generic(raw: &mut RawListing, window: &str) {
    let text = clean_text(window);

    if raw.title.is_none() {
        raw.title = title_in_markup(window);
    }
    if raw.price.is_none() {
        raw.price = price_in_text(&text);
    }
    if raw.mileage.is_none() {
        raw.mileage = first_capture(&MILEAGE_RE, &text);
    }
    if raw.year.is_none() {
        raw.year =
            first_capture(&LABELLED_YEAR_RE, &text).or_else(|| first_capture(&MONTH_YEAR_RE, &text));
    }
    if raw.power_text.is_none() && raw.power_kw.is_none() && raw.power_ps.is_none() {
        raw.power_text = first_capture(&POWER_RE, &text);
    }
    if raw.fuel.is_none() {
        raw.fuel = first_capture(&FUEL_RE, &text);
    }
    if raw.transmission.is_none() {
        raw.transmission = first_capture(&TRANSMISSION_RE, &text);
    }
    if raw.images.is_empty() {
        raw.images = image_urls(window);
    }
}
