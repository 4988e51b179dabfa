//! Normalization from [`RawListing`] to the canonical [`Vehicle`].
//!
//! Unit coercion is delegated to [`crate::parse`]; this module owns the
//! acceptance rule (non-empty title, resolved or on-request price), text
//! cleanup, URL resolution, and id derivation. It holds no state, so the
//! same input always produces the same output.

use std::fmt::Write as _;

use dealerstock_core::{Category, Vehicle};
use sha2::{Digest, Sha256};

use crate::client::resolve_url;
use crate::error::ScraperError;
use crate::extract::clean_text;
use crate::parse::{complete_power, parse_mileage, parse_power, parse_price, parse_year};
use crate::types::RawListing;

/// Normalizes one raw listing.
///
/// `base_url` is the page or API URL the listing came from; relative image
/// and detail links are resolved against it.
///
/// # Errors
///
/// Returns [`ScraperError::ValidationRejected`] when the title is empty after
/// cleanup or the price cannot be resolved. Callers drop such records.
pub fn normalize_listing(
    raw: RawListing,
    source_id: &str,
    base_url: &str,
    category: Category,
) -> Result<Vehicle, ScraperError> {
    let title = raw
        .title
        .as_deref()
        .map(clean_text)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ScraperError::rejected("missing title"))?;

    let price = raw
        .price
        .as_ref()
        .and_then(parse_price)
        .ok_or_else(|| ScraperError::rejected(format!("unresolved price for \"{title}\"")))?;

    let (text_kw, text_ps) = raw
        .power_text
        .as_deref()
        .map_or((None, None), parse_power);
    let power = complete_power(raw.power_kw.or(text_kw), raw.power_ps.or(text_ps));

    let mut all_images: Vec<String> = Vec::with_capacity(raw.images.len());
    for href in &raw.images {
        if let Some(url) = resolve_url(base_url, href) {
            if !all_images.contains(&url) {
                all_images.push(url);
            }
        }
    }
    let image = all_images.first().cloned();

    let id = raw
        .id
        .as_deref()
        .map(clean_text)
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| derive_id(source_id, &title, image.as_deref()));

    Ok(Vehicle {
        id,
        source: source_id.to_string(),
        title,
        price,
        year: raw.year.as_deref().and_then(parse_year),
        mileage: raw.mileage.as_deref().and_then(parse_mileage),
        fuel_type: clean_optional(raw.fuel.as_deref()),
        power,
        transmission: clean_optional(raw.transmission.as_deref()),
        image,
        all_images,
        category,
        url: raw.url.as_deref().and_then(|href| resolve_url(base_url, href)),
    })
}

fn clean_optional(text: Option<&str>) -> Option<String> {
    text.map(clean_text).filter(|t| !t.is_empty())
}

/// `h` + first 16 hex chars of SHA-256 over `source_id|title|image`.
fn derive_id(source_id: &str, title: &str, image: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_id.as_bytes());
    hasher.update(b"|");
    hasher.update(title.as_bytes());
    hasher.update(b"|");
    hasher.update(image.unwrap_or_default().as_bytes());
    let digest = hasher.finalize();

    let mut id = String::with_capacity(17);
    id.push('h');
    for byte in &digest[..8] {
        let _ = write!(id, "{byte:02x}");
    }
    id
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
