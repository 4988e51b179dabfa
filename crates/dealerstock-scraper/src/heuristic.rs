//! Last-resort proximity pairing for pages where no structural identifier
//! survives: every price occurrence is paired with the nearest image and
//! title-like text around it.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::extract::{attr, bounded_window, clean_text, image_positions};
use crate::types::{RawListing, RawPrice};

/// Markup bytes considered before a price occurrence.
const WINDOW_BEFORE: usize = 1_500;
/// Markup bytes considered after a price occurrence.
const WINDOW_AFTER: usize = 300;
const MAX_CANDIDATES: usize = 250;

static MARKUP_PRICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(\d{1,3}(?:(?:[.\x{A0} ]|&nbsp;)\d{3})+(?:,\d{1,2})?|\d{3,})(?:,-)?\s*(?:&nbsp;)?\s*(?:€|&euro;|EUR\b)",
    )
    .expect("valid regex")
});

static TITLE_CANDIDATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<h[1-4][^>]*>(.*?)</h[1-4]>|<a\b[^>]*\btitle\s*=\s*["']([^"']{3,})["']|<img\b[^>]*>"#)
        .expect("valid regex")
});

/// Pairs prices with their nearest image and title.
///
/// A candidate needs a title; image-less candidates are still emitted since
/// the normalizer only requires title and price. Identical (title, price)
/// pairs are emitted once.
#[must_use]
pub fn proximity_scan(markup: &str) -> Vec<RawListing> {
    let mut seen = HashSet::new();
    let mut listings = Vec::new();

    for m in MARKUP_PRICE_RE.captures_iter(markup).take(MAX_CANDIDATES) {
        let (Some(whole), Some(amount)) = (m.get(0), m.get(1)) else {
            continue;
        };
        let window = bounded_window(markup, whole.start(), WINDOW_BEFORE, WINDOW_AFTER);
        // Offset of the price inside the window.
        let window_start = window.as_ptr() as usize - markup.as_ptr() as usize;
        let anchor = whole.start() - window_start;

        let Some(title) = nearest_title(window, anchor) else {
            continue;
        };
        let price_text = clean_text(amount.as_str());
        if !seen.insert((title.clone(), price_text.clone())) {
            continue;
        }

        let image = image_positions(window)
            .into_iter()
            .min_by_key(|(pos, _)| proximity(*pos, anchor));

        listings.push(RawListing {
            title: Some(title),
            price: Some(RawPrice::Text(price_text)),
            images: image.map(|(_, url)| vec![url]).unwrap_or_default(),
            ..RawListing::default()
        });
    }
    listings
}

/// Title-like text closest to `anchor`, preferring candidates before it.
fn nearest_title(window: &str, anchor: usize) -> Option<String> {
    let candidates = TITLE_CANDIDATE_RE.captures_iter(window).filter_map(|caps| {
        let whole = caps.get(0)?;
        let text = if let Some(heading) = caps.get(1) {
            clean_text(heading.as_str())
        } else if let Some(title) = caps.get(2) {
            clean_text(title.as_str())
        } else {
            attr(whole.as_str(), "alt").map(|a| clean_text(&a))?
        };
        looks_like_title(&text).then_some((whole.start(), text))
    });

    candidates
        .min_by_key(|(pos, _)| proximity(*pos, anchor))
        .map(|(_, text)| text)
}

/// Distance from `anchor`, with content after it weighted 4x so the next
/// listing's heading or image does not win over the current one.
fn proximity(pos: usize, anchor: usize) -> usize {
    if pos <= anchor {
        anchor - pos
    } else {
        (pos - anchor).saturating_mul(4)
    }
}

fn looks_like_title(text: &str) -> bool {
    let chars = text.chars().count();
    (3..=160).contains(&chars)
        && text.chars().any(char::is_alphabetic)
        && !text.contains('€')
        && !text.eq_ignore_ascii_case("logo")
}
