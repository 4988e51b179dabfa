//! Construction-machinery marketplace. Results are rendered client-side; the
//! rendered grid tags each item with `data-item-id`, and listing images
//! embed the same id (`/images/<id>_<n>.jpg`) even where the attribute is
//! missing.

use std::sync::LazyLock;

use regex::Regex;

use super::ListingParser;
use crate::extract::{attr, first_capture, id_windows, IdWindow};
use crate::fields::{fill_generic, price_in_text};
use crate::tiers::Tier;
use crate::types::{RawListing, RawPrice};

const ITEM_WINDOW: usize = 4_000;
const IMAGE_WINDOW_BEFORE: usize = 400;
const IMAGE_WINDOW_AFTER: usize = 2_500;

static ITEM_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<[a-z]+\b[^>]*\bdata-item-id\s*=\s*["'](\d+)["']"#).expect("valid regex")
});

static IMAGE_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)/images/(\d+)_[^'\x22\s>]*\.jpe?g").expect("valid regex")
});

static ITEM_TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)class\s*=\s*["'][^"']*\b(?:item-title|listing-title)\b[^"']*["'][^>]*>(.*?)</"#)
        .expect("valid regex")
});

static ITEM_PRICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)class\s*=\s*["'][^"']*\b(?:item-price|price)\b[^"']*["'][^>]*>(.*?)</"#)
        .expect("valid regex")
});

static BUILD_YEAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:Baujahr|Bj\.?|Year of manufacture)\s*:?\s*((?:19|20)\d{2})\b")
        .expect("valid regex")
});

static DETAIL_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\b[^>]*\bhref\s*=\s*["']([^"'#]+)["']"#).expect("valid regex")
});

pub struct MachineryMarketplaceParser;

impl ListingParser for MachineryMarketplaceParser {
    fn tiers(&self) -> &'static [Tier] {
        &[Tier::RenderedDom, Tier::StaticHtml, Tier::Heuristic]
    }

    fn ready_marker(&self) -> Option<&'static str> {
        Some("data-item-id")
    }

    fn parse_static(&self, markup: &str) -> Vec<RawListing> {
        let mut blocks = id_windows(markup, &ITEM_ID_RE, 0, ITEM_WINDOW);
        if blocks.is_empty() {
            blocks = id_windows(markup, &IMAGE_ID_RE, IMAGE_WINDOW_BEFORE, IMAGE_WINDOW_AFTER);
        }
        blocks.into_iter().map(item_listing).collect()
    }
}

fn item_listing(block: IdWindow<'_>) -> RawListing {
    let window = block.window;
    let price = attr(window, "data-price")
        .filter(|p| !p.trim().is_empty())
        .map(RawPrice::Text)
        .or_else(|| {
            first_capture(&ITEM_PRICE_RE, window)
                .map(|text| price_in_text(&text).unwrap_or(RawPrice::Text(text)))
        });

    let mut listing = RawListing {
        id: Some(block.id),
        title: attr(window, "data-title").or_else(|| first_capture(&ITEM_TITLE_RE, window)),
        price,
        year: attr(window, "data-year").or_else(|| first_capture(&BUILD_YEAR_RE, window)),
        url: first_capture(&DETAIL_LINK_RE, window),
        ..RawListing::default()
    };
    fill_generic(&mut listing, window);
    listing
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_attributes_scope_rendered_cards() {
        let markup = r#"
          <div class="grid">
            <div class="card" data-item-id="5501" data-price="89000">
              <a href="/machines/5501"><img src="https://cdn.example.com/images/5501_1.jpg"></a>
              <h4 class="item-title">Liebherr A 918 Compact Mobilbagger</h4>
              <p>Baujahr: 2017 &middot; 6.800 Bh</p>
            </div>
            <div class="card" data-item-id="5502">
              <a href="/machines/5502"><img src="https://cdn.example.com/images/5502_1.jpg"></a>
              <h4 class="item-title">Kubota KX 019-4</h4>
              <span class="item-price">24.500 €</span>
              <p>Bj. 2020</p>
            </div>
          </div>"#;
        let listings = MachineryMarketplaceParser.parse_static(markup);
        assert_eq!(listings.len(), 2);

        let liebherr = &listings[0];
        assert_eq!(liebherr.id.as_deref(), Some("5501"));
        assert_eq!(liebherr.title.as_deref(), Some("Liebherr A 918 Compact Mobilbagger"));
        assert_eq!(liebherr.price, Some(RawPrice::Text("89000".to_string())));
        assert_eq!(liebherr.year.as_deref(), Some("2017"));
        assert_eq!(liebherr.url.as_deref(), Some("/machines/5501"));
        assert_eq!(
            liebherr.images,
            vec!["https://cdn.example.com/images/5501_1.jpg".to_string()]
        );

        let kubota = &listings[1];
        assert_eq!(kubota.price, Some(RawPrice::Text("24.500".to_string())));
        assert_eq!(kubota.year.as_deref(), Some("2020"));
    }

    #[test]
    fn image_ids_are_used_when_attributes_are_missing() {
        let markup = r#"
          <li><img src="/images/7001_0.jpg" alt="Volvo EC220E"><b>Volvo EC220E Kettenbagger</b>
              <em>Preis auf Anfrage</em></li>
          <li><img src="/images/7002_0.jpg" srcset="/images/7002_0.jpg 1x, /images/7002_1.jpg 2x" alt="JCB 3CX">
              <b>JCB 3CX Baggerlader</b><em>45.900 € netto</em></li>"#;
        let listings = MachineryMarketplaceParser.parse_static(markup);
        let ids: Vec<_> = listings.iter().filter_map(|l| l.id.as_deref()).collect();
        assert_eq!(ids, vec!["7001", "7002"]);
        assert_eq!(listings[0].title.as_deref(), Some("Volvo EC220E"));
        assert_eq!(listings[0].price, Some(RawPrice::OnRequest));
        assert_eq!(listings[1].title.as_deref(), Some("JCB 3CX"));
        assert_eq!(listings[1].price, Some(RawPrice::Text("45.900".to_string())));
    }

    #[test]
    fn unrelated_markup_yields_no_items() {
        assert!(MachineryMarketplaceParser
            .parse_static("<div>Keine Treffer</div>")
            .is_empty());
    }
}
