use super::*;
use crate::types::RawPrice;
use dealerstock_core::{Power, Price};

const BASE: &str = "https://www.example-marketplace.de/haendler/481516";

fn raw_golf() -> RawListing {
    RawListing {
        id: Some("a1b2".to_string()),
        title: Some("  VW Golf <b>1.5 TSI</b> &amp; Navi ".to_string()),
        price: Some(RawPrice::Text("36990.0".to_string())),
        year: Some("05/2019".to_string()),
        mileage: Some("130.438 km".to_string()),
        fuel: Some(" Benzin ".to_string()),
        power_text: Some("80 PS".to_string()),
        transmission: Some("Schaltgetriebe".to_string()),
        images: vec![
            "/img/golf-1.jpg".to_string(),
            "//cdn.example.com/golf-2.jpg".to_string(),
            "/img/golf-1.jpg".to_string(),
            "data:image/png;base64,AAAA".to_string(),
        ],
        url: Some("/angebot/a1b2".to_string()),
        ..RawListing::default()
    }
}

#[test]
fn normalizes_all_fields() {
    let v = normalize_listing(raw_golf(), "pkw-marketplace", BASE, Category::Pkw).unwrap();
    assert_eq!(v.id, "a1b2");
    assert_eq!(v.source, "pkw-marketplace");
    assert_eq!(v.title, "VW Golf 1.5 TSI & Navi");
    assert_eq!(v.price, Price::Amount(36_990));
    assert_eq!(v.year, Some(2019));
    assert_eq!(v.mileage, Some(130_438));
    assert_eq!(v.fuel_type.as_deref(), Some("Benzin"));
    assert_eq!(v.power, Some(Power { kw: 59, ps: 80 }));
    assert_eq!(v.transmission.as_deref(), Some("Schaltgetriebe"));
    assert_eq!(
        v.all_images,
        vec![
            "https://www.example-marketplace.de/img/golf-1.jpg".to_string(),
            "https://cdn.example.com/golf-2.jpg".to_string(),
        ]
    );
    assert_eq!(v.image.as_deref(), Some("https://www.example-marketplace.de/img/golf-1.jpg"));
    assert_eq!(
        v.url.as_deref(),
        Some("https://www.example-marketplace.de/angebot/a1b2")
    );
    assert_eq!(v.category, Category::Pkw);
}

#[test]
fn rejects_missing_or_blank_title() {
    let mut raw = raw_golf();
    raw.title = Some("  <span> </span> ".to_string());
    let err = normalize_listing(raw, "s", BASE, Category::Pkw).unwrap_err();
    assert!(matches!(err, ScraperError::ValidationRejected { .. }));

    let mut raw = raw_golf();
    raw.title = None;
    assert!(normalize_listing(raw, "s", BASE, Category::Pkw).is_err());
}

#[test]
fn rejects_unresolved_price() {
    let mut raw = raw_golf();
    raw.price = Some(RawPrice::Text("VB".to_string()));
    assert!(normalize_listing(raw, "s", BASE, Category::Pkw).is_err());

    let mut raw = raw_golf();
    raw.price = None;
    assert!(normalize_listing(raw, "s", BASE, Category::Pkw).is_err());
}

#[test]
fn accepts_price_on_request() {
    let mut raw = raw_golf();
    raw.price = Some(RawPrice::Text("Preis auf Anfrage".to_string()));
    let v = normalize_listing(raw, "s", BASE, Category::Baumaschine).unwrap();
    assert_eq!(v.price, Price::OnRequest);
    assert_eq!(v.category, Category::Baumaschine);
}

#[test]
fn explicit_power_fields_win_over_text() {
    let mut raw = raw_golf();
    raw.power_kw = Some(110.0);
    raw.power_text = Some("80 PS".to_string());
    let v = normalize_listing(raw, "s", BASE, Category::Pkw).unwrap();
    assert_eq!(v.power, Some(Power { kw: 110, ps: 80 }));

    let mut raw = raw_golf();
    raw.power_text = Some("110 kW (150 PS)".to_string());
    let v = normalize_listing(raw, "s", BASE, Category::Pkw).unwrap();
    assert_eq!(v.power, Some(Power { kw: 110, ps: 150 }));
}

#[test]
fn normalization_is_deterministic() {
    let a = normalize_listing(raw_golf(), "s", BASE, Category::Pkw).unwrap();
    let b = normalize_listing(raw_golf(), "s", BASE, Category::Pkw).unwrap();
    assert_eq!(a, b);
}

#[test]
fn normalizing_canonical_fields_again_changes_nothing() {
    let first = normalize_listing(raw_golf(), "s", BASE, Category::Pkw).unwrap();
    let again = RawListing {
        id: Some(first.id.clone()),
        title: Some(first.title.clone()),
        price: first.price.amount().map(|p| RawPrice::Text(p.to_string())),
        year: first.year.map(|y| y.to_string()),
        mileage: first.mileage.map(|m| m.to_string()),
        fuel: first.fuel_type.clone(),
        power_kw: first.power.map(|p| f64::from(p.kw)),
        power_ps: first.power.map(|p| f64::from(p.ps)),
        transmission: first.transmission.clone(),
        images: first.all_images.clone(),
        url: first.url.clone(),
        ..RawListing::default()
    };
    let second = normalize_listing(again, "s", BASE, Category::Pkw).unwrap();
    assert_eq!(first, second);
}

#[test]
fn missing_id_is_derived_from_content() {
    let mut raw = raw_golf();
    raw.id = None;
    let a = normalize_listing(raw.clone(), "s", BASE, Category::Pkw).unwrap();
    let b = normalize_listing(raw.clone(), "s", BASE, Category::Pkw).unwrap();
    assert_eq!(a.id, b.id);
    assert_eq!(a.id.len(), 17);
    assert!(a.id.starts_with('h'));
    assert!(a.id[1..].bytes().all(|c| c.is_ascii_hexdigit()));

    let other_source = normalize_listing(raw, "t", BASE, Category::Pkw).unwrap();
    assert_ne!(a.id, other_source.id);
}

#[test]
fn implausible_numbers_become_absent() {
    let mut raw = raw_golf();
    raw.year = Some("1899".to_string());
    raw.mileage = Some("unbekannt".to_string());
    raw.power_text = None;
    let v = normalize_listing(raw, "s", BASE, Category::Pkw).unwrap();
    assert!(v.year.is_none());
    assert!(v.mileage.is_none());
    assert!(v.power.is_none());
}
