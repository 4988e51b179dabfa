use super::*;

// -----------------------------------------------------------------------
// parse_number / parse_grouped_int
// -----------------------------------------------------------------------

#[test]
fn grouped_mileage_with_dot_thousands() {
    assert_eq!(parse_grouped_int("130.438 km"), Some(130_438));
}

#[test]
fn decimal_price_string_rounds_to_integer() {
    assert_eq!(parse_grouped_int("36990.0"), Some(36_990));
}

#[test]
fn german_decimal_comma_rounds_half_away_from_zero() {
    assert_eq!(parse_number("36.990,50 €"), Some(36_990.5));
    assert_eq!(parse_grouped_int("36.990,50 €"), Some(36_991));
}

#[test]
fn space_and_nbsp_group_digits() {
    assert_eq!(parse_grouped_int("36 990 €"), Some(36_990));
    assert_eq!(parse_grouped_int("36\u{a0}990 €"), Some(36_990));
}

#[test]
fn repeated_separator_is_always_thousands() {
    assert_eq!(parse_grouped_int("1.234.567"), Some(1_234_567));
    assert_eq!(parse_grouped_int("1,234,56"), Some(123_456));
}

#[test]
fn trailing_dash_after_comma_is_ignored() {
    assert_eq!(parse_grouped_int("24.990,- EUR"), Some(24_990));
}

#[test]
fn no_digits_returns_none() {
    assert!(parse_number("keine Angabe").is_none());
}

// -----------------------------------------------------------------------
// parse_price
// -----------------------------------------------------------------------

#[test]
fn price_text_resolves_amount() {
    assert_eq!(
        parse_price(&RawPrice::Text("36.990 €".to_string())),
        Some(Price::Amount(36_990))
    );
}

#[test]
fn price_number_rounds() {
    assert_eq!(
        parse_price(&RawPrice::Number(19_999.6)),
        Some(Price::Amount(20_000))
    );
}

#[test]
fn price_on_request_markers_are_recognized() {
    for text in ["Preis auf Anfrage", "AUF ANFRAGE", "Price on request", "p.a."] {
        assert_eq!(
            parse_price(&RawPrice::Text(text.to_string())),
            Some(Price::OnRequest),
            "{text}"
        );
    }
    assert_eq!(parse_price(&RawPrice::OnRequest), Some(Price::OnRequest));
}

#[test]
fn zero_and_negative_prices_are_unresolved() {
    assert!(parse_price(&RawPrice::Number(0.0)).is_none());
    assert!(parse_price(&RawPrice::Number(-5.0)).is_none());
    assert!(parse_price(&RawPrice::Text("0 €".to_string())).is_none());
}

#[test]
fn price_without_digits_is_unresolved() {
    assert!(parse_price(&RawPrice::Text("VB".to_string())).is_none());
}

// -----------------------------------------------------------------------
// parse_mileage / parse_year
// -----------------------------------------------------------------------

#[test]
fn mileage_rejects_implausible_values() {
    assert_eq!(parse_mileage("15 km"), Some(15));
    assert!(parse_mileage("99.999.999 km").is_none());
}

#[test]
fn year_from_month_slash_year() {
    assert_eq!(parse_year("05/2019"), Some(2019));
}

#[test]
fn year_from_label_prefix() {
    assert_eq!(parse_year("EZ 2019"), Some(2019));
}

#[test]
fn year_from_compact_year_month() {
    assert_eq!(parse_year("201905"), Some(2019));
}

#[test]
fn year_skips_out_of_range_runs() {
    assert_eq!(parse_year("1234 then 1998"), Some(1998));
    assert!(parse_year("Baujahr unbekannt").is_none());
    assert!(parse_year("130438").is_none());
}

// -----------------------------------------------------------------------
// parse_power / complete_power
// -----------------------------------------------------------------------

#[test]
fn power_parses_both_units() {
    assert_eq!(parse_power("110 kW (150 PS)"), (Some(110.0), Some(150.0)));
}

#[test]
fn power_parses_compact_units() {
    assert_eq!(parse_power("81kW"), (Some(81.0), None));
    assert_eq!(parse_power("204 hp"), (None, Some(204.0)));
}

#[test]
fn power_ignores_unrelated_numbers() {
    assert_eq!(parse_power("1.5 TSI 96 kW"), (Some(96.0), None));
    assert_eq!(parse_power("5 Sitze"), (None, None));
}

#[test]
fn ps_only_derives_kw() {
    assert_eq!(
        complete_power(None, Some(80.0)),
        Some(Power { kw: 59, ps: 80 })
    );
}

#[test]
fn kw_only_derives_ps() {
    assert_eq!(
        complete_power(Some(110.0), None),
        Some(Power { kw: 110, ps: 150 })
    );
}

#[test]
fn both_units_are_kept_as_given() {
    assert_eq!(
        complete_power(Some(81.0), Some(110.0)),
        Some(Power { kw: 81, ps: 110 })
    );
}

#[test]
fn invalid_power_is_dropped() {
    assert!(complete_power(Some(0.0), None).is_none());
    assert!(complete_power(None, None).is_none());
    assert!(complete_power(Some(f64::NAN), None).is_none());
}
