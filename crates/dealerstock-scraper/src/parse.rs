//! Unit coercion for listing fields: grouped numbers, prices, registration
//! years, and engine power.
//!
//! These functions scan bytes directly rather than using `regex`; the field
//! patterns in [`crate::fields`] locate the text, this module interprets it.

use dealerstock_core::{Power, Price};

use crate::types::RawPrice;

/// Conversion factor PS → kW.
pub const KW_PER_PS: f64 = 0.7355;
/// Conversion factor kW → PS.
pub const PS_PER_KW: f64 = 1.36;

const MIN_YEAR: u16 = 1950;
const MAX_YEAR: u16 = 2099;
const MAX_PRICE: f64 = 100_000_000.0;
const MAX_MILEAGE: u64 = 5_000_000;
const MAX_POWER_KW: f64 = 2_000.0;

const ON_REQUEST_MARKERS: [&str; 5] = [
    "preis auf anfrage",
    "price on request",
    "auf anfrage",
    "on request",
    "p.a.",
];

fn is_separator(c: char) -> bool {
    matches!(c, '.' | ',' | ' ' | '\u{a0}' | '\u{202f}' | '\'')
}

/// Parses the first number in `text`, honouring thousands separators.
///
/// `.`, `,`, space, NBSP and `'` group digits. A single `.` or `,` followed
/// by exactly one or two trailing digits is read as a decimal point:
/// `"130.438 km"` → 130438, `"36990.0"` → 36990.0, `"36.990,50"` → 36990.5.
#[must_use]
pub fn parse_number(text: &str) -> Option<f64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let rest = &text[start..];

    // Collect the digit run including separators that sit between digits.
    let mut token = String::new();
    let mut pending_sep: Option<char> = None;
    for c in rest.chars() {
        if c.is_ascii_digit() {
            if let Some(sep) = pending_sep.take() {
                token.push(sep);
            }
            token.push(c);
        } else if is_separator(c) && pending_sep.is_none() {
            pending_sep = Some(c);
        } else {
            break;
        }
    }

    let last_sep = token
        .char_indices()
        .filter(|(_, c)| !c.is_ascii_digit())
        .last();

    let (int_part, frac_part) = match last_sep {
        Some((idx, sep @ ('.' | ','))) => {
            let tail = &token[idx + 1..];
            let occurrences = token.matches(sep).count();
            if occurrences == 1 && (1..=2).contains(&tail.len()) {
                (&token[..idx], Some(tail))
            } else {
                (token.as_str(), None)
            }
        }
        _ => (token.as_str(), None),
    };

    let mut digits: String = int_part.chars().filter(char::is_ascii_digit).collect();
    if let Some(frac) = frac_part {
        digits.push('.');
        digits.push_str(frac);
    }
    digits.parse::<f64>().ok()
}

/// Parses the first grouped number in `text` and rounds it half away from
/// zero.
#[must_use]
pub fn parse_grouped_int(text: &str) -> Option<u64> {
    let value = parse_number(text)?;
    to_u64(value)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_u64(value: f64) -> Option<u64> {
    if value.is_finite() && value >= 0.0 && value < 1e15 {
        Some(value.round() as u64)
    } else {
        None
    }
}

/// Returns `true` when `text` contains a "price on request" marker.
#[must_use]
pub fn is_on_request(text: &str) -> bool {
    let lower = text.to_lowercase();
    ON_REQUEST_MARKERS.iter().any(|m| lower.contains(m))
}

/// Resolves a raw price. Zero, negative, and absurd amounts are unresolved.
#[must_use]
pub fn parse_price(raw: &RawPrice) -> Option<Price> {
    let value = match raw {
        RawPrice::OnRequest => return Some(Price::OnRequest),
        RawPrice::Number(v) => *v,
        RawPrice::Text(text) => {
            if is_on_request(text) {
                return Some(Price::OnRequest);
            }
            parse_number(text)?
        }
    };
    if value <= 0.0 || value > MAX_PRICE {
        return None;
    }
    to_u64(value).filter(|v| *v > 0).map(Price::Amount)
}

/// Parses an odometer reading in kilometres.
#[must_use]
pub fn parse_mileage(text: &str) -> Option<u32> {
    parse_grouped_int(text)
        .filter(|km| *km <= MAX_MILEAGE)
        .and_then(|km| u32::try_from(km).ok())
}

/// Returns the first plausible year in `text`.
///
/// Digit runs of length 4 (`"2019"`), 6 (`"201905"`) and 8 (`"20190512"`)
/// contribute their first four digits; anything outside 1950..=2099 is
/// skipped.
#[must_use]
pub fn parse_year(text: &str) -> Option<u16> {
    let bytes = text.as_bytes();
    let mut i = 0usize;
    while i < bytes.len() {
        if !bytes[i].is_ascii_digit() {
            i += 1;
            continue;
        }
        let run_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if matches!(i - run_start, 4 | 6 | 8) {
            let year = text[run_start..run_start + 4].parse::<u16>().ok()?;
            if (MIN_YEAR..=MAX_YEAR).contains(&year) {
                return Some(year);
            }
        }
    }
    None
}

/// Extracts kW and PS figures from free text such as `"110 kW (150 PS)"`,
/// `"150 PS"` or `"81kW"`. `hp` is accepted as PS.
#[must_use]
pub fn parse_power(text: &str) -> (Option<f64>, Option<f64>) {
    let lower = text.to_lowercase();
    let bytes = lower.as_bytes();
    let mut kw = None;
    let mut ps = None;
    let mut i = 0usize;

    while i < bytes.len() {
        if !bytes[i].is_ascii_digit() {
            i += 1;
            continue;
        }
        let num_start = i;
        let mut has_sep = false;
        while i < bytes.len()
            && (bytes[i].is_ascii_digit()
                || (!has_sep
                    && matches!(bytes[i], b'.' | b',')
                    && bytes.get(i + 1).is_some_and(u8::is_ascii_digit)))
        {
            if !bytes[i].is_ascii_digit() {
                has_sep = true;
            }
            i += 1;
        }
        let number = lower[num_start..i].replace(',', ".").parse::<f64>().ok();

        let unit_start = lower[i..]
            .find(|c: char| c != ' ' && c != '\u{a0}')
            .map_or(lower.len(), |off| i + off);
        let unit = &lower[unit_start..];
        let unit_end_ok = |len: usize| {
            !unit[len..]
                .chars()
                .next()
                .is_some_and(char::is_alphanumeric)
        };

        if unit.starts_with("kw") && unit_end_ok(2) {
            kw = kw.or(number);
        } else if unit.starts_with("ps") && unit_end_ok(2) {
            ps = ps.or(number);
        } else if unit.starts_with("hp") && unit_end_ok(2) {
            ps = ps.or(number);
        }
    }
    (kw, ps)
}

/// Completes a power reading from whichever of kW and PS is known.
///
/// PS-only derives kW = round(ps × 0.7355); kW-only derives
/// PS = round(kw × 1.36). Non-positive or implausible inputs are ignored.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn complete_power(kw: Option<f64>, ps: Option<f64>) -> Option<Power> {
    let valid = |v: f64| v.is_finite() && v > 0.0;
    let kw = kw.filter(|v| valid(*v) && *v <= MAX_POWER_KW);
    let ps = ps.filter(|v| valid(*v) && *v <= MAX_POWER_KW * PS_PER_KW);

    let (kw, ps) = match (kw, ps) {
        (Some(kw), Some(ps)) => (kw, ps),
        (Some(kw), None) => (kw, kw * PS_PER_KW),
        (None, Some(ps)) => (ps * KW_PER_PS, ps),
        (None, None) => return None,
    };
    Some(Power {
        kw: kw.round() as u32,
        ps: ps.round() as u32,
    })
}

#[cfg(test)]
#[path = "parse_test.rs"]
mod tests;
