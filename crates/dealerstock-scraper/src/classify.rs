//! Pluggable category classification for sources without a fixed category.

use dealerstock_core::Category;

use crate::extract::clean_text;
use crate::types::RawListing;

/// Assigns a [`Category`] to a listing that its source did not pre-tag.
///
/// Implementations are heuristics; a configured source category always takes
/// precedence over them.
pub trait CategoryClassifier: Send + Sync {
    fn classify(&self, listing: &RawListing) -> Category;
}

/// Substring keywords: long enough that matching inside German compounds
/// (`Minibagger`, `Kastenwagen`) is wanted.
const MACHINE_SUBSTRINGS: &[&str] = &[
    "bagger",
    "radlader",
    "lader",
    "dumper",
    "walze",
    "raupe",
    "planier",
    "teleskop",
    "stapler",
    "kran",
    "excavator",
    "loader",
    "bulldozer",
];

/// Whole-token keywords: short model and brand names.
const MACHINE_TOKENS: &[&str] = &[
    "takeuchi",
    "yanmar",
    "bobcat",
    "jcb",
    "caterpillar",
    "cat",
    "komatsu",
    "kubota",
    "wacker",
    "neuson",
    "hitachi",
    "volvo-ce",
    "manitou",
    "merlo",
    "hamm",
    "bomag",
];

const COMMERCIAL_SUBSTRINGS: &[&str] = &[
    "transporter",
    "kastenwagen",
    "pritsche",
    "kipper",
    "sattelzug",
    "anhänger",
    "kofferaufbau",
    "lkw",
    "nutzfahrzeug",
    "zugmaschine",
    "fahrgestell",
];

const COMMERCIAL_TOKENS: &[&str] = &[
    "sprinter", "crafter", "transit", "ducato", "daily", "actros", "atego", "arocs", "antos",
    "tgx", "tgs", "tgl", "tge", "vivaro", "movano", "boxer", "jumper", "master", "trafic",
    "vito", "citan", "caddy", "truck", "van", "scania", "daf", "iveco",
];

/// Keyword lists over title and origin hint. Defaults to [`Category::Pkw`].
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    fn hint_category(hint: &str) -> Option<Category> {
        let lower = hint.to_lowercase();
        if lower.contains("construction") || lower.contains("baumaschine") || lower.contains("machine")
        {
            return Some(Category::Baumaschine);
        }
        if lower.contains("truck")
            || lower.contains("van")
            || lower.contains("trailer")
            || lower.contains("nutzfahrzeug")
            || lower.contains("commercial")
        {
            return Some(Category::Nutzfahrzeuge);
        }
        if lower == "car" || lower.contains("pkw") || lower.contains("limousine") {
            return Some(Category::Pkw);
        }
        None
    }

    fn matches(text: &str, tokens: &[&str], substrings: &[&str]) -> bool {
        substrings.iter().any(|kw| text.contains(kw))
            || text
                .split(|c: char| !c.is_alphanumeric() && c != '-')
                .any(|token| tokens.contains(&token))
    }
}

impl CategoryClassifier for KeywordClassifier {
    fn classify(&self, listing: &RawListing) -> Category {
        if let Some(category) = listing
            .category_hint
            .as_deref()
            .and_then(Self::hint_category)
        {
            return category;
        }

        let text = clean_text(listing.title.as_deref().unwrap_or_default()).to_lowercase();
        if Self::matches(&text, MACHINE_TOKENS, MACHINE_SUBSTRINGS) {
            Category::Baumaschine
        } else if Self::matches(&text, COMMERCIAL_TOKENS, COMMERCIAL_SUBSTRINGS) {
            Category::Nutzfahrzeuge
        } else {
            Category::Pkw
        }
    }
}
