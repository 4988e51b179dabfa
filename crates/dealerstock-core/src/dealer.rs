use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::vehicle::Category;
use crate::ConfigError;

/// Which family of origins a dealer draws inventory from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Api,
    Scrape,
    Hybrid,
}

/// Origin type; selects the parser set and tier list of an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    DealerApi,
    CarMarketplace,
    TruckMarketplace,
    MachineryMarketplace,
}

impl SourceKind {
    #[must_use]
    pub fn is_api(self) -> bool {
        matches!(self, SourceKind::DealerApi)
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::DealerApi => write!(f, "dealer_api"),
            SourceKind::CarMarketplace => write!(f, "car_marketplace"),
            SourceKind::TruckMarketplace => write!(f, "truck_marketplace"),
            SourceKind::MachineryMarketplace => write!(f, "machinery_marketplace"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub id: String,
    pub kind: SourceKind,
    pub url: String,
    /// Lower wins when two sources list the same vehicle.
    #[serde(default)]
    pub priority: u8,
    /// Fixed category for category-specific source URLs. `None` lets the
    /// keyword classifier decide per record.
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealerConfig {
    pub name: String,
    pub data_source: DataSource,
    /// Account identifier scoping structured API queries.
    #[serde(default)]
    pub account_id: Option<String>,
    /// Base URL of the structured API used for detail lookups. Falls back to
    /// the first `dealer_api` source URL.
    #[serde(default)]
    pub api_base_url: Option<String>,
    pub sources: Vec<SourceConfig>,
}

impl DealerConfig {
    /// Enabled sources ordered by priority; configuration order breaks ties.
    #[must_use]
    pub fn sources_by_priority(&self) -> Vec<&SourceConfig> {
        let mut sources: Vec<&SourceConfig> = self.sources.iter().filter(|s| s.enabled).collect();
        sources.sort_by_key(|s| s.priority);
        sources
    }

    #[must_use]
    pub fn detail_api_base(&self) -> Option<&str> {
        self.api_base_url.as_deref().or_else(|| {
            self.sources
                .iter()
                .find(|s| s.kind.is_api())
                .map(|s| s.url.as_str())
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct DealerFile {
    pub dealer: DealerConfig,
}

/// Load and validate the dealer configuration from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_dealer(path: &Path) -> Result<DealerFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::DealerFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_dealer(&content)
}

/// Parse and validate dealer configuration from YAML text.
///
/// # Errors
///
/// Returns `ConfigError` if the text does not parse or fails validation.
pub fn parse_dealer(content: &str) -> Result<DealerFile, ConfigError> {
    let dealer_file: DealerFile =
        serde_yaml::from_str(content).map_err(ConfigError::DealerFileParse)?;

    validate_dealer(&dealer_file.dealer)?;

    Ok(dealer_file)
}

fn validate_dealer(dealer: &DealerConfig) -> Result<(), ConfigError> {
    if dealer.name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "dealer name must be non-empty".to_string(),
        ));
    }

    if dealer.sources.is_empty() {
        return Err(ConfigError::Validation(
            "at least one source must be configured".to_string(),
        ));
    }

    let mut seen_ids = HashSet::new();
    for source in &dealer.sources {
        if source.id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "source id must be non-empty".to_string(),
            ));
        }
        if !seen_ids.insert(source.id.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate source id: '{}'",
                source.id
            )));
        }
        if !is_http_url(&source.url) {
            return Err(ConfigError::Validation(format!(
                "source '{}' has invalid url '{}'",
                source.id, source.url
            )));
        }
        match (dealer.data_source, source.kind.is_api()) {
            (DataSource::Api, false) => {
                return Err(ConfigError::Validation(format!(
                    "source '{}' is a {} source but data_source is api",
                    source.id, source.kind
                )));
            }
            (DataSource::Scrape, true) => {
                return Err(ConfigError::Validation(format!(
                    "source '{}' is an api source but data_source is scrape",
                    source.id
                )));
            }
            _ => {}
        }
    }

    if let Some(base) = &dealer.api_base_url {
        if !is_http_url(base) {
            return Err(ConfigError::Validation(format!(
                "api_base_url '{base}' is not an http(s) url"
            )));
        }
    }

    let needs_account = dealer.data_source != DataSource::Scrape
        || dealer.sources.iter().any(|s| s.kind.is_api());
    if needs_account {
        match dealer.account_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) => {}
            Some(id) => {
                return Err(ConfigError::Validation(format!(
                    "account_id '{id}' must contain digits only"
                )));
            }
            None => {
                return Err(ConfigError::Validation(
                    "account_id is required when an api source is configured".to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn is_http_url(raw: &str) -> bool {
    let rest = raw
        .strip_prefix("https://")
        .or_else(|| raw.strip_prefix("http://"));
    rest.and_then(|r| r.split(['/', '?', '#']).next())
        .is_some_and(|host| !host.is_empty() && !host.contains(char::is_whitespace))
}

fn default_enabled() -> bool {
    true
}

#[cfg(test)]
#[path = "dealer_test.rs"]
mod tests;
