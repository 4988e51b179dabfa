//! Source adapters: one configured origin, its parser set, and the tier
//! chain that turns it into canonical vehicles.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dealerstock_core::{Category, SourceConfig, Vehicle};

use crate::classify::CategoryClassifier;
use crate::client::HttpFetcher;
use crate::error::ScraperError;
use crate::normalize::normalize_listing;
use crate::render::Renderer;
use crate::sources::{dealer_api, parser_for, ListingParser};
use crate::tiers::{run_chain, TierInputs};
use crate::types::{RawListing, SourceAdapterResult};

/// One origin the aggregator can fan out to.
///
/// `fetch` never fails: source-level problems come back as a partial result
/// with the error set.
#[async_trait]
pub trait VehicleSource: Send + Sync {
    fn source_id(&self) -> &str;

    /// Lower wins when two sources list the same vehicle.
    fn priority(&self) -> u8;

    /// Fixed category for every record of this source, if configured.
    fn category(&self) -> Option<Category> {
        None
    }

    async fn fetch(&self) -> SourceAdapterResult;
}

/// Collaborators shared by every adapter of one dealer.
#[derive(Clone)]
pub struct AdapterContext {
    pub fetcher: Arc<HttpFetcher>,
    pub renderer: Arc<dyn Renderer>,
    pub classifier: Arc<dyn CategoryClassifier>,
    /// Scopes structured API queries.
    pub account_id: Option<String>,
    pub render_timeout: Duration,
}

/// A configured origin run through the tier list of its [`SourceKind`].
///
/// [`SourceKind`]: dealerstock_core::SourceKind
pub struct SourceAdapter {
    config: SourceConfig,
    ctx: AdapterContext,
    parser: &'static dyn ListingParser,
}

impl SourceAdapter {
    #[must_use]
    pub fn new(config: SourceConfig, ctx: AdapterContext) -> Self {
        let parser = parser_for(config.kind);
        Self {
            config,
            ctx,
            parser,
        }
    }

    #[must_use]
    pub fn config(&self) -> &SourceConfig {
        &self.config
    }
}

/// Tier inputs backed by the shared HTTP client and renderer.
struct HttpTierInputs<'a> {
    config: &'a SourceConfig,
    ctx: &'a AdapterContext,
}

#[async_trait]
impl TierInputs for HttpTierInputs<'_> {
    async fn api_listings(&self) -> Result<Vec<RawListing>, ScraperError> {
        let account_id =
            self.ctx
                .account_id
                .as_deref()
                .ok_or_else(|| ScraperError::InvalidUrl {
                    url: self.config.url.clone(),
                    reason: "structured API source without an account id".to_string(),
                })?;
        dealer_api::fetch_listings(&self.ctx.fetcher, &self.config.url, account_id).await
    }

    async fn static_markup(&self) -> Result<String, ScraperError> {
        self.ctx.fetcher.fetch_markup(&self.config.url).await
    }

    async fn rendered_markup(&self, wait_for: Option<&str>) -> Result<String, ScraperError> {
        self.ctx
            .renderer
            .render(&self.config.url, wait_for, self.ctx.render_timeout)
            .await
    }
}

#[async_trait]
impl VehicleSource for SourceAdapter {
    fn source_id(&self) -> &str {
        &self.config.id
    }

    fn priority(&self) -> u8 {
        self.config.priority
    }

    fn category(&self) -> Option<Category> {
        self.config.category
    }

    async fn fetch(&self) -> SourceAdapterResult {
        let started = Instant::now();
        let source_id = self.config.id.as_str();
        let inputs = HttpTierInputs {
            config: &self.config,
            ctx: &self.ctx,
        };
        let fixed_category = self.config.category;
        let classifier = self.ctx.classifier.as_ref();
        let base_url = self.config.url.as_str();

        let accept = |raw: Vec<RawListing>| -> Vec<Vehicle> {
            raw.into_iter()
                .filter_map(|listing| {
                    let category =
                        fixed_category.unwrap_or_else(|| classifier.classify(&listing));
                    match normalize_listing(listing, source_id, base_url, category) {
                        Ok(vehicle) => Some(vehicle),
                        Err(e) => {
                            tracing::debug!(source_id, error = %e, "dropping listing");
                            None
                        }
                    }
                })
                .collect()
        };

        let outcome = run_chain(source_id, self.parser, &inputs, accept).await;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match &outcome.failure {
            None => tracing::info!(
                source_id,
                kind = %self.config.kind,
                tier = ?outcome.tier.map(|t| t.to_string()),
                count = outcome.vehicles.len(),
                elapsed_ms,
                "source fetched"
            ),
            Some(failure) => tracing::warn!(
                source_id,
                kind = %self.config.kind,
                error_kind = %failure.kind,
                error = %failure.message,
                elapsed_ms,
                "source produced no vehicles"
            ),
        }

        SourceAdapterResult {
            source_id: self.config.id.clone(),
            priority: self.config.priority,
            partial: outcome.failure.is_some(),
            error_kind: outcome.failure.as_ref().map(|f| f.kind),
            error: outcome.failure.map(|f| f.message),
            vehicles: outcome.vehicles,
            tier: outcome.tier,
            attempts: outcome.attempts,
        }
    }
}
