//! The two operations exposed to the HTTP layer and the CLI.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use dealerstock_core::{AppConfig, DealerConfig, Vehicle, VehicleDetail, VehiclesResponse};
use dealerstock_scraper::{
    AdapterContext, CategoryClassifier, ChromiumRenderer, HttpFetcher, KeywordClassifier,
    NoopRenderer, Renderer, ScraperError, SourceAdapter, SourceAdapterResult, VehicleSource,
};

use crate::aggregator::Aggregator;
use crate::cache::{CacheEntry, Clock, SystemClock, TtlSlot};
use crate::detail::{ApiDetailSource, DetailError, DetailFetcher, DetailSource};

/// Only failure text ever shown to callers.
pub const UNAVAILABLE: &str = "temporarily unavailable";

const DEFAULT_DETAIL_SOURCE_ID: &str = "dealer-api";

/// Owns the aggregated-list cache and the detail cache.
///
/// List refreshes are single-flight: callers that find the slot cold or
/// expired queue on one async lock, and whoever gets it after a pass
/// completed reuses that pass's response, whether it succeeded or not.
pub struct InventoryService {
    aggregator: Aggregator,
    details: DetailFetcher,
    slot: Mutex<TtlSlot<Vec<Vehicle>>>,
    /// Holds the response of the last completed pass.
    refresh: tokio::sync::Mutex<Option<VehiclesResponse>>,
    /// Bumped under `refresh` each time a pass completes.
    passes: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl InventoryService {
    #[must_use]
    pub fn new(
        aggregator: Aggregator,
        details: DetailFetcher,
        cache_ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            aggregator,
            details,
            slot: Mutex::new(TtlSlot::new(cache_ttl)),
            refresh: tokio::sync::Mutex::new(None),
            passes: AtomicU64::new(0),
            clock,
        }
    }

    /// Wires adapters, renderer and detail lookups from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the HTTP client cannot be built.
    pub fn from_config(app: &AppConfig, dealer: &DealerConfig) -> Result<Self, ScraperError> {
        let fetcher = Arc::new(
            HttpFetcher::new(
                app.request_timeout_secs,
                &app.user_agent,
                app.max_retries,
                app.retry_backoff_base_ms,
            )?
            .with_credentials(app.api_credentials.clone()),
        );
        let renderer: Arc<dyn Renderer> = match &app.chromium_path {
            Some(binary) => Arc::new(ChromiumRenderer::new(
                binary.clone(),
                app.render_settle_ms,
                app.render_max_sessions,
                &app.user_agent,
            )),
            None => {
                tracing::info!("no chromium configured; rendered tier disabled");
                Arc::new(NoopRenderer)
            }
        };
        let classifier: Arc<dyn CategoryClassifier> = Arc::new(KeywordClassifier);

        let ctx = AdapterContext {
            fetcher: Arc::clone(&fetcher),
            renderer,
            classifier: Arc::clone(&classifier),
            account_id: dealer.account_id.clone(),
            render_timeout: Duration::from_millis(app.render_nav_timeout_ms),
        };
        let sources: Vec<Arc<dyn VehicleSource>> = dealer
            .sources_by_priority()
            .into_iter()
            .map(|config| {
                Arc::new(SourceAdapter::new(config.clone(), ctx.clone())) as Arc<dyn VehicleSource>
            })
            .collect();

        let detail_source_id = dealer
            .sources
            .iter()
            .find(|s| s.kind.is_api())
            .map_or(DEFAULT_DETAIL_SOURCE_ID, |s| s.id.as_str());
        let detail_source = dealer.detail_api_base().map(|base| {
            Arc::new(ApiDetailSource::new(
                fetcher,
                base,
                detail_source_id,
                classifier,
            )) as Arc<dyn DetailSource>
        });

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let aggregator = Aggregator::new(
            sources,
            app.dedup_prefix_len,
            Duration::from_secs(app.source_budget_secs),
        );
        let details = DetailFetcher::new(
            detail_source,
            Duration::from_secs(app.detail_cache_ttl_secs),
            Arc::clone(&clock),
        );

        Ok(Self::new(
            aggregator,
            details,
            Duration::from_secs(app.cache_ttl_secs),
            clock,
        ))
    }

    #[must_use]
    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    /// Returns the aggregated list. Never fails: a failed refresh falls back
    /// to the last cached list, and only when there is none does the
    /// response carry [`UNAVAILABLE`].
    pub async fn get_vehicles(&self) -> VehiclesResponse {
        if let Some(response) = self.fresh_hit() {
            return response;
        }

        let seen = self.passes.load(Ordering::Acquire);
        let mut last = self.refresh.lock().await;
        if let Some(response) = self.fresh_hit() {
            return response;
        }
        if self.passes.load(Ordering::Acquire) != seen {
            if let Some(outcome) = last.as_ref() {
                tracing::debug!("reusing the pass that completed while queued");
                return outcome.clone();
            }
        }

        let outcome = self.refresh_once().await;
        *last = Some(outcome.clone());
        self.passes.fetch_add(1, Ordering::Release);
        outcome
    }

    async fn refresh_once(&self) -> VehiclesResponse {
        let report = self.aggregator.run().await;
        let now = self.clock.now();
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);

        if !report.all_failed() {
            let entry = slot.set(report.vehicles, now);
            return response(entry, false, false);
        }

        if let Some((entry, _)) = slot.get(now) {
            tracing::warn!(
                count = entry.data.len(),
                cached_at = %entry.timestamp,
                "every source failed; serving stale inventory"
            );
            return response(entry, true, true);
        }

        tracing::error!("every source failed and no inventory is cached");
        VehiclesResponse {
            vehicles: Vec::new(),
            cached: false,
            stale: false,
            timestamp: now,
            count: 0,
            error: Some(UNAVAILABLE.to_string()),
        }
    }

    /// Looks up one extended record.
    ///
    /// # Errors
    ///
    /// See [`DetailFetcher::get`].
    pub async fn get_vehicle_detail(&self, vid: &str) -> Result<VehicleDetail, DetailError> {
        self.details.get(vid).await
    }

    /// Runs a single source outside the cache.
    pub async fn fetch_source(&self, source_id: &str) -> Option<SourceAdapterResult> {
        self.aggregator.run_source(source_id).await
    }

    fn fresh_hit(&self) -> Option<VehiclesResponse> {
        let now = self.clock.now();
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.get(now) {
            Some((entry, true)) => Some(response(entry, true, false)),
            _ => None,
        }
    }
}

fn response(entry: &CacheEntry<Vec<Vehicle>>, cached: bool, stale: bool) -> VehiclesResponse {
    VehiclesResponse {
        count: entry.data.len(),
        vehicles: entry.data.clone(),
        cached,
        stale,
        timestamp: entry.timestamp,
        error: None,
    }
}

#[cfg(test)]
#[path = "service_test.rs"]
mod tests;
