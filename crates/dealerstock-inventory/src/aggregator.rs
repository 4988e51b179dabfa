//! Concurrent fan-out over every configured source, followed by a
//! priority-ordered merge.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use dealerstock_core::Vehicle;
use dealerstock_scraper::{ErrorKind, SourceAdapterResult, Tier, VehicleSource};
use futures::future::join_all;

/// Default length of the lower-cased title prefix used as the dedup key.
pub const DEFAULT_DEDUP_PREFIX_LEN: usize = 30;

/// Per-source line of an [`AggregationReport`].
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSummary {
    pub source_id: String,
    /// Vehicles the source contributed after de-duplication.
    pub count: usize,
    pub partial: bool,
    pub tier: Option<Tier>,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AggregationReport {
    pub vehicles: Vec<Vehicle>,
    pub sources: Vec<SourceSummary>,
}

impl AggregationReport {
    /// `true` when no source produced anything. An empty report (no sources
    /// configured) counts as failed too.
    #[must_use]
    pub fn all_failed(&self) -> bool {
        self.sources.iter().all(|s| s.partial && s.count == 0)
    }

    fn log(&self) {
        for source in &self.sources {
            if source.partial {
                tracing::warn!(
                    source_id = %source.source_id,
                    count = source.count,
                    error = source.error.as_deref().unwrap_or("unknown"),
                    "source failed during aggregation"
                );
            } else {
                tracing::debug!(
                    source_id = %source.source_id,
                    count = source.count,
                    tier = ?source.tier.map(|t| t.to_string()),
                    "source merged"
                );
            }
        }
        let failed = self.sources.iter().filter(|s| s.partial).count();
        tracing::info!(
            total = self.vehicles.len(),
            sources = self.sources.len(),
            failed,
            "aggregation pass complete"
        );
    }
}

pub struct Aggregator {
    sources: Vec<Arc<dyn VehicleSource>>,
    dedup_prefix_len: usize,
    source_budget: Duration,
}

impl Aggregator {
    /// `sources` in configuration order; that order breaks priority ties.
    #[must_use]
    pub fn new(
        sources: Vec<Arc<dyn VehicleSource>>,
        dedup_prefix_len: usize,
        source_budget: Duration,
    ) -> Self {
        Self {
            sources,
            dedup_prefix_len: dedup_prefix_len.max(1),
            source_budget,
        }
    }

    #[must_use]
    pub fn sources(&self) -> &[Arc<dyn VehicleSource>] {
        &self.sources
    }

    /// Runs every source concurrently and waits for all of them to settle.
    /// A source that overruns its budget is cancelled and reported as a
    /// timed-out partial result.
    pub async fn run(&self) -> AggregationReport {
        let budget = self.source_budget;
        let results = join_all(
            self.sources
                .iter()
                .map(|source| fetch_within_budget(source.as_ref(), budget)),
        )
        .await;

        let report = merge(results, self.dedup_prefix_len);
        report.log();
        report
    }

    /// Runs one source by id, without cross-source de-duplication.
    pub async fn run_source(&self, source_id: &str) -> Option<SourceAdapterResult> {
        let source = self.sources.iter().find(|s| s.source_id() == source_id)?;
        Some(fetch_within_budget(source.as_ref(), self.source_budget).await)
    }
}

async fn fetch_within_budget(source: &dyn VehicleSource, budget: Duration) -> SourceAdapterResult {
    let mut result = match tokio::time::timeout(budget, source.fetch()).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                source_id = source.source_id(),
                budget_secs = budget.as_secs(),
                "source exceeded its time budget"
            );
            SourceAdapterResult::failed(
                source.source_id(),
                source.priority(),
                ErrorKind::RenderTimeout,
                format!("source timed out after {}s", budget.as_secs()),
            )
        }
    };
    if let Some(category) = source.category() {
        for vehicle in &mut result.vehicles {
            vehicle.category = category;
        }
    }
    result
}

/// Lower-cased title prefix of at most `len` characters.
#[must_use]
pub fn dedup_key(title: &str, len: usize) -> String {
    title.trim().to_lowercase().chars().take(len).collect()
}

/// Merges settled source results.
///
/// Results are visited in priority order (stable, so input order breaks
/// ties). Exact id repeats within one source are dropped. A dedup key
/// belongs to the first source that produced it; later sources lose their
/// colliding records, while further records of the owning source are kept.
#[must_use]
pub fn merge(mut results: Vec<SourceAdapterResult>, prefix_len: usize) -> AggregationReport {
    results.sort_by_key(|r| r.priority);

    let mut key_owner: HashMap<String, usize> = HashMap::new();
    let mut vehicles = Vec::new();
    let mut sources = Vec::with_capacity(results.len());

    for (index, result) in results.into_iter().enumerate() {
        let mut seen_ids: HashSet<String> = HashSet::new();
        let mut count = 0usize;

        for vehicle in result.vehicles {
            if !seen_ids.insert(vehicle.id.clone()) {
                continue;
            }
            let key = dedup_key(&vehicle.title, prefix_len);
            let owner = *key_owner.entry(key).or_insert(index);
            if owner != index {
                tracing::debug!(
                    source_id = %result.source_id,
                    vehicle_id = %vehicle.id,
                    title = %vehicle.title,
                    "dropping duplicate from lower-priority source"
                );
                continue;
            }
            count += 1;
            vehicles.push(vehicle);
        }

        sources.push(SourceSummary {
            source_id: result.source_id,
            count,
            partial: result.partial,
            tier: result.tier,
            error: result.error,
        });
    }

    AggregationReport { vehicles, sources }
}

#[cfg(test)]
#[path = "aggregator_test.rs"]
mod tests;
