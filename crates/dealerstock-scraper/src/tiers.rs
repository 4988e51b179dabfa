//! Ordered extraction strategies and the runner that walks them.
//!
//! Each source kind declares its tier list (see
//! [`ListingParser::tiers`](crate::sources::ListingParser::tiers)). The
//! runner tries tiers in that order and stops at the first one whose
//! candidates survive normalization. A tier that errors is recorded and the
//! next one is tried. Page markup is fetched at most once per run, however
//! many tiers read it.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use dealerstock_core::Vehicle;

use crate::error::{ErrorKind, ScraperError};
use crate::sources::ListingParser;
use crate::types::RawListing;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    StructuredApi,
    EmbeddedData,
    RenderedDom,
    StaticHtml,
    Heuristic,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::StructuredApi => write!(f, "structured_api"),
            Tier::EmbeddedData => write!(f, "embedded_data"),
            Tier::RenderedDom => write!(f, "rendered_dom"),
            Tier::StaticHtml => write!(f, "static_html"),
            Tier::Heuristic => write!(f, "heuristic"),
        }
    }
}

/// Why a tier failed, detached from the error value so it can be cached and
/// reported more than once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<ScraperError> for TierFailure {
    fn from(err: ScraperError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TierOutcome {
    /// The tier produced this many valid vehicles; the chain stopped here.
    Accepted(usize),
    /// No candidates found.
    Empty,
    /// Candidates found, but every one was dropped by the normalizer.
    Rejected(usize),
    Failed(TierFailure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierAttempt {
    pub tier: Tier,
    pub outcome: TierOutcome,
}

/// Raw inputs the tiers read from. Implemented over HTTP and the renderer
/// by the adapter, and by fakes in tests.
#[async_trait]
pub trait TierInputs: Send + Sync {
    /// Records from the structured API.
    async fn api_listings(&self) -> Result<Vec<RawListing>, ScraperError>;

    /// The listing page as served, without script execution.
    async fn static_markup(&self) -> Result<String, ScraperError>;

    /// The listing page after script execution.
    async fn rendered_markup(&self, wait_for: Option<&str>) -> Result<String, ScraperError>;
}

/// Result of one chain run.
#[derive(Debug, Default)]
pub struct ChainOutcome {
    pub vehicles: Vec<Vehicle>,
    /// The tier that produced `vehicles`.
    pub tier: Option<Tier>,
    pub attempts: Vec<TierAttempt>,
    /// Set when no tier produced a valid vehicle.
    pub failure: Option<TierFailure>,
}

type Page = Result<Arc<str>, TierFailure>;

async fn memoized<Fut>(slot: &mut Option<Page>, load: impl FnOnce() -> Fut) -> Page
where
    Fut: Future<Output = Result<String, ScraperError>>,
{
    if let Some(page) = slot {
        return page.clone();
    }
    let page: Page = load().await.map(Arc::from).map_err(TierFailure::from);
    *slot = Some(page.clone());
    page
}

/// Runs `parser`'s tiers in order against `inputs`.
///
/// `accept` turns a tier's candidates into valid vehicles (normally by
/// normalizing each and dropping rejects). The first tier for which `accept`
/// returns at least one vehicle ends the run.
pub async fn run_chain<F>(
    source_id: &str,
    parser: &dyn ListingParser,
    inputs: &dyn TierInputs,
    mut accept: F,
) -> ChainOutcome
where
    F: FnMut(Vec<RawListing>) -> Vec<Vehicle> + Send,
{
    let tiers = parser.tiers();
    let mut static_page: Option<Page> = None;
    let mut rendered_page: Option<Page> = None;
    let mut outcome = ChainOutcome::default();

    for &tier in tiers {
        let candidates: Result<Vec<RawListing>, TierFailure> = match tier {
            Tier::StructuredApi => inputs.api_listings().await.map_err(TierFailure::from),
            Tier::EmbeddedData => {
                match memoized(&mut static_page, || inputs.static_markup()).await {
                    Ok(markup) => parser.parse_embedded(&markup).map_err(TierFailure::from),
                    Err(failure) => Err(failure),
                }
            }
            Tier::RenderedDom => {
                let wait_for = parser.ready_marker();
                memoized(&mut rendered_page, || inputs.rendered_markup(wait_for))
                    .await
                    .map(|markup| parser.parse_rendered(&markup))
            }
            Tier::StaticHtml => memoized(&mut static_page, || inputs.static_markup())
                .await
                .map(|markup| parser.parse_static(&markup)),
            Tier::Heuristic => {
                let page = match memoized(&mut static_page, || inputs.static_markup()).await {
                    Ok(markup) => Ok(markup),
                    Err(static_failure) => match &rendered_page {
                        Some(Ok(markup)) => Ok(Arc::clone(markup)),
                        _ => Err(static_failure),
                    },
                };
                page.map(|markup| parser.parse_heuristic(&markup))
            }
        };

        let attempt_outcome = match candidates {
            Ok(raw) if raw.is_empty() => TierOutcome::Empty,
            Ok(raw) => {
                let found = raw.len();
                let vehicles = accept(raw);
                if vehicles.is_empty() {
                    TierOutcome::Rejected(found)
                } else {
                    tracing::debug!(
                        source_id,
                        %tier,
                        candidates = found,
                        count = vehicles.len(),
                        "tier accepted"
                    );
                    outcome.attempts.push(TierAttempt {
                        tier,
                        outcome: TierOutcome::Accepted(vehicles.len()),
                    });
                    outcome.vehicles = vehicles;
                    outcome.tier = Some(tier);
                    return outcome;
                }
            }
            Err(failure) => {
                tracing::debug!(source_id, %tier, error = %failure.message, "tier failed");
                TierOutcome::Failed(failure)
            }
        };
        tracing::debug!(source_id, %tier, outcome = ?attempt_outcome, "tier yielded nothing");
        outcome.attempts.push(TierAttempt {
            tier,
            outcome: attempt_outcome,
        });
    }

    outcome.failure = Some(exhausted_failure(source_id, &outcome.attempts));
    outcome
}

/// When every tier errored, the last error stands for the source; otherwise
/// the chain ran and simply found nothing usable.
fn exhausted_failure(source_id: &str, attempts: &[TierAttempt]) -> TierFailure {
    let all_failed = !attempts.is_empty()
        && attempts
            .iter()
            .all(|a| matches!(a.outcome, TierOutcome::Failed(_)));
    if all_failed {
        if let Some(TierAttempt {
            outcome: TierOutcome::Failed(failure),
            ..
        }) = attempts.last()
        {
            return failure.clone();
        }
    }
    TierFailure::from(ScraperError::ExtractionExhausted {
        source_id: source_id.to_string(),
        tiers: attempts.len(),
    })
}

#[cfg(test)]
#[path = "tiers_test.rs"]
mod tests;
