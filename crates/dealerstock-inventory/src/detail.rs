//! Per-id cached lookups of extended records from the structured API.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use dealerstock_core::VehicleDetail;
use dealerstock_scraper::{fetch_detail, CategoryClassifier, HttpFetcher, ScraperError};
use thiserror::Error;

use crate::cache::{Clock, TtlMap};

/// Longest accepted vehicle id.
pub const MAX_VID_LEN: usize = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DetailError {
    #[error("vehicle id must be 1 to {MAX_VID_LEN} digits")]
    InvalidId,

    #[error("vehicle {vid} not found")]
    NotFound { vid: String },

    #[error("detail lookup failed: {0}")]
    Upstream(String),
}

/// Accepts ids of 1 to [`MAX_VID_LEN`] ASCII digits.
///
/// # Errors
///
/// [`DetailError::InvalidId`] for anything else, including surrounding
/// whitespace.
pub fn validate_vid(vid: &str) -> Result<&str, DetailError> {
    if vid.is_empty() || vid.len() > MAX_VID_LEN || !vid.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DetailError::InvalidId);
    }
    Ok(vid)
}

/// Upstream that can produce a detail record for an already validated id.
#[async_trait]
pub trait DetailSource: Send + Sync {
    async fn fetch(&self, vid: &str) -> Result<VehicleDetail, ScraperError>;
}

/// Detail lookups against the structured listing API.
pub struct ApiDetailSource {
    fetcher: Arc<HttpFetcher>,
    base_url: String,
    source_id: String,
    classifier: Arc<dyn CategoryClassifier>,
}

impl ApiDetailSource {
    #[must_use]
    pub fn new(
        fetcher: Arc<HttpFetcher>,
        base_url: impl Into<String>,
        source_id: impl Into<String>,
        classifier: Arc<dyn CategoryClassifier>,
    ) -> Self {
        Self {
            fetcher,
            base_url: base_url.into(),
            source_id: source_id.into(),
            classifier,
        }
    }
}

#[async_trait]
impl DetailSource for ApiDetailSource {
    async fn fetch(&self, vid: &str) -> Result<VehicleDetail, ScraperError> {
        fetch_detail(
            &self.fetcher,
            &self.base_url,
            vid,
            &self.source_id,
            self.classifier.as_ref(),
        )
        .await
    }
}

/// Cached, single-flight detail lookups.
///
/// Concurrent requests for the same id share one upstream call; requests for
/// different ids proceed independently.
pub struct DetailFetcher {
    source: Option<Arc<dyn DetailSource>>,
    cache: Mutex<TtlMap<String, VehicleDetail>>,
    in_flight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    clock: Arc<dyn Clock>,
}

impl DetailFetcher {
    /// With `source = None` every valid id resolves to
    /// [`DetailError::NotFound`].
    #[must_use]
    pub fn new(source: Option<Arc<dyn DetailSource>>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            source,
            cache: Mutex::new(TtlMap::new(ttl)),
            in_flight: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Validates `vid`, then serves it from cache or the upstream.
    ///
    /// # Errors
    ///
    /// - [`DetailError::InvalidId`]: rejected before any upstream call.
    /// - [`DetailError::NotFound`]: the upstream has no usable record.
    /// - [`DetailError::Upstream`]: the upstream could not be reached.
    pub async fn get(&self, vid: &str) -> Result<VehicleDetail, DetailError> {
        let vid = validate_vid(vid)?;
        if let Some(hit) = self.cached(vid) {
            return Ok(hit);
        }
        let Some(source) = &self.source else {
            return Err(DetailError::NotFound {
                vid: vid.to_string(),
            });
        };

        let lease = self.gate(vid);
        let _held = lease.gate.lock().await;
        // A request that held the gate before us may have filled the cache.
        if let Some(hit) = self.cached(vid) {
            return Ok(hit);
        }
        self.fetch_and_store(source.as_ref(), vid).await
    }

    async fn fetch_and_store(
        &self,
        source: &dyn DetailSource,
        vid: &str,
    ) -> Result<VehicleDetail, DetailError> {
        match source.fetch(vid).await {
            Ok(detail) => {
                let now = self.clock.now();
                self.cache
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(vid.to_string(), detail.clone(), now);
                tracing::debug!(vid, "detail cached");
                Ok(detail)
            }
            Err(
                e @ (ScraperError::NotFound { .. }
                | ScraperError::UpstreamMalformed { .. }
                | ScraperError::Deserialize { .. }
                | ScraperError::ValidationRejected { .. }),
            ) => {
                tracing::debug!(vid, error = %e, "detail record unusable");
                Err(DetailError::NotFound {
                    vid: vid.to_string(),
                })
            }
            Err(e) => {
                tracing::warn!(vid, error = %e, "detail lookup failed");
                Err(DetailError::Upstream(e.to_string()))
            }
        }
    }

    fn cached(&self, vid: &str) -> Option<VehicleDetail> {
        let now = self.clock.now();
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&vid.to_string(), now)
            .cloned()
    }

    fn gate<'a>(&'a self, vid: &'a str) -> GateLease<'a> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        GateLease {
            in_flight: &self.in_flight,
            vid,
            gate: Arc::clone(in_flight.entry(vid.to_string()).or_default()),
        }
    }

    #[cfg(test)]
    fn gates(&self) -> usize {
        self.in_flight.lock().unwrap().len()
    }
}

/// A caller's share of one per-id gate. Dropping it, on completion or
/// cancellation, removes the gate once nobody else holds or awaits it.
struct GateLease<'a> {
    in_flight: &'a Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    vid: &'a str,
    gate: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for GateLease<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the map, one here.
        if Arc::strong_count(&self.gate) <= 2 {
            in_flight.remove(self.vid);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{TimeZone, Utc};
    use dealerstock_core::{Category, Dimensions, EngineSpec, Price, Vehicle};

    use super::*;
    use crate::cache::ManualClock;

    fn detail(vid: &str) -> VehicleDetail {
        VehicleDetail {
            vehicle: Vehicle {
                id: vid.to_string(),
                source: "dealer-api".to_string(),
                title: "VW Tiguan 2.0 TDI".to_string(),
                price: Price::Amount(33_490),
                year: Some(2019),
                mileage: Some(61_000),
                fuel_type: Some("Diesel".to_string()),
                power: None,
                transmission: None,
                image: None,
                all_images: Vec::new(),
                category: Category::Pkw,
                url: None,
            },
            engine: EngineSpec::default(),
            dimensions: Dimensions::default(),
            equipment: Vec::new(),
            description: None,
            warranty: None,
            leasing: None,
            color: None,
            previous_owners: None,
            condition: None,
        }
    }

    /// Counts calls and answers after a delay.
    struct SlowSource {
        calls: AtomicUsize,
        fail_with_status: Option<u16>,
    }

    #[async_trait]
    impl DetailSource for SlowSource {
        async fn fetch(&self, vid: &str) -> Result<VehicleDetail, ScraperError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(200)).await;
            match self.fail_with_status {
                Some(404) => Err(ScraperError::NotFound {
                    url: format!("/ad/{vid}"),
                }),
                Some(status) => Err(ScraperError::UnexpectedStatus {
                    status,
                    url: format!("/ad/{vid}"),
                }),
                None => Ok(detail(vid)),
            }
        }
    }

    fn fetcher(fail_with_status: Option<u16>) -> (Arc<SlowSource>, Arc<ManualClock>, DetailFetcher) {
        let source = Arc::new(SlowSource {
            calls: AtomicUsize::new(0),
            fail_with_status,
        });
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()));
        let fetcher = DetailFetcher::new(
            Some(source.clone() as Arc<dyn DetailSource>),
            Duration::from_secs(600),
            clock.clone(),
        );
        (source, clock, fetcher)
    }

    #[test]
    fn validate_vid_accepts_only_short_digit_strings() {
        assert_eq!(validate_vid("412345678"), Ok("412345678"));
        assert_eq!(validate_vid("1234567890"), Ok("1234567890"));
        for bad in ["", "abc", "12345678901", " 123", "12a4", "-1", "１２"] {
            assert_eq!(validate_vid(bad), Err(DetailError::InvalidId), "{bad:?}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_ids_never_reach_the_source() {
        let (source, _clock, fetcher) = fetcher(None);
        assert_eq!(fetcher.get("abc").await, Err(DetailError::InvalidId));
        assert_eq!(fetcher.get("12345678901").await, Err(DetailError::InvalidId));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_requests_for_one_id_share_a_fetch() {
        let (source, _clock, fetcher) = fetcher(None);

        let (a, b, c) = tokio::join!(fetcher.get("7"), fetcher.get("7"), fetcher.get("8"));

        assert_eq!(a.unwrap().vehicle.id, "7");
        assert_eq!(b.unwrap().vehicle.id, "7");
        assert_eq!(c.unwrap().vehicle.id, "8");
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(fetcher.gates(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_waiter_releases_its_gate() {
        let (source, _clock, fetcher) = fetcher(None);
        let mut holder = Box::pin(fetcher.get("7"));
        let mut waiter = Box::pin(fetcher.get("7"));

        assert!(futures::poll!(&mut holder).is_pending());
        assert!(futures::poll!(&mut waiter).is_pending());
        assert_eq!(holder.await.unwrap().vehicle.id, "7");
        assert_eq!(fetcher.gates(), 1);

        drop(waiter);
        assert_eq!(fetcher.gates(), 0);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cached_entries_expire_after_their_ttl() {
        let (source, clock, fetcher) = fetcher(None);

        fetcher.get("7").await.unwrap();
        clock.advance(Duration::from_secs(599));
        fetcher.get("7").await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        clock.advance(Duration::from_secs(1));
        fetcher.get("7").await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn upstream_errors_are_typed_and_not_cached() {
        let (source, _clock, missing) = fetcher(Some(404));
        assert_eq!(
            missing.get("99").await,
            Err(DetailError::NotFound {
                vid: "99".to_string()
            })
        );
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        let (source, _clock, broken) = fetcher(Some(502));
        assert!(matches!(broken.get("99").await, Err(DetailError::Upstream(_))));
        assert!(matches!(broken.get("99").await, Err(DetailError::Upstream(_))));
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn no_source_means_not_found() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let fetcher = DetailFetcher::new(None, Duration::from_secs(60), clock);
        assert!(matches!(fetcher.get("1").await, Err(DetailError::NotFound { .. })));
    }
}
