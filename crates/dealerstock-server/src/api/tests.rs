use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::Request;
use dealerstock_core::{Category, Dimensions, EngineSpec, Price, Vehicle, VehicleDetail};
use dealerstock_inventory::{
    Aggregator, DetailFetcher, DetailSource, InventoryService, SystemClock,
};
use dealerstock_scraper::{ErrorKind, ScraperError, SourceAdapterResult, Tier, VehicleSource};
use tower::ServiceExt;

use super::*;

fn vehicle(id: &str) -> Vehicle {
    Vehicle {
        id: id.to_string(),
        source: "dealer-api".to_string(),
        title: format!("Ford Transit Custom {id}"),
        price: Price::Amount(27_500),
        year: Some(2021),
        mileage: Some(54_000),
        fuel_type: Some("Diesel".to_string()),
        power: None,
        transmission: None,
        image: None,
        all_images: Vec::new(),
        category: Category::Nutzfahrzeuge,
        url: None,
    }
}

struct StubSource {
    up: bool,
}

#[async_trait]
impl VehicleSource for StubSource {
    fn source_id(&self) -> &str {
        "dealer-api"
    }

    fn priority(&self) -> u8 {
        0
    }

    async fn fetch(&self) -> SourceAdapterResult {
        if !self.up {
            return SourceAdapterResult::failed(
                "dealer-api",
                0,
                ErrorKind::UpstreamUnavailable,
                "HTTP error: connection refused (10.0.0.4:443)".to_string(),
            );
        }
        SourceAdapterResult {
            source_id: "dealer-api".to_string(),
            priority: 0,
            vehicles: vec![vehicle("100"), vehicle("200")],
            partial: false,
            error: None,
            error_kind: None,
            tier: Some(Tier::StructuredApi),
            attempts: Vec::new(),
        }
    }
}

/// Knows vehicle 100; fails upstream for 500; everything else is missing.
struct StubDetails;

#[async_trait]
impl DetailSource for StubDetails {
    async fn fetch(&self, vid: &str) -> Result<VehicleDetail, ScraperError> {
        match vid {
            "100" => Ok(VehicleDetail {
                vehicle: vehicle("100"),
                engine: EngineSpec::default(),
                dimensions: Dimensions::default(),
                equipment: vec!["Anhängerkupplung".to_string()],
                description: None,
                warranty: None,
                leasing: None,
                color: None,
                previous_owners: Some(1),
                condition: None,
            }),
            "500" => Err(ScraperError::UnexpectedStatus {
                status: 500,
                url: "https://internal.example/ad/500".to_string(),
            }),
            _ => Err(ScraperError::NotFound {
                url: format!("https://internal.example/ad/{vid}"),
            }),
        }
    }
}

fn app(source_up: bool) -> Router {
    let clock = Arc::new(SystemClock);
    let aggregator = Aggregator::new(
        vec![Arc::new(StubSource { up: source_up }) as Arc<dyn VehicleSource>],
        30,
        Duration::from_secs(5),
    );
    let details = DetailFetcher::new(
        Some(Arc::new(StubDetails) as Arc<dyn DetailSource>),
        Duration::from_secs(60),
        clock.clone(),
    );
    let inventory = InventoryService::new(aggregator, details, Duration::from_secs(60), clock);
    build_app(AppState {
        inventory: Arc::new(inventory),
    })
}

async fn get(app: Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, serde_json::Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).expect("request"))
        .await
        .expect("response");
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let json = serde_json::from_slice(&body).expect("json parse");
    (status, headers, json)
}

#[tokio::test]
async fn health_reports_ok_and_sets_request_id() {
    let (status, headers, json) = get(app(true), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, serde_json::json!({"status": "ok"}));
    assert!(headers.contains_key(REQUEST_ID_HEADER));
}

#[tokio::test]
async fn incoming_request_id_is_echoed() {
    let response = app(true)
        .oneshot(
            Request::builder()
                .uri("/health")
                .header(REQUEST_ID_HEADER, "req-abc")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.headers()[REQUEST_ID_HEADER], "req-abc");
}

#[tokio::test]
async fn vehicle_list_returns_the_canonical_payload() {
    let (status, _, json) = get(app(true), "/api/vehicles").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 2);
    assert_eq!(json["cached"], false);
    assert_eq!(json["vehicles"][0]["fuelType"], "Diesel");
    assert_eq!(json["vehicles"][0]["category"], "nutzfahrzeuge");
    assert!(json.get("error").is_none());
}

#[tokio::test]
async fn cold_outage_is_503_without_internal_detail() {
    let (status, _, json) = get(app(false), "/api/vehicles").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"], "temporarily unavailable");
    assert_eq!(json["count"], 0);
    assert!(!json.to_string().contains("10.0.0.4"));
}

#[tokio::test]
async fn vehicle_detail_returns_the_extended_record() {
    let (status, _, json) = get(app(true), "/api/vehicles/100").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["id"], "100");
    assert_eq!(json["equipment"][0], "Anhängerkupplung");
    assert_eq!(json["previousOwners"], 1);
}

#[tokio::test]
async fn vehicle_detail_errors_map_to_status_codes() {
    let (status, _, json) = get(app(true), "/api/vehicles/abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "invalid_id");

    let (status, _, json) = get(app(true), "/api/vehicles/12345678901").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "invalid_id");

    let (status, _, json) = get(app(true), "/api/vehicles/999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "not_found");

    let (status, _, json) = get(app(true), "/api/vehicles/500").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"]["message"], "temporarily unavailable");
    assert!(!json.to_string().contains("internal.example"));
}

#[test]
fn unknown_error_code_maps_to_internal_server_error() {
    let response = ApiError::new("req-1", "boom", "unexpected").into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
