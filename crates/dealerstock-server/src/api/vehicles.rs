use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use dealerstock_core::VehicleDetail;
use dealerstock_inventory::{DetailError, UNAVAILABLE};

use crate::middleware::RequestId;

use super::{ApiError, AppState};

/// Always answers with the inventory payload; 503 only when the service
/// had nothing to serve.
pub(super) async fn list_vehicles(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Response {
    let response = state.inventory.get_vehicles().await;
    let status = if response.error.is_some() {
        tracing::error!(request_id = %req_id.0, "vehicle list unavailable");
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (status, Json(response)).into_response()
}

pub(super) async fn get_vehicle(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(vid): Path<String>,
) -> Result<Json<VehicleDetail>, ApiError> {
    state
        .inventory
        .get_vehicle_detail(&vid)
        .await
        .map(Json)
        .map_err(|e| map_detail_error(req_id.0, &e))
}

fn map_detail_error(request_id: String, error: &DetailError) -> ApiError {
    match error {
        DetailError::InvalidId => ApiError::new(request_id, "invalid_id", "invalid vehicle id"),
        DetailError::NotFound { .. } => {
            ApiError::new(request_id, "not_found", "vehicle not found")
        }
        DetailError::Upstream(_) => {
            tracing::error!(request_id = %request_id, error = %error, "vehicle detail lookup failed");
            ApiError::new(request_id, "unavailable", UNAVAILABLE)
        }
    }
}
