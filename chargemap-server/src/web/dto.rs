//! Data transfer objects for web requests and responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::cache::PriceSnapshot;
use crate::store::{StoreError, StoreStats};

/// Bounding box query parameters, as sent by the map front end.
#[derive(Debug, Deserialize)]
pub struct RegionQuery {
    pub lat_nw: f64,
    pub lng_nw: f64,
    pub lat_se: f64,
    pub lng_se: f64,

    /// Optional tariff filter.
    pub tariff: Option<String>,

    /// Optional power type filter ("AC" or "DC").
    pub power_type: Option<String>,
}

/// Response for a region read.
#[derive(Debug, Serialize)]
pub struct RegionResponse {
    pub stations: Vec<PriceSnapshot>,
    pub count: usize,
}

/// Query parameters for a single price lookup.
#[derive(Debug, Deserialize)]
pub struct PriceQuery {
    /// "AC" or "DC".
    pub power_type: String,

    /// Power level in kW; defaults per power type when absent.
    pub power: Option<u16>,

    /// Tariff id; the freshest quote across tariffs when absent.
    pub tariff: Option<String>,
}

/// Body of the track-region request.
#[derive(Debug, Deserialize)]
pub struct TrackRegionRequest {
    pub lat_nw: f64,
    pub lng_nw: f64,
    pub lat_se: f64,
    pub lng_se: f64,
}

/// Response for the track-region request.
#[derive(Debug, Serialize)]
pub struct TrackRegionResponse {
    /// Grid cells newly put under refresh.
    pub tracked_cells: usize,
}

/// Response for a manual refresh request. The refresh itself happens on
/// the scheduler's next tick; this only acknowledges the queueing.
#[derive(Debug, Serialize)]
pub struct RefreshQueuedResponse {
    pub queued: bool,
    pub region: String,
}

/// Response for the cache statistics endpoint.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub cache: StoreStats,
}

/// Errors surfaced to HTTP clients.
///
/// Upstream fetch errors never appear here: handlers only read the store.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    BadRequest { message: String },

    #[error("not found")]
    NotFound,

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest {
            message: message.into(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Store(err) => {
                tracing::error!(error = %err, "store error while serving request");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
