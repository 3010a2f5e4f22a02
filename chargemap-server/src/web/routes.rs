//! HTTP route handlers.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};

use crate::cache::PriceFilter;
use crate::domain::{BoundingBox, PoolId, PowerType, TariffId};

use super::dto::*;
use super::state::AppState;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/stations", get(region_prices))
        .route("/api/stations/:pool_id", get(station))
        .route("/api/stations/:pool_id/price", get(station_price))
        .route("/api/stations/:pool_id/refresh", post(refresh_station))
        .route("/api/regions/track", post(track_region))
        .route("/api/cache/stats", get(cache_stats))
        .with_state(state)
}

/// Health check: the process is up and the store answers.
async fn health(State(state): State<AppState>) -> Result<&'static str, AppError> {
    state.store.ping().await?;
    Ok("ok")
}

fn parse_bbox(lat_nw: f64, lng_nw: f64, lat_se: f64, lng_se: f64) -> Result<BoundingBox, AppError> {
    BoundingBox::new(lat_nw, lng_nw, lat_se, lng_se)
        .map_err(|e| AppError::bad_request(e.to_string()))
}

fn parse_pool_id(raw: &str) -> Result<PoolId, AppError> {
    PoolId::parse(raw).map_err(|_| AppError::bad_request(format!("invalid pool id: {raw}")))
}

/// Stations and prices in a bounding box, from the cache only.
async fn region_prices(
    State(state): State<AppState>,
    Query(query): Query<RegionQuery>,
) -> Result<Json<RegionResponse>, AppError> {
    let bbox = parse_bbox(query.lat_nw, query.lng_nw, query.lat_se, query.lng_se)?;

    let tariff = query
        .tariff
        .map(|t| TariffId::parse(&t).map_err(|_| AppError::bad_request(format!("invalid tariff: {t}"))))
        .transpose()?;
    let power_type = query
        .power_type
        .map(|p| {
            PowerType::parse(&p).ok_or_else(|| AppError::bad_request(format!("invalid power type: {p}")))
        })
        .transpose()?;

    let filter = PriceFilter { tariff, power_type };
    let stations = state.cache.get_region_prices(&bbox, &filter).await?;
    let count = stations.len();

    Ok(Json(RegionResponse { stations, count }))
}

/// Everything the cache knows about one station.
async fn station(
    State(state): State<AppState>,
    Path(pool_id): Path<String>,
) -> Result<Json<crate::cache::PriceSnapshot>, AppError> {
    let pool_id = parse_pool_id(&pool_id)?;
    let snapshot = state
        .cache
        .get_station(&pool_id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(snapshot))
}

/// One price quote for a station.
async fn station_price(
    State(state): State<AppState>,
    Path(pool_id): Path<String>,
    Query(query): Query<PriceQuery>,
) -> Result<Json<crate::domain::PriceQuote>, AppError> {
    let pool_id = parse_pool_id(&pool_id)?;
    let power_type = PowerType::parse(&query.power_type)
        .ok_or_else(|| AppError::bad_request(format!("invalid power type: {}", query.power_type)))?;
    let tariff = query
        .tariff
        .map(|t| TariffId::parse(&t).map_err(|_| AppError::bad_request(format!("invalid tariff: {t}"))))
        .transpose()?;

    let quote = state
        .cache
        .get_station_price(&pool_id, power_type, query.power, tariff.as_ref())
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(quote))
}

/// Put a viewport's grid cells under background refresh.
async fn track_region(
    State(state): State<AppState>,
    Json(request): Json<TrackRegionRequest>,
) -> Result<Json<TrackRegionResponse>, AppError> {
    let bbox = parse_bbox(
        request.lat_nw,
        request.lng_nw,
        request.lat_se,
        request.lng_se,
    )?;

    let tracked_cells = state.store.track_bbox(&bbox).await?;
    Ok(Json(TrackRegionResponse { tracked_cells }))
}

/// Request an early refresh of the region containing a station. The
/// refresh is asynchronous: the scheduler picks the region up on its next
/// tick, and reads keep serving the current snapshot until then.
async fn refresh_station(
    State(state): State<AppState>,
    Path(pool_id): Path<String>,
) -> Result<(StatusCode, Json<RefreshQueuedResponse>), AppError> {
    let pool_id = parse_pool_id(&pool_id)?;
    let snapshot = state
        .cache
        .get_station(&pool_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let region = snapshot.station.region_key();
    state.store.invalidate_region(region).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(RefreshQueuedResponse {
            queued: true,
            region: region.to_string(),
        }),
    ))
}

/// Cache statistics for monitoring.
async fn cache_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, AppError> {
    let cache = state.cache.stats().await?;
    Ok(Json(StatsResponse { cache }))
}
