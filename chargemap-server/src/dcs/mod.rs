//! DCS map API client.
//!
//! The charging network exposes the same JSON API its own web map uses,
//! rooted at `/api/map/v1/{market}`. Three calls matter to us:
//!
//! - the cluster query (`rest-api-path: clusters`): bounding box in, pools
//!   with their charge point ids out
//! - the dynamic status query (`rest-api-path: charge-points`): charge
//!   point ids in, operational states out
//! - the tariff price query: `(charge_point, power_type, power)` triples
//!   in, price component breakdowns out
//!
//! The API is unauthenticated but informally rate limited: it answers a
//! browser-shaped client politely and starts returning 403 when queried
//! too fast. Pacing is the refresh scheduler's job, not this module's.

mod client;
mod error;
mod mock;
mod types;

pub use client::{DcsClient, DcsConfig};
pub use error::DcsError;
pub use mock::MockApi;
pub use types::{
    ClusterQueryRequest, ClusterQueryResponse, PoolDto, PriceDto, PriceRequestDto,
    StatusQueryRequest, StatusQueryResponse,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{BoundingBox, ChargePointId, ChargePointState, PowerType, Station, TariffId};

/// One charge point's observed operational state.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReading {
    pub charge_point_id: ChargePointId,
    pub state: ChargePointState,
    /// Upstream-reported observation time; falls back to the fetch time
    /// when the upstream omits or mangles it.
    pub observed_at: DateTime<Utc>,
}

/// A single entry of a price query.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceRequest {
    pub charge_point_id: ChargePointId,
    pub power_type: PowerType,
    pub power_kw: u16,
}

impl PriceRequest {
    /// Request at the default power level for the charge point's type.
    pub fn at_default_power(charge_point_id: ChargePointId, power_type: PowerType) -> Self {
        Self {
            charge_point_id,
            power_type,
            power_kw: power_type.default_power_kw(),
        }
    }
}

/// A parsed price quote for one charge point, before it is keyed to a
/// station and stamped by the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceReading {
    pub charge_point_id: ChargePointId,
    pub power_type: PowerType,
    pub power_kw: u16,
    pub currency: String,
    pub energy_price: f64,
    pub session_fee: f64,
    pub blocking_fee: Option<f64>,
    pub blocking_after_mins: Option<u32>,
}

/// The upstream surface the refresh scheduler is written against.
///
/// `DcsClient` is the real thing; [`MockApi`] serves canned data for tests
/// and offline development.
#[async_trait]
pub trait StationApi: Send + Sync {
    /// Resolve the stations in a bounding box, with their charge point ids.
    async fn query_region(&self, bbox: &BoundingBox) -> Result<Vec<Station>, DcsError>;

    /// Fetch the operational state of the given charge points.
    async fn charge_point_status(
        &self,
        ids: &[ChargePointId],
    ) -> Result<Vec<StatusReading>, DcsError>;

    /// Fetch prices under a tariff for the given charge points.
    async fn tariff_prices(
        &self,
        tariff: &TariffId,
        requests: &[PriceRequest],
    ) -> Result<Vec<PriceReading>, DcsError>;
}
