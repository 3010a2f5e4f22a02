//! Mock DCS API for testing without network access.
//!
//! Serves stations, statuses and prices from in-memory fixtures, records
//! every call it receives, and can be scripted to throttle or fail, which
//! is how the batcher and scheduler tests exercise their error paths.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::domain::{BoundingBox, ChargePointId, ChargePointState, Station, TariffId};

use super::error::DcsError;
use super::{PriceReading, PriceRequest, StationApi, StatusReading};

#[derive(Default)]
struct MockState {
    stations: Vec<Station>,
    states: HashMap<ChargePointId, ChargePointState>,
    energy_price: f64,
    session_fee: f64,

    /// Fail the next N price calls with a throttling error.
    throttle_price_calls: u32,
    /// Fail every region query with an API error while set.
    fail_region_queries: bool,

    region_query_count: u32,
    status_batches: Vec<Vec<ChargePointId>>,
    price_batches: Vec<Vec<ChargePointId>>,
}

/// In-memory [`StationApi`] implementation.
#[derive(Clone)]
pub struct MockApi {
    inner: Arc<Mutex<MockState>>,
}

impl MockApi {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockState {
                energy_price: 0.49,
                session_fee: 0.0,
                ..MockState::default()
            })),
        }
    }

    /// Add a station served by region queries covering its coordinates.
    pub async fn add_station(&self, station: Station) {
        self.inner.lock().await.stations.push(station);
    }

    /// Override a charge point's reported state (default: available).
    pub async fn set_state(&self, id: ChargePointId, state: ChargePointState) {
        self.inner.lock().await.states.insert(id, state);
    }

    /// Set the energy price quoted for every charge point.
    pub async fn set_energy_price(&self, price: f64) {
        self.inner.lock().await.energy_price = price;
    }

    /// Make the next `n` price calls fail with a throttling error.
    pub async fn throttle_next_price_calls(&self, n: u32) {
        self.inner.lock().await.throttle_price_calls = n;
    }

    /// Make region queries fail outright while enabled.
    pub async fn fail_region_queries(&self, fail: bool) {
        self.inner.lock().await.fail_region_queries = fail;
    }

    pub async fn region_query_count(&self) -> u32 {
        self.inner.lock().await.region_query_count
    }

    /// The charge point ids of every status call received, in order.
    pub async fn status_batches(&self) -> Vec<Vec<ChargePointId>> {
        self.inner.lock().await.status_batches.clone()
    }

    /// The charge point ids of every price call received, in order.
    /// Throttled calls are recorded too.
    pub async fn price_batches(&self) -> Vec<Vec<ChargePointId>> {
        self.inner.lock().await.price_batches.clone()
    }
}

impl Default for MockApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StationApi for MockApi {
    async fn query_region(&self, bbox: &BoundingBox) -> Result<Vec<Station>, DcsError> {
        let mut state = self.inner.lock().await;
        state.region_query_count += 1;

        if state.fail_region_queries {
            return Err(DcsError::Api {
                status: 503,
                message: "mock region failure".to_string(),
            });
        }

        Ok(state
            .stations
            .iter()
            .filter(|s| bbox.contains(s.latitude, s.longitude))
            .cloned()
            .collect())
    }

    async fn charge_point_status(
        &self,
        ids: &[ChargePointId],
    ) -> Result<Vec<StatusReading>, DcsError> {
        let mut state = self.inner.lock().await;
        state.status_batches.push(ids.to_vec());

        let observed_at = Utc::now();
        Ok(ids
            .iter()
            .map(|id| StatusReading {
                charge_point_id: id.clone(),
                state: state
                    .states
                    .get(id)
                    .copied()
                    .unwrap_or(ChargePointState::Available),
                observed_at,
            })
            .collect())
    }

    async fn tariff_prices(
        &self,
        _tariff: &TariffId,
        requests: &[PriceRequest],
    ) -> Result<Vec<PriceReading>, DcsError> {
        let mut state = self.inner.lock().await;
        state
            .price_batches
            .push(requests.iter().map(|r| r.charge_point_id.clone()).collect());

        if state.throttle_price_calls > 0 {
            state.throttle_price_calls -= 1;
            return Err(DcsError::Throttled { status: 403 });
        }

        Ok(requests
            .iter()
            .map(|r| PriceReading {
                charge_point_id: r.charge_point_id.clone(),
                power_type: r.power_type,
                power_kw: r.power_kw,
                currency: "EUR".to_string(),
                energy_price: state.energy_price,
                session_fee: state.session_fee,
                blocking_fee: None,
                blocking_after_mins: None,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PoolId;

    fn station(pool: &str, lat: f64, lng: f64, cp: &str) -> Station {
        Station {
            pool_id: PoolId::parse(pool).unwrap(),
            latitude: lat,
            longitude: lng,
            cpo_id: None,
            charge_point_count: 1,
            charge_points_ac: vec![ChargePointId::parse(cp).unwrap()],
            charge_points_dc: vec![],
        }
    }

    #[tokio::test]
    async fn region_query_filters_by_bbox() {
        let api = MockApi::new();
        api.add_station(station("P1", 52.5, 13.4, "CP1")).await;
        api.add_station(station("P2", 48.1, 11.6, "CP2")).await;

        let berlin = BoundingBox::new(53.0, 13.0, 52.0, 14.0).unwrap();
        let found = api.query_region(&berlin).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].pool_id.as_str(), "P1");
    }

    #[tokio::test]
    async fn throttling_script_runs_out() {
        let api = MockApi::new();
        api.throttle_next_price_calls(2).await;

        let tariff = TariffId::parse("HYUNDAI_FLEX").unwrap();
        let requests = vec![PriceRequest::at_default_power(
            ChargePointId::parse("CP1").unwrap(),
            crate::domain::PowerType::Ac,
        )];

        assert!(api.tariff_prices(&tariff, &requests).await.is_err());
        assert!(api.tariff_prices(&tariff, &requests).await.is_err());
        assert!(api.tariff_prices(&tariff, &requests).await.is_ok());
        assert_eq!(api.price_batches().await.len(), 3);
    }
}
