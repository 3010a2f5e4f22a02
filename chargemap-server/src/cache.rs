//! Cache read API.
//!
//! The surface the web layer consumes. Every call is a plain read of the
//! persisted store: no network I/O, no waiting on the refresh scheduler,
//! no refresh triggering. Data older than the configured threshold is
//! still served — the caller gets a `stale` marker and the underlying
//! timestamps, and decides what to show.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{BoundingBox, PoolId, PowerType, PriceQuote, StatusRecord, TariffId};
use crate::store::{StationSnapshot, Store, StoreError, StoreStats};

/// Read-side configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Age beyond which served data is marked stale. Usually the same
    /// threshold the refresh scheduler works against.
    pub max_age: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Filters for region price reads. `None` fields match everything.
#[derive(Debug, Clone, Default)]
pub struct PriceFilter {
    pub tariff: Option<TariffId>,
    pub power_type: Option<PowerType>,
}

impl PriceFilter {
    fn matches(&self, quote: &PriceQuote) -> bool {
        self.tariff
            .as_ref()
            .is_none_or(|tariff| &quote.tariff_id == tariff)
            && self
                .power_type
                .is_none_or(|power_type| quote.power_type == power_type)
    }
}

/// A station as served to the web layer: the persisted record, its latest
/// status and quotes, and how old all of it is.
#[derive(Debug, Clone, Serialize)]
pub struct PriceSnapshot {
    #[serde(flatten)]
    pub station: crate::domain::Station,
    /// When the station record was last refreshed.
    pub updated_at: DateTime<Utc>,
    /// Whether `updated_at` is beyond the staleness threshold. Stale data
    /// is served anyway; there may be nothing fresher.
    pub stale: bool,
    pub status: Option<StatusRecord>,
    pub quotes: Vec<PriceQuote>,
}

/// Read API over the station store.
///
/// Cheap to clone. Holds the same injected [`Store`] instance the
/// scheduler writes through; WAL isolation keeps reads consistent while a
/// region commit is in flight.
#[derive(Debug, Clone)]
pub struct PriceCache {
    store: Store,
    config: CacheConfig,
}

impl PriceCache {
    pub fn new(store: Store, config: CacheConfig) -> Self {
        Self { store, config }
    }

    /// Stations in a bounding box with their quotes, filtered.
    ///
    /// Stations whose every quote is filtered away are still returned
    /// (the map shows them without a price tag); stations the cache has
    /// never seen simply are not in the result.
    pub async fn get_region_prices(
        &self,
        bbox: &BoundingBox,
        filter: &PriceFilter,
    ) -> Result<Vec<PriceSnapshot>, StoreError> {
        let now = Utc::now();
        let snapshots = self.store.read_region(bbox).await?;
        Ok(snapshots
            .into_iter()
            .map(|snapshot| self.present(snapshot, filter, now))
            .collect())
    }

    /// A single station with everything known about it.
    pub async fn get_station(&self, pool_id: &PoolId) -> Result<Option<PriceSnapshot>, StoreError> {
        let now = Utc::now();
        let snapshot = self.store.read_station(pool_id).await?;
        Ok(snapshot.map(|snapshot| self.present(snapshot, &PriceFilter::default(), now)))
    }

    /// One quote for a station. With no tariff given, the most recently
    /// fetched quote wins; with no power level, the power type's default
    /// level is used.
    pub async fn get_station_price(
        &self,
        pool_id: &PoolId,
        power_type: PowerType,
        power_kw: Option<u16>,
        tariff: Option<&TariffId>,
    ) -> Result<Option<PriceQuote>, StoreError> {
        let power_kw = power_kw.unwrap_or(power_type.default_power_kw());
        self.store
            .get_price(pool_id, power_type, power_kw, tariff)
            .await
    }

    /// Store-wide counters for the monitoring endpoint.
    pub async fn stats(&self) -> Result<StoreStats, StoreError> {
        self.store.stats(self.config.max_age).await
    }

    fn present(
        &self,
        snapshot: StationSnapshot,
        filter: &PriceFilter,
        now: DateTime<Utc>,
    ) -> PriceSnapshot {
        let age = now
            .signed_duration_since(snapshot.updated_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        PriceSnapshot {
            station: snapshot.station,
            updated_at: snapshot.updated_at,
            stale: age > self.config.max_age,
            status: snapshot.status,
            quotes: snapshot
                .quotes
                .into_iter()
                .filter(|quote| filter.matches(quote))
                .collect(),
        }
    }
}
