//! Read side of the store.
//!
//! Everything here is a plain query against whatever is committed; reads
//! never touch the network and never wait on the refresh scheduler.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::domain::{
    ChargePointId, ChargePointState, PoolId, PowerType, PriceQuote, RegionKey, Station,
    StatusRecord, TariffId,
};

use super::{Store, StoreError};

/// A station joined with its latest status and price quotes.
#[derive(Debug, Clone)]
pub struct StationSnapshot {
    pub station: Station,
    /// When the station record itself was last refreshed.
    pub updated_at: DateTime<Utc>,
    pub status: Option<StatusRecord>,
    pub quotes: Vec<PriceQuote>,
}

/// Cache-wide counts for the monitoring endpoint.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StoreStats {
    pub stations: u32,
    pub prices: u32,
    pub fresh_stations: u32,
    pub stale_stations: u32,
    pub tracked_regions: u32,
}

pub(crate) fn cutoff(now: DateTime<Utc>, max_age: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(max_age)
        .ok()
        .and_then(|age| now.checked_sub_signed(age))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

impl Store {
    /// Read one station with its status and quotes. `None` if unknown.
    pub async fn read_station(&self, id: &PoolId) -> Result<Option<StationSnapshot>, StoreError> {
        let row = sqlx::query(
            "SELECT pool_id, latitude, longitude, cpo_id, charge_point_count,
                    charge_points_ac, charge_points_dc, updated_at
             FROM stations WHERE pool_id = ?",
        )
        .bind(id.as_str())
        .fetch_optional(self.pool())
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let (station, updated_at) = station_from_row(&row)?;

        let status = sqlx::query("SELECT pool_id, state, observed_at FROM statuses WHERE pool_id = ?")
            .bind(id.as_str())
            .fetch_optional(self.pool())
            .await?
            .map(|row| status_from_row(&row))
            .transpose()?;

        let mut quotes = Vec::new();
        for row in sqlx::query(
            "SELECT pool_id, power_type, power, tariff_id, charge_point_id, currency,
                    energy_price, session_fee, blocking_fee, blocking_after_mins, fetched_at
             FROM prices WHERE pool_id = ?
             ORDER BY tariff_id, power_type",
        )
        .bind(id.as_str())
        .fetch_all(self.pool())
        .await?
        {
            quotes.push(quote_from_row(&row)?);
        }

        Ok(Some(StationSnapshot {
            station,
            updated_at,
            status,
            quotes,
        }))
    }

    /// Read every station in a bounding box, joined with status and quotes.
    pub async fn read_region(
        &self,
        bbox: &crate::domain::BoundingBox,
    ) -> Result<Vec<StationSnapshot>, StoreError> {
        let rows = sqlx::query(
            "SELECT pool_id, latitude, longitude, cpo_id, charge_point_count,
                    charge_points_ac, charge_points_dc, updated_at
             FROM stations
             WHERE latitude <= ? AND latitude >= ? AND longitude >= ? AND longitude <= ?
             ORDER BY pool_id",
        )
        .bind(bbox.lat_nw())
        .bind(bbox.lat_se())
        .bind(bbox.lng_nw())
        .bind(bbox.lng_se())
        .fetch_all(self.pool())
        .await?;

        let mut snapshots = Vec::with_capacity(rows.len());
        let mut index = HashMap::with_capacity(rows.len());
        for row in &rows {
            let (station, updated_at) = station_from_row(row)?;
            index.insert(station.pool_id.clone(), snapshots.len());
            snapshots.push(StationSnapshot {
                station,
                updated_at,
                status: None,
                quotes: Vec::new(),
            });
        }

        let status_rows = sqlx::query(
            "SELECT st.pool_id, st.state, st.observed_at
             FROM statuses st JOIN stations s ON s.pool_id = st.pool_id
             WHERE s.latitude <= ? AND s.latitude >= ? AND s.longitude >= ? AND s.longitude <= ?",
        )
        .bind(bbox.lat_nw())
        .bind(bbox.lat_se())
        .bind(bbox.lng_nw())
        .bind(bbox.lng_se())
        .fetch_all(self.pool())
        .await?;
        for row in &status_rows {
            let status = status_from_row(row)?;
            if let Some(&i) = index.get(&status.pool_id) {
                snapshots[i].status = Some(status);
            }
        }

        let price_rows = sqlx::query(
            "SELECT p.pool_id, p.power_type, p.power, p.tariff_id, p.charge_point_id,
                    p.currency, p.energy_price, p.session_fee, p.blocking_fee,
                    p.blocking_after_mins, p.fetched_at
             FROM prices p JOIN stations s ON s.pool_id = p.pool_id
             WHERE s.latitude <= ? AND s.latitude >= ? AND s.longitude >= ? AND s.longitude <= ?
             ORDER BY p.tariff_id, p.power_type",
        )
        .bind(bbox.lat_nw())
        .bind(bbox.lat_se())
        .bind(bbox.lng_nw())
        .bind(bbox.lng_se())
        .fetch_all(self.pool())
        .await?;
        for row in &price_rows {
            let quote = quote_from_row(row)?;
            if let Some(&i) = index.get(&quote.pool_id) {
                snapshots[i].quotes.push(quote);
            }
        }

        Ok(snapshots)
    }

    /// Look up one price quote. With no tariff given, the most recently
    /// fetched quote across tariffs wins.
    pub async fn get_price(
        &self,
        pool_id: &PoolId,
        power_type: PowerType,
        power_kw: u16,
        tariff: Option<&TariffId>,
    ) -> Result<Option<PriceQuote>, StoreError> {
        let row = match tariff {
            Some(tariff) => {
                sqlx::query(
                    "SELECT pool_id, power_type, power, tariff_id, charge_point_id, currency,
                            energy_price, session_fee, blocking_fee, blocking_after_mins, fetched_at
                     FROM prices
                     WHERE pool_id = ? AND power_type = ? AND power = ? AND tariff_id = ?",
                )
                .bind(pool_id.as_str())
                .bind(power_type.as_str())
                .bind(power_kw)
                .bind(tariff.as_str())
                .fetch_optional(self.pool())
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT pool_id, power_type, power, tariff_id, charge_point_id, currency,
                            energy_price, session_fee, blocking_fee, blocking_after_mins, fetched_at
                     FROM prices
                     WHERE pool_id = ? AND power_type = ? AND power = ?
                     ORDER BY fetched_at DESC LIMIT 1",
                )
                .bind(pool_id.as_str())
                .bind(power_type.as_str())
                .bind(power_kw)
                .fetch_optional(self.pool())
                .await?
            }
        };

        row.map(|row| quote_from_row(&row)).transpose()
    }

    /// Tracked regions whose cursor is older than `max_age` (or that have
    /// never been refreshed), oldest first.
    pub async fn stale_regions(
        &self,
        max_age: Duration,
        limit: u32,
    ) -> Result<Vec<RegionKey>, StoreError> {
        let cutoff = cutoff(Utc::now(), max_age);
        let rows = sqlx::query(
            "SELECT region_key FROM refresh_cursors
             WHERE last_refreshed_at IS NULL OR last_refreshed_at < ?
             ORDER BY last_refreshed_at ASC
             LIMIT ?",
        )
        .bind(cutoff)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        let mut regions = Vec::with_capacity(rows.len());
        for row in rows {
            let key: String = row.try_get("region_key")?;
            regions.push(
                RegionKey::parse(&key)
                    .map_err(|_| StoreError::corrupt(format!("bad region key {key:?}")))?,
            );
        }
        Ok(regions)
    }

    /// Counts for the monitoring endpoint; `max_age` defines "fresh".
    pub async fn stats(&self, max_age: Duration) -> Result<StoreStats, StoreError> {
        let cutoff = cutoff(Utc::now(), max_age);

        let stations: u32 = scalar(self, "SELECT COUNT(*) FROM stations").await?;
        let prices: u32 = scalar(self, "SELECT COUNT(*) FROM prices").await?;
        let tracked_regions: u32 = scalar(self, "SELECT COUNT(*) FROM refresh_cursors").await?;
        let fresh_stations: u32 = sqlx::query("SELECT COUNT(*) FROM stations WHERE updated_at >= ?")
            .bind(cutoff)
            .fetch_one(self.pool())
            .await?
            .try_get(0)?;

        Ok(StoreStats {
            stations,
            prices,
            fresh_stations,
            stale_stations: stations - fresh_stations,
            tracked_regions,
        })
    }
}

async fn scalar(store: &Store, sql: &str) -> Result<u32, StoreError> {
    Ok(sqlx::query(sql).fetch_one(store.pool()).await?.try_get(0)?)
}

fn station_from_row(row: &SqliteRow) -> Result<(Station, DateTime<Utc>), StoreError> {
    let pool_id: String = row.try_get("pool_id")?;
    let pool_id =
        PoolId::parse(&pool_id).map_err(|e| StoreError::corrupt(format!("pool id: {e}")))?;

    let ac: String = row.try_get("charge_points_ac")?;
    let dc: String = row.try_get("charge_points_dc")?;
    let charge_points_ac: Vec<ChargePointId> = serde_json::from_str(&ac)
        .map_err(|e| StoreError::corrupt(format!("charge point list: {e}")))?;
    let charge_points_dc: Vec<ChargePointId> = serde_json::from_str(&dc)
        .map_err(|e| StoreError::corrupt(format!("charge point list: {e}")))?;

    let station = Station {
        pool_id,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        cpo_id: row.try_get("cpo_id")?,
        charge_point_count: row.try_get("charge_point_count")?,
        charge_points_ac,
        charge_points_dc,
    };
    let updated_at: DateTime<Utc> = row.try_get("updated_at")?;
    Ok((station, updated_at))
}

fn quote_from_row(row: &SqliteRow) -> Result<PriceQuote, StoreError> {
    let pool_id: String = row.try_get("pool_id")?;
    let charge_point_id: String = row.try_get("charge_point_id")?;
    let tariff_id: String = row.try_get("tariff_id")?;
    let power_type: String = row.try_get("power_type")?;

    Ok(PriceQuote {
        pool_id: PoolId::parse(&pool_id)
            .map_err(|e| StoreError::corrupt(format!("pool id: {e}")))?,
        charge_point_id: ChargePointId::parse(&charge_point_id)
            .map_err(|e| StoreError::corrupt(format!("charge point id: {e}")))?,
        tariff_id: TariffId::parse(&tariff_id)
            .map_err(|e| StoreError::corrupt(format!("tariff id: {e}")))?,
        power_type: PowerType::parse(&power_type)
            .ok_or_else(|| StoreError::corrupt(format!("power type {power_type:?}")))?,
        power_kw: row.try_get("power")?,
        currency: row.try_get("currency")?,
        energy_price: row.try_get("energy_price")?,
        session_fee: row.try_get("session_fee")?,
        blocking_fee: row.try_get("blocking_fee")?,
        blocking_after_mins: row.try_get("blocking_after_mins")?,
        fetched_at: row.try_get("fetched_at")?,
    })
}

fn status_from_row(row: &SqliteRow) -> Result<StatusRecord, StoreError> {
    let pool_id: String = row.try_get("pool_id")?;
    let state: String = row.try_get("state")?;

    Ok(StatusRecord {
        pool_id: PoolId::parse(&pool_id)
            .map_err(|e| StoreError::corrupt(format!("pool id: {e}")))?,
        state: ChargePointState::from_upstream(&state),
        observed_at: row.try_get("observed_at")?,
    })
}
