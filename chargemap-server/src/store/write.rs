//! Write side of the store.
//!
//! Only the refresh scheduler calls these (plus the two small cursor
//! operations the web layer uses to request coverage). Every upsert
//! carries the freshness guard: a row is only replaced by data at least as
//! new as what it already holds, so at-least-once refresh scheduling and
//! out-of-order arrival both collapse to "freshest write wins".

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::domain::{BoundingBox, PriceQuote, RegionKey, Station, StatusRecord};

use super::{Store, StoreError};

/// Everything one region refresh produced, committed atomically.
#[derive(Debug, Clone)]
pub struct RegionCommit {
    pub region: RegionKey,
    pub stations: Vec<Station>,
    pub quotes: Vec<PriceQuote>,
    pub statuses: Vec<StatusRecord>,
    /// Station `updated_at` and the region cursor position.
    pub refreshed_at: DateTime<Utc>,
}

impl Store {
    /// Insert or update a single station.
    pub async fn upsert_station(
        &self,
        station: &Station,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool().begin().await?;
        insert_station(&mut tx, station, updated_at).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Insert or update price quotes, all in one transaction.
    ///
    /// Fails with [`StoreError::MissingStation`] (rolling back the whole
    /// batch) if any quote references a station without a row.
    pub async fn upsert_prices(&self, quotes: &[PriceQuote]) -> Result<(), StoreError> {
        let mut tx = self.pool().begin().await?;
        for quote in quotes {
            insert_price(&mut tx, quote).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Insert or update a station's availability status.
    pub async fn upsert_status(&self, record: &StatusRecord) -> Result<(), StoreError> {
        let mut tx = self.pool().begin().await?;
        insert_status(&mut tx, record).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Commit one region's refresh results atomically: stations first,
    /// then statuses and prices, then the region cursor. A failure
    /// anywhere rolls the whole region back, cursor included.
    pub async fn commit_region(&self, commit: &RegionCommit) -> Result<(), StoreError> {
        let mut tx = self.pool().begin().await?;

        for station in &commit.stations {
            insert_station(&mut tx, station, commit.refreshed_at).await?;
        }
        for status in &commit.statuses {
            insert_status(&mut tx, status).await?;
        }
        for quote in &commit.quotes {
            insert_price(&mut tx, quote).await?;
        }
        advance_cursor(&mut tx, commit.region, commit.refreshed_at).await?;

        tx.commit().await?;

        debug!(
            region = %commit.region,
            stations = commit.stations.len(),
            quotes = commit.quotes.len(),
            "region committed"
        );
        Ok(())
    }

    /// Advance a region's refresh cursor to `at`.
    pub async fn mark_refreshed(
        &self,
        region: RegionKey,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool().begin().await?;
        advance_cursor(&mut tx, region, at).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Start tracking a region. New regions have no cursor position and
    /// are therefore immediately stale. Returns whether the region was
    /// newly tracked.
    pub async fn track_region(&self, region: RegionKey) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "INSERT INTO refresh_cursors (region_key, last_refreshed_at) VALUES (?, NULL)
             ON CONFLICT(region_key) DO NOTHING",
        )
        .bind(region.to_string())
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Track every grid cell a bounding box intersects. Returns how many
    /// were newly tracked.
    pub async fn track_bbox(&self, bbox: &BoundingBox) -> Result<usize, StoreError> {
        let mut added = 0;
        for cell in bbox.cells() {
            if self.track_region(cell).await? {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Reset a region's cursor so the next scheduler tick re-fetches it.
    /// Tracks the region if it was not tracked yet.
    pub async fn invalidate_region(&self, region: RegionKey) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO refresh_cursors (region_key, last_refreshed_at) VALUES (?, NULL)
             ON CONFLICT(region_key) DO UPDATE SET last_refreshed_at = NULL",
        )
        .bind(region.to_string())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Record a refresh attempt in the update log.
    pub async fn log_refresh(
        &self,
        region: RegionKey,
        success: bool,
        error: Option<&str>,
        duration_ms: i64,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO update_log (region_key, success, error, duration_ms, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(region.to_string())
        .bind(success)
        .bind(error)
        .bind(duration_ms)
        .bind(Utc::now())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Delete stations (and their prices and statuses) not updated within
    /// the horizon. Optional housekeeping — upstream ids are stable, so by
    /// default nothing ever calls this.
    pub async fn prune_stations(&self, older_than: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut tx = self.pool().begin().await?;

        sqlx::query(
            "DELETE FROM prices WHERE pool_id IN
             (SELECT pool_id FROM stations WHERE updated_at < ?)",
        )
        .bind(older_than)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "DELETE FROM statuses WHERE pool_id IN
             (SELECT pool_id FROM stations WHERE updated_at < ?)",
        )
        .bind(older_than)
        .execute(&mut *tx)
        .await?;
        let result = sqlx::query("DELETE FROM stations WHERE updated_at < ?")
            .bind(older_than)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }

    /// Trim old update log rows.
    pub async fn prune_update_log(&self, older_than: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM update_log WHERE created_at < ?")
            .bind(older_than)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }
}

async fn insert_station(
    conn: &mut SqliteConnection,
    station: &Station,
    updated_at: DateTime<Utc>,
) -> Result<(), StoreError> {
    let ac = serde_json::to_string(&station.charge_points_ac)
        .map_err(|e| StoreError::corrupt(format!("encoding charge point list: {e}")))?;
    let dc = serde_json::to_string(&station.charge_points_dc)
        .map_err(|e| StoreError::corrupt(format!("encoding charge point list: {e}")))?;

    sqlx::query(
        "INSERT INTO stations (pool_id, latitude, longitude, cpo_id, charge_point_count,
                               charge_points_ac, charge_points_dc, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(pool_id) DO UPDATE SET
             latitude = excluded.latitude,
             longitude = excluded.longitude,
             cpo_id = excluded.cpo_id,
             charge_point_count = excluded.charge_point_count,
             charge_points_ac = excluded.charge_points_ac,
             charge_points_dc = excluded.charge_points_dc,
             updated_at = excluded.updated_at
         WHERE excluded.updated_at >= stations.updated_at",
    )
    .bind(station.pool_id.as_str())
    .bind(station.latitude)
    .bind(station.longitude)
    .bind(station.cpo_id.as_deref())
    .bind(station.charge_point_count)
    .bind(ac)
    .bind(dc)
    .bind(updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn insert_price(conn: &mut SqliteConnection, quote: &PriceQuote) -> Result<(), StoreError> {
    require_station(conn, &quote.pool_id).await?;

    sqlx::query(
        "INSERT INTO prices (pool_id, power_type, power, tariff_id, charge_point_id,
                             currency, energy_price, session_fee, blocking_fee,
                             blocking_after_mins, fetched_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(pool_id, power_type, power, tariff_id) DO UPDATE SET
             charge_point_id = excluded.charge_point_id,
             currency = excluded.currency,
             energy_price = excluded.energy_price,
             session_fee = excluded.session_fee,
             blocking_fee = excluded.blocking_fee,
             blocking_after_mins = excluded.blocking_after_mins,
             fetched_at = excluded.fetched_at
         WHERE excluded.fetched_at >= prices.fetched_at",
    )
    .bind(quote.pool_id.as_str())
    .bind(quote.power_type.as_str())
    .bind(quote.power_kw)
    .bind(quote.tariff_id.as_str())
    .bind(quote.charge_point_id.as_str())
    .bind(&quote.currency)
    .bind(quote.energy_price)
    .bind(quote.session_fee)
    .bind(quote.blocking_fee)
    .bind(quote.blocking_after_mins)
    .bind(quote.fetched_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn insert_status(
    conn: &mut SqliteConnection,
    record: &StatusRecord,
) -> Result<(), StoreError> {
    require_station(conn, &record.pool_id).await?;

    sqlx::query(
        "INSERT INTO statuses (pool_id, state, observed_at) VALUES (?, ?, ?)
         ON CONFLICT(pool_id) DO UPDATE SET
             state = excluded.state,
             observed_at = excluded.observed_at
         WHERE excluded.observed_at >= statuses.observed_at",
    )
    .bind(record.pool_id.as_str())
    .bind(record.state.as_str())
    .bind(record.observed_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn advance_cursor(
    conn: &mut SqliteConnection,
    region: RegionKey,
    at: DateTime<Utc>,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO refresh_cursors (region_key, last_refreshed_at, refreshed_count)
         VALUES (?, ?, 1)
         ON CONFLICT(region_key) DO UPDATE SET
             last_refreshed_at = excluded.last_refreshed_at,
             refreshed_count = refresh_cursors.refreshed_count + 1",
    )
    .bind(region.to_string())
    .bind(at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Referential integrity, enforced at write time: the station row must
/// already be visible within this transaction.
async fn require_station(
    conn: &mut SqliteConnection,
    pool_id: &crate::domain::PoolId,
) -> Result<(), StoreError> {
    let exists = sqlx::query("SELECT 1 FROM stations WHERE pool_id = ?")
        .bind(pool_id.as_str())
        .fetch_optional(&mut *conn)
        .await?
        .is_some();
    if !exists {
        return Err(StoreError::MissingStation(pool_id.clone()));
    }
    Ok(())
}
