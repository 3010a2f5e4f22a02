//! Background refresh scheduler.
//!
//! One instance per process. Each tick it asks the store which regions
//! have gone stale, re-fetches them through the rate-limited batcher and
//! commits the results, one transaction per region. Request handlers
//! never wait on any of this: the worst consequence of an upstream outage
//! is that reads serve older data.
//!
//! Refresh of a region walks IDLE → SELECTING → FETCHING → COMMITTING; a
//! region whose fetch fails outright leaves its cursor untouched (so it is
//! selected again) and puts the loop into an error backoff that doubles,
//! capped, until a region succeeds again.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::StreamExt;
use std::collections::HashMap;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::dcs::{DcsError, PriceRequest, StationApi};
use crate::domain::{
    ChargePointId, ChargePointState, PoolId, PowerType, PriceQuote, RegionKey, StatusRecord,
    TariffId,
};
use crate::store::{RegionCommit, Store, StoreError, cutoff};

use super::batcher::{self, BatcherConfig};

/// Errors a single region refresh can end with.
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    /// The region's fetch failed outright (e.g. the cluster query itself).
    #[error("region fetch failed: {0}")]
    Fetch(#[from] DcsError),

    /// Committing the region's results failed, after the one retry.
    #[error("region commit failed: {0}")]
    Store(#[from] StoreError),
}

/// Scheduler configuration. All scalars; nothing is reloaded at runtime.
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Idle time between scheduler ticks.
    pub tick_interval: Duration,
    /// Age beyond which a region's data counts as stale.
    pub max_age: Duration,
    /// Upper bound of regions refreshed per tick, to keep a tick's
    /// upstream footprint bounded.
    pub regions_per_tick: u32,
    /// Tariffs to quote prices under.
    pub tariffs: Vec<TariffId>,
    /// Pacing of the underlying upstream calls.
    pub batcher: BatcherConfig,
    /// First error backoff; doubles per consecutive failed region, capped.
    pub error_backoff_initial: Duration,
    pub error_backoff_max: Duration,
    /// Prune stations not refreshed within this horizon. `None` (the
    /// default) never prunes: upstream ids are assumed stable.
    pub prune_after: Option<Duration>,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(60),
            max_age: Duration::from_secs(24 * 60 * 60),
            regions_per_tick: 4,
            tariffs: default_tariffs(),
            batcher: BatcherConfig::default(),
            error_backoff_initial: Duration::from_secs(30),
            error_backoff_max: Duration::from_secs(15 * 60),
            prune_after: None,
        }
    }
}

fn default_tariffs() -> Vec<TariffId> {
    ["HYUNDAI_FLEX", "HYUNDAI_SMART"]
        .into_iter()
        .map(|t| TariffId::parse(t).expect("static tariff id"))
        .collect()
}

impl RefreshConfig {
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn with_regions_per_tick(mut self, n: u32) -> Self {
        self.regions_per_tick = n;
        self
    }

    pub fn with_tariffs(mut self, tariffs: Vec<TariffId>) -> Self {
        self.tariffs = tariffs;
        self
    }

    pub fn with_batcher(mut self, batcher: BatcherConfig) -> Self {
        self.batcher = batcher;
        self
    }

    pub fn with_prune_after(mut self, horizon: Option<Duration>) -> Self {
        self.prune_after = horizon;
        self
    }
}

/// What one tick did; returned for observability and tests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub regions_refreshed: u32,
    pub regions_failed: u32,
    pub stations_committed: u32,
    pub quotes_committed: u32,
}

/// The background refresh loop.
///
/// Owns a handle to the store (the injected instance shared with the read
/// API) and an upstream client. Runs until the shutdown signal flips.
pub struct Scheduler<A> {
    store: Store,
    api: Arc<A>,
    config: RefreshConfig,
}

impl<A: StationApi> Scheduler<A> {
    pub fn new(store: Store, api: Arc<A>, config: RefreshConfig) -> Self {
        Self { store, api, config }
    }

    /// Run until `shutdown` is set to `true`.
    ///
    /// The idle wait is interrupted immediately by the signal; an
    /// in-flight region is finished (fetch and commit) before exiting, so
    /// the store is left at a region boundary.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.tick_interval);
        // A missed tick (e.g. a slow region batch) must not double-fire.
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut error_backoff: Option<Duration> = None;

        info!(
            tick_secs = self.config.tick_interval.as_secs(),
            max_age_secs = self.config.max_age.as_secs(),
            "refresh scheduler started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                changed = shutdown.changed() => {
                    // A dropped sender means nobody can ask us to stop;
                    // treat it like a stop request rather than spinning.
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            let report = self.tick(&shutdown).await;
            if report.regions_failed > 0 {
                let backoff = error_backoff
                    .map(|b| (b * 2).min(self.config.error_backoff_max))
                    .unwrap_or(self.config.error_backoff_initial);
                error_backoff = Some(backoff);
                warn!(
                    failed = report.regions_failed,
                    backoff_secs = backoff.as_secs(),
                    "tick had failed regions, backing off"
                );
                tokio::select! {
                    _ = tokio::time::sleep(backoff) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            } else if report.regions_refreshed > 0 {
                error_backoff = None;
            }
        }

        info!("refresh scheduler stopped");
    }

    /// One pass: select stale regions and refresh each. Public so tests
    /// (and a potential admin trigger) can drive single ticks.
    pub async fn tick(&self, shutdown: &watch::Receiver<bool>) -> TickReport {
        let mut report = TickReport::default();

        let stale = match self
            .store
            .stale_regions(self.config.max_age, self.config.regions_per_tick)
            .await
        {
            Ok(stale) => stale,
            Err(err) => {
                warn!(error = %err, "could not select stale regions");
                return report;
            }
        };

        if stale.is_empty() {
            debug!("no stale regions");
            return report;
        }

        for region in stale {
            if *shutdown.borrow() {
                break;
            }

            let started = Instant::now();
            match self.refresh_region(region).await {
                Ok((stations, quotes)) => {
                    report.regions_refreshed += 1;
                    report.stations_committed += stations;
                    report.quotes_committed += quotes;
                    self.log_outcome(region, true, None, started).await;
                }
                Err(err) => {
                    // The cursor is untouched: the region stays stale and
                    // is selected again next tick.
                    warn!(region = %region, error = %err, "region refresh failed");
                    report.regions_failed += 1;
                    let message = err.to_string();
                    self.log_outcome(region, false, Some(&message), started)
                        .await;
                }
            }
        }

        self.housekeeping().await;

        report
    }

    /// FETCHING and COMMITTING for one region. Returns (stations, quotes)
    /// committed.
    async fn refresh_region(&self, region: RegionKey) -> Result<(u32, u32), RefreshError> {
        let bbox = region.bbox();
        let stations = self.api.query_region(&bbox).await?;
        let fetched_at = Utc::now();

        // Region cells can be empty (sea, fields). Advancing the cursor is
        // still correct: the answer "nothing here" is fresh data.
        if stations.is_empty() {
            debug!(region = %region, "region has no stations");
            self.commit_with_retry(&RegionCommit {
                region,
                stations: Vec::new(),
                quotes: Vec::new(),
                statuses: Vec::new(),
                refreshed_at: fetched_at,
            })
            .await?;
            return Ok((0, 0));
        }

        // Which pool each charge point belongs to, for keying results.
        // Kept in station order so batches are deterministic.
        let mut owner: HashMap<ChargePointId, (PoolId, PowerType)> = HashMap::new();
        let mut charge_points: Vec<ChargePointId> = Vec::new();
        for station in &stations {
            for (cp, power_type) in station.charge_points() {
                if owner
                    .insert(cp.clone(), (station.pool_id.clone(), power_type))
                    .is_none()
                {
                    charge_points.push(cp.clone());
                }
            }
        }

        let statuses = self.fetch_statuses(&stations, &charge_points).await;
        let quotes = self.fetch_quotes(&owner, &charge_points, fetched_at).await;

        let commit = RegionCommit {
            region,
            stations,
            quotes,
            statuses,
            refreshed_at: fetched_at,
        };
        self.commit_with_retry(&commit).await?;

        debug!(
            region = %region,
            stations = commit.stations.len(),
            quotes = commit.quotes.len(),
            "region refreshed"
        );
        Ok((commit.stations.len() as u32, commit.quotes.len() as u32))
    }

    /// Batch the status query and aggregate the readings per station.
    /// Failed batches only cost their own stations' status updates.
    async fn fetch_statuses(
        &self,
        stations: &[crate::domain::Station],
        charge_points: &[ChargePointId],
    ) -> Vec<StatusRecord> {
        let api = self.api.clone();
        let outcomes = batcher::run(
            charge_points.to_vec(),
            self.config.batcher.clone(),
            move |batch: Vec<ChargePointId>| {
                let api = api.clone();
                async move { api.charge_point_status(&batch).await }
            },
        );
        futures::pin_mut!(outcomes);

        let mut readings = HashMap::new();
        while let Some(outcome) = outcomes.next().await {
            match outcome.result {
                Ok(batch_readings) => {
                    for reading in batch_readings {
                        readings.insert(reading.charge_point_id.clone(), reading);
                    }
                }
                Err(err) => {
                    warn!(batch = outcome.index, error = %err, "status batch failed");
                }
            }
        }

        let mut statuses = Vec::new();
        for station in stations {
            let station_readings: Vec<_> = station
                .charge_points()
                .filter_map(|(cp, _)| readings.get(cp))
                .collect();
            if station_readings.is_empty() {
                // No reading survived for this station; keep whatever
                // status the store already has.
                continue;
            }
            let state =
                ChargePointState::aggregate(station_readings.iter().map(|r| r.state));
            let observed_at = station_readings
                .iter()
                .map(|r| r.observed_at)
                .max()
                .unwrap_or_else(Utc::now);
            statuses.push(StatusRecord {
                pool_id: station.pool_id.clone(),
                state,
                observed_at,
            });
        }
        statuses
    }

    /// Batch price queries for every charge point under every configured
    /// tariff, and key the readings back to their stations.
    async fn fetch_quotes(
        &self,
        owner: &HashMap<ChargePointId, (PoolId, PowerType)>,
        charge_points: &[ChargePointId],
        fetched_at: chrono::DateTime<Utc>,
    ) -> Vec<PriceQuote> {
        let mut quotes: HashMap<(PoolId, PowerType, u16, TariffId), PriceQuote> = HashMap::new();

        for tariff in &self.config.tariffs {
            let requests: Vec<PriceRequest> = charge_points
                .iter()
                .map(|cp| {
                    let (_, power_type) = owner[cp];
                    PriceRequest::at_default_power(cp.clone(), power_type)
                })
                .collect();

            let api = self.api.clone();
            let tariff_for_fetch = tariff.clone();
            let outcomes = batcher::run(
                requests,
                self.config.batcher.clone(),
                move |batch: Vec<PriceRequest>| {
                    let api = api.clone();
                    let tariff = tariff_for_fetch.clone();
                    async move { api.tariff_prices(&tariff, &batch).await }
                },
            );
            futures::pin_mut!(outcomes);

            while let Some(outcome) = outcomes.next().await {
                match outcome.result {
                    Ok(readings) => {
                        for reading in readings {
                            let Some((pool_id, _)) = owner.get(&reading.charge_point_id) else {
                                warn!("price reading for unknown charge point, dropping");
                                continue;
                            };
                            let key = (
                                pool_id.clone(),
                                reading.power_type,
                                reading.power_kw,
                                tariff.clone(),
                            );
                            // A pool's charge points of one power type are
                            // priced identically; first reading wins.
                            quotes.entry(key).or_insert_with(|| PriceQuote {
                                pool_id: pool_id.clone(),
                                charge_point_id: reading.charge_point_id.clone(),
                                tariff_id: tariff.clone(),
                                power_type: reading.power_type,
                                power_kw: reading.power_kw,
                                currency: reading.currency.clone(),
                                energy_price: reading.energy_price,
                                session_fee: reading.session_fee,
                                blocking_fee: reading.blocking_fee,
                                blocking_after_mins: reading.blocking_after_mins,
                                fetched_at,
                            });
                        }
                    }
                    Err(err) => {
                        warn!(
                            batch = outcome.index,
                            tariff = %tariff,
                            error = %err,
                            "price batch failed, its stations keep their old quotes"
                        );
                    }
                }
            }
        }

        quotes.into_values().collect()
    }

    /// Commit, retrying once on a store error before giving up on the
    /// region (the tick survives either way).
    async fn commit_with_retry(&self, commit: &RegionCommit) -> Result<(), RefreshError> {
        match self.store.commit_region(commit).await {
            Ok(()) => Ok(()),
            Err(first) => {
                warn!(region = %commit.region, error = %first, "commit failed, retrying once");
                self.store.commit_region(commit).await?;
                Ok(())
            }
        }
    }

    async fn log_outcome(
        &self,
        region: RegionKey,
        success: bool,
        error: Option<&str>,
        started: Instant,
    ) {
        let duration_ms = started.elapsed().as_millis() as i64;
        if let Err(err) = self
            .store
            .log_refresh(region, success, error, duration_ms)
            .await
        {
            warn!(error = %err, "could not write update log");
        }
    }

    /// End-of-tick housekeeping. The update log is always trimmed;
    /// station pruning only runs when a horizon is configured.
    async fn housekeeping(&self) {
        const LOG_HORIZON: Duration = Duration::from_secs(7 * 24 * 60 * 60);

        let now = Utc::now();
        if let Err(err) = self
            .store
            .prune_update_log(cutoff(now, LOG_HORIZON))
            .await
        {
            warn!(error = %err, "update log prune failed");
        }

        if let Some(horizon) = self.config.prune_after {
            match self.store.prune_stations(cutoff(now, horizon)).await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "pruned stations beyond the horizon"),
                Err(err) => warn!(error = %err, "station prune failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::watch;

    use crate::dcs::MockApi;
    use crate::domain::{
        ChargePointId, ChargePointState, PoolId, PowerType, RegionKey, Station, TariffId,
    };
    use crate::store::test_store;

    use super::*;

    fn flex() -> TariffId {
        TariffId::parse("HYUNDAI_FLEX").unwrap()
    }

    /// Config with no pacing so tests run instantly.
    fn quick_config() -> RefreshConfig {
        RefreshConfig::default()
            .with_max_age(Duration::from_secs(3600))
            .with_tariffs(vec![flex()])
            .with_batcher(
                BatcherConfig::default()
                    .with_batch_size(5)
                    .with_inter_batch_delay(Duration::ZERO)
                    .with_backoff(Duration::ZERO, Duration::ZERO),
            )
    }

    fn ac_station(pool: &str, lat: f64, lng: f64) -> Station {
        Station {
            pool_id: PoolId::parse(pool).unwrap(),
            latitude: lat,
            longitude: lng,
            cpo_id: None,
            charge_point_count: 1,
            charge_points_ac: vec![ChargePointId::parse(format!("{pool}-CP")).unwrap()],
            charge_points_dc: vec![],
        }
    }

    fn idle_shutdown() -> (watch::Sender<bool>, watch::Receiver<bool>) {
        watch::channel(false)
    }

    /// Twelve charge points in one stale region with batch size five:
    /// three price calls of sizes 5, 5, 2, twelve quote rows committed,
    /// and the region cursor advanced.
    #[tokio::test]
    async fn refreshes_a_stale_region_in_paced_batches() {
        let (_dir, store) = test_store().await;
        let api = Arc::new(MockApi::new());

        let region = RegionKey::containing(52.5, 13.4);
        store.track_region(region).await.unwrap();
        // Spread twelve single-charge-point stations inside the cell.
        let bbox = region.bbox();
        for i in 0..12 {
            let lat = bbox.lat_se() + 0.01 + (i as f64) * 0.01;
            api.add_station(ac_station(&format!("P{i}"), lat, bbox.lng_nw() + 0.1))
                .await;
        }

        let scheduler = Scheduler::new(store.clone(), api.clone(), quick_config());
        let (_tx, shutdown) = idle_shutdown();
        let report = scheduler.tick(&shutdown).await;

        assert_eq!(report.regions_refreshed, 1);
        assert_eq!(report.regions_failed, 0);
        assert_eq!(report.stations_committed, 12);
        assert_eq!(report.quotes_committed, 12);

        let price_sizes: Vec<usize> = api.price_batches().await.iter().map(Vec::len).collect();
        assert_eq!(price_sizes, vec![5, 5, 2]);
        let status_sizes: Vec<usize> = api.status_batches().await.iter().map(Vec::len).collect();
        assert_eq!(status_sizes, vec![5, 5, 2]);

        let stats = store.stats(Duration::from_secs(3600)).await.unwrap();
        assert_eq!(stats.stations, 12);
        assert_eq!(stats.prices, 12);

        // The region is fresh now: the next tick has nothing to do.
        assert!(store
            .stale_regions(Duration::from_secs(3600), 10)
            .await
            .unwrap()
            .is_empty());
        let quiet = scheduler.tick(&shutdown).await;
        assert_eq!(quiet, TickReport::default());
    }

    /// A throttled batch that exhausts its retries loses only its own
    /// stations' quotes; the other batches commit, and the region cursor
    /// still advances.
    #[tokio::test]
    async fn exhausted_price_batch_is_dropped_others_commit() {
        let (_dir, store) = test_store().await;
        let api = Arc::new(MockApi::new());

        let region = RegionKey::containing(52.5, 13.4);
        store.track_region(region).await.unwrap();
        let bbox = region.bbox();
        for i in 0..12 {
            let lat = bbox.lat_se() + 0.01 + (i as f64) * 0.01;
            api.add_station(ac_station(&format!("P{i}"), lat, bbox.lng_nw() + 0.1))
                .await;
        }
        // First price call and its single retry both throttle: batch one
        // fails, batches two and three succeed.
        api.throttle_next_price_calls(2).await;

        let config = quick_config().with_batcher(
            BatcherConfig::default()
                .with_batch_size(5)
                .with_inter_batch_delay(Duration::ZERO)
                .with_max_retries(1)
                .with_backoff(Duration::ZERO, Duration::ZERO),
        );
        let scheduler = Scheduler::new(store.clone(), api.clone(), config);
        let (_tx, shutdown) = idle_shutdown();
        let report = scheduler.tick(&shutdown).await;

        assert_eq!(report.regions_refreshed, 1);
        assert_eq!(report.quotes_committed, 7);

        let stats = store.stats(Duration::from_secs(3600)).await.unwrap();
        assert_eq!(stats.stations, 12);
        assert_eq!(stats.prices, 7);

        // The failed batch's stations have no quote rows at all.
        let p0 = PoolId::parse("P0").unwrap();
        assert!(store
            .get_price(&p0, PowerType::Ac, 11, Some(&flex()))
            .await
            .unwrap()
            .is_none());
        let p11 = PoolId::parse("P11").unwrap();
        assert!(store
            .get_price(&p11, PowerType::Ac, 11, Some(&flex()))
            .await
            .unwrap()
            .is_some());

        // Partial data still counts as a refresh.
        assert!(store
            .stale_regions(Duration::from_secs(3600), 10)
            .await
            .unwrap()
            .is_empty());
    }

    /// An outright region fetch failure leaves the cursor untouched so
    /// the region is retried next tick.
    #[tokio::test]
    async fn failed_region_fetch_keeps_region_stale() {
        let (_dir, store) = test_store().await;
        let api = Arc::new(MockApi::new());

        let region = RegionKey::containing(52.5, 13.4);
        store.track_region(region).await.unwrap();
        api.fail_region_queries(true).await;

        let scheduler = Scheduler::new(store.clone(), api.clone(), quick_config());
        let (_tx, shutdown) = idle_shutdown();
        let report = scheduler.tick(&shutdown).await;

        assert_eq!(report.regions_failed, 1);
        assert_eq!(report.regions_refreshed, 0);
        assert_eq!(
            store
                .stale_regions(Duration::from_secs(3600), 10)
                .await
                .unwrap(),
            vec![region]
        );

        // Upstream recovers: the same region refreshes on the next tick.
        api.fail_region_queries(false).await;
        api.add_station(ac_station("P1", 52.51, 13.41)).await;
        let report = scheduler.tick(&shutdown).await;
        assert_eq!(report.regions_refreshed, 1);
    }

    /// An empty cell is fresh data too: the cursor advances and the
    /// region is not re-fetched until it goes stale again.
    #[tokio::test]
    async fn empty_region_advances_cursor() {
        let (_dir, store) = test_store().await;
        let api = Arc::new(MockApi::new());

        let region = RegionKey::containing(54.0, 7.5);
        store.track_region(region).await.unwrap();

        let scheduler = Scheduler::new(store.clone(), api.clone(), quick_config());
        let (_tx, shutdown) = idle_shutdown();
        let report = scheduler.tick(&shutdown).await;

        assert_eq!(report.regions_refreshed, 1);
        assert_eq!(report.stations_committed, 0);
        assert!(store
            .stale_regions(Duration::from_secs(3600), 10)
            .await
            .unwrap()
            .is_empty());
    }

    /// Per-charge-point states aggregate to one station status.
    #[tokio::test]
    async fn station_status_aggregates_best_state() {
        let (_dir, store) = test_store().await;
        let api = Arc::new(MockApi::new());

        let region = RegionKey::containing(52.5, 13.4);
        store.track_region(region).await.unwrap();

        let mut station = ac_station("P1", 52.51, 13.41);
        station
            .charge_points_dc
            .push(ChargePointId::parse("P1-DC").unwrap());
        station.charge_point_count = 2;
        api.add_station(station).await;

        api.set_state(
            ChargePointId::parse("P1-CP").unwrap(),
            ChargePointState::OutOfService,
        )
        .await;
        api.set_state(
            ChargePointId::parse("P1-DC").unwrap(),
            ChargePointState::Occupied,
        )
        .await;

        let scheduler = Scheduler::new(store.clone(), api.clone(), quick_config());
        let (_tx, shutdown) = idle_shutdown();
        scheduler.tick(&shutdown).await;

        let snapshot = store
            .read_station(&PoolId::parse("P1").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.status.unwrap().state, ChargePointState::Occupied);
    }

    /// The loop exits promptly on the shutdown signal and leaves the
    /// store usable.
    #[tokio::test]
    async fn run_stops_on_shutdown_signal() {
        let (_dir, store) = test_store().await;
        let api = Arc::new(MockApi::new());

        let config = quick_config().with_tick_interval(Duration::from_secs(3600));
        let scheduler = Scheduler::new(store.clone(), api, config);

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(scheduler.run(rx));

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("scheduler did not stop in time")
            .unwrap();

        store.ping().await.unwrap();
    }

    /// With a prune horizon configured, stations beyond it disappear on
    /// the next tick; without one (the default) they are kept forever.
    #[tokio::test]
    async fn pruning_is_opt_in() {
        let (_dir, store) = test_store().await;
        let api = Arc::new(MockApi::new());

        let ancient = chrono::Utc::now() - chrono::Duration::days(90);
        store
            .upsert_station(&ac_station("OLD", 10.0, 10.0), ancient)
            .await
            .unwrap();

        // Default config: no pruning.
        let scheduler = Scheduler::new(store.clone(), api.clone(), quick_config());
        let (_tx, shutdown) = idle_shutdown();
        scheduler.tick(&shutdown).await;
        let old = PoolId::parse("OLD").unwrap();
        assert!(store.read_station(&old).await.unwrap().is_some());

        // With a 30-day horizon the station is pruned.
        let config = quick_config().with_prune_after(Some(Duration::from_secs(30 * 24 * 3600)));
        let scheduler = Scheduler::new(store.clone(), api, config);
        scheduler.tick(&shutdown).await;
        assert!(store.read_station(&old).await.unwrap().is_none());
    }
}
