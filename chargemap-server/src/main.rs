use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use chargemap_server::cache::{CacheConfig, PriceCache};
use chargemap_server::dcs::{DcsClient, DcsConfig};
use chargemap_server::domain::{BoundingBox, TariffId};
use chargemap_server::refresh::{BatcherConfig, RefreshConfig, Scheduler};
use chargemap_server::store::{Store, StoreConfig};
use chargemap_server::web::{AppState, create_router};

/// How long the scheduler gets to finish its in-flight region on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            eprintln!("Warning: ignoring unparseable {name}={raw}");
            default
        }),
        Err(_) => default,
    }
}

/// Parse `"lat_nw,lng_nw,lat_se,lng_se"` into a bounding box.
fn parse_seed_bbox(raw: &str) -> Option<BoundingBox> {
    let parts: Vec<f64> = raw
        .split(',')
        .map(|p| p.trim().parse().ok())
        .collect::<Option<_>>()?;
    match parts.as_slice() {
        [lat_nw, lng_nw, lat_se, lng_se] => {
            BoundingBox::new(*lat_nw, *lng_nw, *lat_se, *lng_se).ok()
        }
        _ => None,
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Configuration surface: plain scalars from the environment, with the
    // defaults the upstream has been observed to tolerate.
    let db_path = env_or("CHARGEMAP_DB_PATH", "station_cache.db");
    let bind = env_or("CHARGEMAP_BIND", "127.0.0.1:5000");
    let market = env_or("CHARGEMAP_MARKET", "de");
    let tick_secs: u64 = env_parse("CHARGEMAP_TICK_SECS", 60);
    let max_age_mins: u64 = env_parse("CHARGEMAP_MAX_AGE_MINS", 24 * 60);
    let batch_size: usize = env_parse("CHARGEMAP_BATCH_SIZE", 5);
    let batch_delay_ms: u64 = env_parse("CHARGEMAP_BATCH_DELAY_MS", 3000);
    let max_retries: u32 = env_parse("CHARGEMAP_MAX_RETRIES", 3);
    let backoff_cap_secs: u64 = env_parse("CHARGEMAP_BACKOFF_CAP_SECS", 60);
    let prune_days: Option<u64> = std::env::var("CHARGEMAP_PRUNE_DAYS")
        .ok()
        .and_then(|raw| raw.parse().ok());

    let tariffs: Vec<TariffId> = env_or("CHARGEMAP_TARIFFS", "HYUNDAI_FLEX,HYUNDAI_SMART")
        .split(',')
        .filter_map(|t| TariffId::parse(t.trim()).ok())
        .collect();

    let max_age = Duration::from_secs(max_age_mins * 60);

    // The store is the one fatal dependency: without it there is nothing
    // to serve.
    let store = Store::open(&StoreConfig::new(&db_path))
        .await
        .expect("failed to open station store");

    // Optionally put an initial area under refresh on first run.
    if let Ok(raw) = std::env::var("CHARGEMAP_SEED_BBOX") {
        match parse_seed_bbox(&raw) {
            Some(bbox) => {
                let added = store
                    .track_bbox(&bbox)
                    .await
                    .expect("failed to track seed bounding box");
                println!("Tracking seed area: {added} new region cells");
            }
            None => eprintln!("Warning: ignoring unparseable CHARGEMAP_SEED_BBOX={raw}"),
        }
    }

    // Upstream client.
    let mut dcs_config = DcsConfig::new().with_market(&market);
    if let Ok(base_url) = std::env::var("DCS_BASE_URL") {
        dcs_config = dcs_config.with_base_url(base_url);
    }
    let client = DcsClient::new(dcs_config).expect("failed to create DCS client");

    // Background refresh scheduler with an explicit stop signal.
    let refresh_config = RefreshConfig::default()
        .with_tick_interval(Duration::from_secs(tick_secs))
        .with_max_age(max_age)
        .with_tariffs(tariffs)
        .with_batcher(
            BatcherConfig::default()
                .with_batch_size(batch_size)
                .with_inter_batch_delay(Duration::from_millis(batch_delay_ms))
                .with_max_retries(max_retries)
                .with_backoff(Duration::from_secs(2), Duration::from_secs(backoff_cap_secs)),
        )
        .with_prune_after(prune_days.map(|days| Duration::from_secs(days * 24 * 60 * 60)));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = Scheduler::new(store.clone(), Arc::new(client), refresh_config);
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown_rx.clone()));

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("Shutting down...");
            let _ = shutdown_tx.send(true);
        }
    });

    // Web layer: a pure consumer of the cache read API.
    let cache = PriceCache::new(store.clone(), CacheConfig { max_age });
    let state = AppState::new(cache, store.clone());
    let app = create_router(state);

    if let Ok(stats) = store.stats(max_age).await {
        println!(
            "Cache: {} stations, {} prices ({} fresh, {} stale), {} tracked regions",
            stats.stations, stats.prices, stats.fresh_stations, stats.stale_stations,
            stats.tracked_regions
        );
    }

    let addr: SocketAddr = bind.parse().expect("invalid CHARGEMAP_BIND address");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind listen address");
    println!("Charging price map listening on http://{addr}");

    let mut web_shutdown = shutdown_rx.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = web_shutdown.wait_for(|stop| *stop).await;
        })
        .await
        .expect("server error");

    // Give the scheduler its grace period to finish the in-flight region.
    // The store needs no teardown: it is consistent at every commit.
    if tokio::time::timeout(SHUTDOWN_GRACE, scheduler_handle)
        .await
        .is_err()
    {
        eprintln!("Scheduler did not stop within grace period, aborting it");
    }
}
