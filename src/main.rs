use chrono::{Local, Timelike};
use safezone_monitor::config::AppConfig;
use safezone_monitor::db::{self, PgPositionSource, PgZoneStore};
use safezone_monitor::feed::{FeedMode, LocationFeed};
use safezone_monitor::geofence;
use safezone_monitor::kafka;
use safezone_monitor::models::TimeMode;
use safezone_monitor::processor::MembershipMonitor;
use safezone_monitor::repository::{builtin_zones, ZoneRepository};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load config
    let config = AppConfig::load()?;

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(&config.log_level)
        .init();

    info!("Starting Safezone Monitor...");

    // Init DB
    let pool = db::init_pool(&config.database_url).await?;
    db::ensure_schema(&pool).await?;
    info!("Connected to database");

    let repository = ZoneRepository::new(PgZoneStore::new(pool.clone()))
        .with_point_count(config.zone_polygon_points);
    let initial_zones = match repository.load().await {
        Ok(zones) => zones,
        Err(e) => {
            error!("Initial zone load failed, using built-in zones: {}", e);
            builtin_zones()
        }
    };
    let stats = geofence::zone_stats(&initial_zones, TimeMode::All);
    info!(
        "Loaded {} zone(s): {} high, {} moderate, {} low",
        stats.total, stats.high, stats.moderate, stats.low
    );
    let zones = Arc::new(RwLock::new(initial_zones));

    let shutdown = CancellationToken::new();
    let source = Arc::new(PgPositionSource::new(pool.clone()));
    let mut feed = match config.feed_mode() {
        FeedMode::Poll { interval } => {
            info!("Location feed in polling mode every {:?}", interval);
            LocationFeed::polling(source, interval)
        }
        FeedMode::Push => {
            info!("Location feed in push mode");
            let changes = kafka::subscribe_changes(&config, shutdown.child_token())?;
            LocationFeed::subscribed(Some(source), changes)
        }
    };
    feed.start()?;

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            shutdown.cancel();
        });
    }

    let mut monitor = MembershipMonitor::new();
    let mut zone_ticker = tokio::time::interval(config.zone_refresh_interval());
    let mut evaluation_ticker = tokio::time::interval(config.evaluation_interval());
    // The initial load above already covered the first refresh.
    zone_ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Shutdown requested");
                break;
            }
            _ = zone_ticker.tick() => {
                match repository.load().await {
                    Ok(fresh) => *zones.write().await = fresh,
                    Err(e) => warn!("Zone refresh failed, keeping previous set: {}", e),
                }
            }
            _ = evaluation_ticker.tick() => {
                let positions = feed.snapshot().await;
                let zones = zones.read().await;
                let (_, transitions) = monitor.tick(&zones, &positions, Local::now().hour());
                if !transitions.is_empty() {
                    info!("{} user status change(s)", transitions.len());
                }
            }
        }
    }

    feed.stop().await;
    shutdown.cancel();
    info!("Safezone Monitor stopped");

    Ok(())
}
