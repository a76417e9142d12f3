//! Avatar Cache - demo driver
//!
//! Runs a cache with its monitor and expiry sweeper under a synthetic avatar
//! workload, then prints a JSON report on shutdown.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tokio::signal;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use avatar_cache::cache::{CacheOptions, CacheStats};
use avatar_cache::tasks::MonitorStats;
use avatar_cache::{spawn_expiry_sweeper, Cache, CacheKey, Config};

/// Placeholder style catalogue: themes available per style.
const STYLE_THEMES: [usize; 4] = [3, 5, 2, 4];

/// Interval between periodic statistics lines.
const STATS_LOG_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct Report {
    size: usize,
    memory_bytes: usize,
    cache: CacheStats,
    hit_rate: f64,
    monitor: MonitorStats,
    options: CacheOptions,
}

/// Main entry point for the avatar cache demo.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the cache and start its monitor
/// 4. Start background expiry sweeper
/// 5. Drive the synthetic workload until SIGINT/SIGTERM
/// 6. Stop background tasks and print the final report
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "avatar_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting avatar cache");

    let config = Config::from_env()?;
    let options = config.cache_options()?;
    info!(
        "Configuration loaded: max_size={}, expiration={}s, policy={}, compression={}, monitor={}",
        options.max_size,
        options.expiration.as_secs(),
        options.eviction_policy,
        options.compression.enabled,
        options.monitoring.enabled
    );

    let cache = Cache::new(options)?;
    let monitor = cache.spawn_monitor().await;

    let sweeper = if config.sweep_interval_secs > 0 {
        Some(spawn_expiry_sweeper(cache.clone(), config.sweep_interval()))
    } else {
        None
    };

    tokio::select! {
        _ = run_workload(&cache, &config) => {}
        _ = shutdown_signal() => {}
    }

    monitor.stop().await;
    if let Some(sweeper) = sweeper {
        sweeper.abort();
        warn!("Expiry sweeper aborted");
    }

    let cache_stats = cache.stats().await;
    let report = Report {
        size: cache.size().await,
        memory_bytes: cache.memory_usage().await,
        hit_rate: cache_stats.hit_rate(),
        cache: cache_stats,
        monitor: monitor.stats().await,
        options: cache.options().await,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    info!("Shutdown complete");
    Ok(())
}

// == Workload ==
/// Requests avatars forever, rendering and storing each miss.
///
/// Three requests in four come from a hot fifth of the key space.
async fn run_workload(cache: &Cache, config: &Config) {
    let keys = config.workload_keys.max(1) as u64;
    let hot = (keys / 5).max(1);
    let mut rng = StdRng::seed_from_u64(0x9E37_79B9_7F4A_7C15);

    let mut tick = tokio::time::interval(config.workload_tick().max(Duration::from_millis(1)));
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut report_tick = tokio::time::interval(STATS_LOG_INTERVAL);
    report_tick.tick().await;

    let mut requests: u64 = 0;
    loop {
        tokio::select! {
            _ = tick.tick() => {
                let user = if rng.gen_ratio(1, 4) {
                    rng.gen_range(0..keys)
                } else {
                    rng.gen_range(0..hot)
                };
                request_avatar(cache, user).await;
                requests += 1;
            }
            _ = report_tick.tick() => {
                let stats = cache.stats().await;
                let size = cache.size().await;
                info!(
                    requests,
                    size,
                    hits = stats.hits,
                    misses = stats.misses,
                    evictions = stats.evictions,
                    "Cache hit rate {:.2}",
                    stats.hit_rate()
                );
            }
        }
    }
}

async fn request_avatar(cache: &Cache, user: u64) {
    let id = format!("user-{}", user);
    let hash = format!("{:020}", user.wrapping_mul(0x2545_F491_4F6C_DD1D));
    let (style, theme) = cache.derive_indices(&hash, STYLE_THEMES.len(), |s| STYLE_THEMES[s]);

    let key = CacheKey::new(id, user % 3 == 0, theme as i32, style as i32);
    if cache.get(&key).await.is_some() {
        return;
    }

    debug!(key = %key, "Rendering avatar");
    cache.set(key, render_avatar(&hash, style, theme)).await;
}

/// Deterministic placeholder markup, large enough to be worth compressing.
fn render_avatar(hash: &str, style: usize, theme: usize) -> String {
    let mut svg = String::from("<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"0 0 231 231\">\n");
    svg.push_str(&format!("  <!-- style {} theme {} -->\n", style, theme));
    for (i, d) in hash.bytes().enumerate() {
        svg.push_str(&format!(
            "  <rect x=\"{}\" y=\"{}\" width=\"11\" height=\"11\" fill=\"#{:02x}{:02x}{:02x}\"/>\n",
            (i % 5) * 46,
            (i / 5) * 46,
            d,
            style * 40,
            theme * 50
        ));
    }
    svg.push_str("</svg>\n");
    svg
}

// == Shutdown ==
/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
