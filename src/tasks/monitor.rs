//! Cache Monitor
//!
//! Background control loop that samples hit rates and retunes the cache's
//! size bound and expiration toward a target hit rate.

use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::cache::{Cache, CacheOptions};

/// Samples kept in the history ring buffer.
pub const HISTORY_CAPACITY: usize = 100;

/// Samples required before the first adjustment.
pub const MIN_SAMPLES: usize = 5;

/// How far above target the mean hit rate must be before shrinking.
pub const HIT_RATE_MARGIN: f64 = 0.1;

// == Sample ==
/// One observation of the cache.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    /// Bytes held by stored payloads
    pub memory_bytes: usize,
    pub timestamp: DateTime<Utc>,
}

/// Summary of what the monitor has seen and done.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MonitorStats {
    pub latest: Option<Sample>,
    pub samples: usize,
    pub adjustments: u64,
    pub last_adjusted: Option<DateTime<Utc>>,
}

/// New size bound and expiration chosen by an adjust tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adjustment {
    pub max_size: usize,
    pub expiration: Duration,
}

#[derive(Debug, Default)]
struct MonitorState {
    history: VecDeque<Sample>,
    adjustments: u64,
    last_adjusted: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct Running {
    stop_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

#[derive(Debug)]
pub(crate) struct MonitorInner {
    cache: Cache,
    state: Arc<RwLock<MonitorState>>,
    running: Mutex<Option<Running>>,
}

/// Where a cache remembers its monitor without keeping it alive.
pub(crate) type MonitorSlot = std::sync::Mutex<Weak<MonitorInner>>;

// == Monitor ==
/// Self-tuning controller for one cache.
///
/// Obtained through [`Cache::monitor`] or [`Cache::spawn_monitor`]; every
/// handle for a cache refers to the same controller, so at most one control
/// loop runs per cache. Stopped until [`start`](Self::start); dropping the
/// last handle also ends the background task.
#[derive(Debug, Clone)]
pub struct Monitor {
    inner: Arc<MonitorInner>,
}

impl Monitor {
    /// Returns the cache's monitor, creating it on first use.
    pub(crate) fn attach(cache: &Cache, slot: &MonitorSlot) -> Self {
        let mut slot = slot.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(inner) = slot.upgrade() {
            return Self { inner };
        }

        let inner = Arc::new(MonitorInner {
            cache: cache.clone(),
            state: Arc::new(RwLock::new(MonitorState::default())),
            running: Mutex::new(None),
        });
        *slot = Arc::downgrade(&inner);
        Self { inner }
    }

    // == Start ==
    /// Spawns the control loop.
    ///
    /// Returns false without doing anything if the loop is already running,
    /// monitoring is disabled in the cache options, or an interval cannot be
    /// scheduled. Intervals are read once here; tuning parameters are
    /// re-read on every adjust tick.
    pub async fn start(&self) -> bool {
        let mut running = self.inner.running.lock().await;
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            return false;
        }

        let options = self.inner.cache.options().await.monitoring;
        if !options.enabled {
            debug!("Monitoring disabled, monitor not started");
            return false;
        }
        if options.sample_interval.is_zero() || options.adjust_interval.is_zero() {
            warn!("Monitor intervals must be non-zero, monitor not started");
            return false;
        }

        let now = Instant::now();
        let (Some(first_sample), Some(first_adjust)) = (
            now.checked_add(options.sample_interval),
            now.checked_add(options.adjust_interval),
        ) else {
            warn!(
                "Monitor intervals {:?}/{:?} are out of range, monitor not started",
                options.sample_interval, options.adjust_interval
            );
            return false;
        };

        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(run(
            self.inner.cache.clone(),
            Arc::clone(&self.inner.state),
            (first_sample, options.sample_interval),
            (first_adjust, options.adjust_interval),
            stop_rx,
        ));
        *running = Some(Running { stop_tx, handle });

        info!(
            "Cache monitor started: sample every {:?}, adjust every {:?}",
            options.sample_interval, options.adjust_interval
        );
        true
    }

    // == Stop ==
    /// Signals the loop and waits for it to finish.
    ///
    /// Work already in progress completes, but no tick runs after this
    /// returns. Returns false if the monitor was not running.
    pub async fn stop(&self) -> bool {
        let Some(running) = self.inner.running.lock().await.take() else {
            return false;
        };

        // The loop may already be gone; a closed channel is fine
        let _ = running.stop_tx.send(());
        if let Err(e) = running.handle.await {
            warn!("Cache monitor task ended abnormally: {}", e);
        }

        info!("Cache monitor stopped");
        true
    }

    /// Whether the control loop is currently alive.
    pub async fn is_running(&self) -> bool {
        self.inner
            .running
            .lock()
            .await
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    // == Introspection ==
    /// Latest sample, sample count and adjustment history.
    pub async fn stats(&self) -> MonitorStats {
        let state = self.inner.state.read().await;
        MonitorStats {
            latest: state.history.back().cloned(),
            samples: state.history.len(),
            adjustments: state.adjustments,
            last_adjusted: state.last_adjusted,
        }
    }

    /// Recorded samples, oldest first.
    pub async fn history(&self) -> Vec<Sample> {
        self.inner.state.read().await.history.iter().cloned().collect()
    }

    // == Manual Ticks ==
    /// Records one sample immediately, as a sample tick would.
    pub async fn collect_sample(&self) -> Sample {
        collect_sample(&self.inner.cache, &self.inner.state).await
    }

    /// Runs one adjust tick immediately. Returns the applied change, if any.
    pub async fn adjust(&self) -> Option<Adjustment> {
        adjust(&self.inner.cache, &self.inner.state).await
    }
}

// == Control Loop ==
async fn run(
    cache: Cache,
    state: Arc<RwLock<MonitorState>>,
    (first_sample, sample_every): (Instant, Duration),
    (first_adjust, adjust_every): (Instant, Duration),
    mut stop_rx: oneshot::Receiver<()>,
) {
    let mut sample_tick = interval_at(first_sample, sample_every);
    let mut adjust_tick = interval_at(first_adjust, adjust_every);
    sample_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    adjust_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            // Stop wins over any pending tick; a dropped sender stops too
            _ = &mut stop_rx => break,
            _ = sample_tick.tick() => {
                collect_sample(&cache, &state).await;
            }
            _ = adjust_tick.tick() => {
                adjust(&cache, &state).await;
            }
        }
    }

    debug!("Cache monitor loop exited");
}

async fn collect_sample(cache: &Cache, state: &RwLock<MonitorState>) -> Sample {
    let stats = cache.stats().await;
    let memory_bytes = cache.memory_usage().await;

    let sample = Sample {
        size: stats.total_entries,
        hits: stats.hits,
        misses: stats.misses,
        hit_rate: stats.hit_rate(),
        memory_bytes,
        timestamp: Utc::now(),
    };

    let mut state = state.write().await;
    state.history.push_back(sample.clone());
    while state.history.len() > HISTORY_CAPACITY {
        state.history.pop_front();
    }

    debug!(
        size = sample.size,
        hit_rate = sample.hit_rate,
        memory_bytes = sample.memory_bytes,
        "Cache sample recorded"
    );
    sample
}

async fn adjust(cache: &Cache, state: &RwLock<MonitorState>) -> Option<Adjustment> {
    let (mean_hit_rate, occupancy) = {
        let state = state.read().await;
        if state.history.len() < MIN_SAMPLES {
            debug!(
                samples = state.history.len(),
                "Not enough samples to adjust cache"
            );
            return None;
        }
        let mean = state.history.iter().map(|s| s.hit_rate).sum::<f64>()
            / state.history.len() as f64;
        (mean, state.history.back().map_or(0, |s| s.size))
    };

    let options = cache.options().await;
    let adjustment = plan_adjustment(mean_hit_rate, occupancy, &options)?;

    info!(
        "Retuning cache: mean hit rate {:.3}, size {} -> {}, expiration {:?} -> {:?}",
        mean_hit_rate,
        options.max_size,
        adjustment.max_size,
        options.expiration,
        adjustment.expiration
    );

    // Only the two tuned fields are written back
    cache
        .retune(adjustment.max_size, adjustment.expiration)
        .await;

    let mut state = state.write().await;
    state.adjustments += 1;
    state.last_adjusted = Some(Utc::now());
    Some(adjustment)
}

// == Planning ==
/// Decides the next size bound and expiration from a mean hit rate.
///
/// Below target the cache grows (rounded up) and items live longer. Above
/// target plus [`HIT_RATE_MARGIN`], with more than `min_size` items in use,
/// it shrinks (rounded down) and items expire sooner. Sizes are clamped to
/// the monitor's `[min_size, max_size]`; an unbounded cache stays unbounded
/// and a zero expiration stays zero. Returns None when nothing would change.
pub fn plan_adjustment(
    mean_hit_rate: f64,
    occupancy: usize,
    options: &CacheOptions,
) -> Option<Adjustment> {
    let m = &options.monitoring;
    let (lower, upper) = (m.min_size, m.max_size.max(m.min_size));
    let size = options.max_size;
    let expiration = options.expiration;

    let (max_size, expiration) = if mean_hit_rate < m.target_hit_rate {
        let grown = (size as f64 * m.growth_factor).ceil() as usize;
        (
            bounded(size, grown, lower, upper),
            lengthen(expiration, m.expiration_factor),
        )
    } else if mean_hit_rate > m.target_hit_rate + HIT_RATE_MARGIN && occupancy > m.min_size {
        let shrunk = (size as f64 * m.shrink_factor).floor() as usize;
        (
            bounded(size, shrunk, lower, upper),
            shorten(expiration, m.expiration_factor),
        )
    } else {
        return None;
    };

    if max_size == options.max_size && expiration == options.expiration {
        return None;
    }
    Some(Adjustment {
        max_size,
        expiration,
    })
}

fn bounded(current: usize, proposed: usize, lower: usize, upper: usize) -> usize {
    if current == 0 {
        0
    } else {
        proposed.clamp(lower, upper)
    }
}

fn lengthen(expiration: Duration, factor: f64) -> Duration {
    rescale(expiration, expiration.as_secs_f64() * factor)
}

fn shorten(expiration: Duration, factor: f64) -> Duration {
    rescale(expiration, expiration.as_secs_f64() / factor)
}

fn rescale(expiration: Duration, secs: f64) -> Duration {
    if expiration.is_zero() {
        return expiration;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(expiration)
}
