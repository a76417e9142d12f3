//! Background Tasks Module
//!
//! Contains the tasks that run alongside a cache instance.
//!
//! # Tasks
//! - Monitor: samples hit rates and retunes size bound and expiration
//! - Expiry sweeper: removes expired items at a fixed interval

mod monitor;
mod sweeper;

pub use monitor::{
    plan_adjustment, Adjustment, Monitor, MonitorStats, Sample, HISTORY_CAPACITY,
    HIT_RATE_MARGIN, MIN_SAMPLES,
};
pub use sweeper::spawn_expiry_sweeper;

pub(crate) use monitor::MonitorSlot;
