//! # Process floor configuration.
//!
//! Provides [`FloorConfig`], centralized settings for a [`ProcessFloor`](crate::ProcessFloor).
//!
//! ## Sentinel values
//! - `asset_timeout = 0s` → parked jobs wait forever unless the model sets a timeout
//! - `max_escalation_depth = 0` → handler chains are not bounded
//! - `monitor_interval` is clamped to at least 1ms

use std::time::Duration;

/// Configuration for the process floor.
///
/// ## Field semantics
/// - `grace`: maximum wait for in-flight processes on shutdown
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
/// - `asset_timeout`: default readiness timeout for parked jobs (`0s` = none)
/// - `monitor_interval`: period of the readiness-timeout ticker
/// - `max_escalation_depth`: nested handler limit per thread (`0` = unbounded)
///
/// All fields are public; prefer the helper accessors over raw sentinel checks.
#[derive(Clone, Debug)]
pub struct FloorConfig {
    /// Maximum time [`ProcessFloor::shutdown`](crate::ProcessFloor::shutdown)
    /// waits for in-flight processes before returning `GraceExceeded`.
    pub grace: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow listeners that lag behind more than `bus_capacity` messages skip
    /// older items.
    pub bus_capacity: usize,

    /// Default timeout for a job parked on a readiness monitor.
    ///
    /// Applies to resource activation waits that carry no per-resource timeout.
    /// `Duration::ZERO` disables it.
    pub asset_timeout: Duration,

    /// How often the floor's ticker checks readiness monitors for timeouts.
    pub monitor_interval: Duration,

    /// Maximum number of nested escalation handlers on one thread.
    ///
    /// An escalation raised beyond this depth fails the process directly.
    pub max_escalation_depth: usize,
}

impl FloorConfig {
    /// Returns the default asset timeout as an `Option`.
    #[inline]
    pub fn default_asset_timeout(&self) -> Option<Duration> {
        if self.asset_timeout == Duration::ZERO {
            None
        } else {
            Some(self.asset_timeout)
        }
    }

    /// Returns the escalation depth limit as an `Option`.
    #[inline]
    pub fn escalation_depth_limit(&self) -> Option<usize> {
        if self.max_escalation_depth == 0 {
            None
        } else {
            Some(self.max_escalation_depth)
        }
    }

    /// Returns the ticker period clamped to a minimum of 1ms.
    #[inline]
    pub fn monitor_interval_clamped(&self) -> Duration {
        self.monitor_interval.max(Duration::from_millis(1))
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for FloorConfig {
    /// Default configuration:
    ///
    /// - `grace = 60s`
    /// - `bus_capacity = 1024`
    /// - `asset_timeout = 0s` (none)
    /// - `monitor_interval = 50ms`
    /// - `max_escalation_depth = 16`
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(60),
            bus_capacity: 1024,
            asset_timeout: Duration::ZERO,
            monitor_interval: Duration::from_millis(50),
            max_escalation_depth: 16,
        }
    }
}
