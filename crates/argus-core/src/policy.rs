// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Runtime policies: reconnect backoff, subscription cadence, monitored
//! item sampling, and pipeline sizing.
//!
//! All policies are plain serde-friendly structs with validated builders
//! of defaults. The reconnect delay computation is factored so that the
//! un-jittered value is a pure function of the attempt count; jitter is
//! applied on top from a uniform ±10% band.
//!
//! # Examples
//!
//! ```
//! use argus_core::policy::ReconnectPolicy;
//! use std::time::Duration;
//!
//! let policy = ReconnectPolicy::default();
//! assert_eq!(policy.delay_for(0), Duration::from_secs(1));
//! assert_eq!(policy.delay_for(1), Duration::from_secs(2));
//! assert_eq!(policy.delay_for(10), Duration::from_secs(60)); // capped
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};

// =============================================================================
// ReconnectPolicy
// =============================================================================

/// Policy governing keepalive and reconnect behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnect attempt.
    #[serde(default = "default_initial_delay", with = "humantime_serde")]
    pub initial_delay: Duration,

    /// Cap for the computed delay.
    #[serde(default = "default_max_delay", with = "humantime_serde")]
    pub max_delay: Duration,

    /// Multiplicative growth factor per attempt.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Maximum reconnect attempts before giving up (0 = retry forever).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Whether delays grow exponentially; when `false` every attempt
    /// waits `initial_delay`.
    #[serde(default = "default_true")]
    pub exponential: bool,

    /// Keepalive probe interval.
    #[serde(default = "default_keepalive_interval", with = "humantime_serde")]
    pub keepalive_interval: Duration,

    /// Upper bound on a single keepalive probe.
    #[serde(default = "default_keepalive_timeout", with = "humantime_serde")]
    pub keepalive_timeout: Duration,
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_retries() -> u32 {
    30
}

fn default_true() -> bool {
    true
}

fn default_keepalive_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_keepalive_timeout() -> Duration {
    Duration::from_secs(15)
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            multiplier: default_multiplier(),
            max_retries: default_max_retries(),
            exponential: true,
            keepalive_interval: default_keepalive_interval(),
            keepalive_timeout: default_keepalive_timeout(),
        }
    }
}

impl ReconnectPolicy {
    /// Fraction of the computed delay used as the jitter band (±10%).
    pub const JITTER_FRACTION: f64 = 0.1;

    /// Validates the policy.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.initial_delay.is_zero() {
            return Err(ConfigError::validation(
                "initial_delay",
                "initial delay must be greater than zero",
            ));
        }
        if self.max_delay < self.initial_delay {
            return Err(ConfigError::validation(
                "max_delay",
                "max delay must be >= initial delay",
            ));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ConfigError::validation(
                "multiplier",
                format!("multiplier must be >= 1.0, got {}", self.multiplier),
            ));
        }
        if self.keepalive_interval.is_zero() {
            return Err(ConfigError::validation(
                "keepalive_interval",
                "keepalive interval must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Computes the un-jittered delay for the given attempt count.
    ///
    /// `initial_delay * multiplier^attempt`, capped at `max_delay`.
    /// Deterministic: the same attempt always yields the same delay.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if !self.exponential {
            return self.initial_delay.min(self.max_delay);
        }
        let factor = self.multiplier.powi(attempt.min(64) as i32);
        let raw = self.initial_delay.as_secs_f64() * factor;
        if !raw.is_finite() || raw >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(raw)
        }
    }

    /// Applies a jitter factor in `[-1, 1]` to a computed delay.
    ///
    /// The factor scales the ±10% band, so `0.0` returns the delay
    /// unchanged and `±1.0` the band edges. Split out from
    /// [`jittered_delay_for`](Self::jittered_delay_for) so tests can pin
    /// the factor.
    pub fn apply_jitter(&self, delay: Duration, factor: f64) -> Duration {
        let clamped = factor.clamp(-1.0, 1.0);
        delay.mul_f64(1.0 + Self::JITTER_FRACTION * clamped)
    }

    /// Computes the delay for an attempt with random ±10% jitter.
    pub fn jittered_delay_for(&self, attempt: u32) -> Duration {
        use rand::Rng;
        let factor = rand::thread_rng().gen_range(-1.0..=1.0);
        self.apply_jitter(self.delay_for(attempt), factor)
    }

    /// Returns `true` if another attempt is allowed after `attempt`
    /// failures (0-based).
    #[inline]
    pub fn allows_attempt(&self, attempt: u32) -> bool {
        self.max_retries == 0 || attempt < self.max_retries
    }
}

// =============================================================================
// SubscriptionConfig
// =============================================================================

/// Server-side subscription parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionConfig {
    /// Publishing interval requested from the server.
    #[serde(default = "default_publishing_interval", with = "humantime_serde")]
    pub publishing_interval: Duration,

    /// Number of publishing intervals without activity before the server
    /// deletes the subscription.
    #[serde(default = "default_lifetime_count")]
    pub lifetime_count: u32,

    /// Maximum publishing intervals between server keep-alive messages.
    #[serde(default = "default_max_keepalive_count")]
    pub max_keepalive_count: u32,

    /// Subscription priority on the server (0-255).
    #[serde(default)]
    pub priority: u8,
}

fn default_publishing_interval() -> Duration {
    Duration::from_millis(1000)
}

fn default_lifetime_count() -> u32 {
    60
}

fn default_max_keepalive_count() -> u32 {
    10
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            publishing_interval: default_publishing_interval(),
            lifetime_count: default_lifetime_count(),
            max_keepalive_count: default_max_keepalive_count(),
            priority: 0,
        }
    }
}

impl SubscriptionConfig {
    /// Validates the configuration.
    ///
    /// The lifetime count must be at least three times the keep-alive
    /// count, per the protocol rules.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.publishing_interval.is_zero() {
            return Err(ConfigError::validation(
                "publishing_interval",
                "publishing interval must be greater than zero",
            ));
        }
        if self.max_keepalive_count == 0 {
            return Err(ConfigError::validation(
                "max_keepalive_count",
                "keep-alive count must be greater than zero",
            ));
        }
        if self.lifetime_count < self.max_keepalive_count * 3 {
            return Err(ConfigError::validation(
                "lifetime_count",
                format!(
                    "lifetime count must be >= 3x keep-alive count ({} < {})",
                    self.lifetime_count,
                    self.max_keepalive_count * 3
                ),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// MonitoredItemConfig
// =============================================================================

/// Per-item monitoring parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoredItemConfig {
    /// Requested sampling interval; the runtime clamps it to 100-1000ms.
    #[serde(default = "default_sampling_interval", with = "humantime_serde")]
    pub sampling_interval: Duration,

    /// Server-side queue depth for buffered samples.
    #[serde(default = "default_queue_size")]
    pub queue_size: u32,

    /// Whether the server discards the oldest sample on queue overflow.
    #[serde(default = "default_true")]
    pub discard_oldest: bool,
}

fn default_sampling_interval() -> Duration {
    Duration::from_millis(250)
}

fn default_queue_size() -> u32 {
    1
}

impl Default for MonitoredItemConfig {
    fn default() -> Self {
        Self {
            sampling_interval: default_sampling_interval(),
            queue_size: default_queue_size(),
            discard_oldest: true,
        }
    }
}

impl MonitoredItemConfig {
    /// Lower clamp for the sampling interval.
    pub const MIN_SAMPLING: Duration = Duration::from_millis(100);

    /// Upper clamp for the sampling interval.
    pub const MAX_SAMPLING: Duration = Duration::from_millis(1000);

    /// Returns the sampling interval clamped into the supported range.
    pub fn clamped_sampling_interval(&self) -> Duration {
        self.sampling_interval
            .clamp(Self::MIN_SAMPLING, Self::MAX_SAMPLING)
    }

    /// Returns a copy of this configuration with the sampling interval
    /// clamped into the supported range.
    ///
    /// Monitored items are always created from the clamped form.
    pub fn clamped(&self) -> Self {
        Self {
            sampling_interval: self.clamped_sampling_interval(),
            ..self.clone()
        }
    }
}

// =============================================================================
// PipelineConfig
// =============================================================================

/// Worker pool and queue sizing for the request pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Number of pipeline workers, clamped to 1-20.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Bound of the request queue; a full queue rejects with `Busy`.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Default timeout for synchronous waits and wire operations.
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,
}

fn default_workers() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    256
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl PipelineConfig {
    /// Minimum worker count.
    pub const MIN_WORKERS: usize = 1;

    /// Maximum worker count.
    pub const MAX_WORKERS: usize = 20;

    /// Returns the worker count clamped into the supported range.
    #[inline]
    pub fn clamped_workers(&self) -> usize {
        self.workers.clamp(Self::MIN_WORKERS, Self::MAX_WORKERS)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::validation(
                "queue_capacity",
                "queue capacity must be greater than zero",
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::validation(
                "request_timeout",
                "request timeout must be greater than zero",
            ));
        }
        Ok(())
    }
}

// =============================================================================
// EngineConfig
// =============================================================================

/// Subscription engine cadences and executor pool sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Period of the cooperative session-iterate driver.
    #[serde(default = "default_iterate_interval", with = "humantime_serde")]
    pub iterate_interval: Duration,

    /// Polling-mode batch read cadence.
    #[serde(default = "default_polling_interval", with = "humantime_serde")]
    pub polling_interval: Duration,

    /// Debounce before rebuilding a server-deleted subscription.
    #[serde(default = "default_rebuild_debounce", with = "humantime_serde")]
    pub rebuild_debounce: Duration,

    /// Ingest executor count; 0 selects `max(2, cores - 2)`.
    #[serde(default)]
    pub executors: usize,
}

fn default_iterate_interval() -> Duration {
    Duration::from_millis(200)
}

fn default_polling_interval() -> Duration {
    Duration::from_millis(1000)
}

fn default_rebuild_debounce() -> Duration {
    Duration::from_secs(2)
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            iterate_interval: default_iterate_interval(),
            polling_interval: default_polling_interval(),
            rebuild_debounce: default_rebuild_debounce(),
            executors: 0,
        }
    }
}

impl EngineConfig {
    /// Resolves the executor pool size.
    ///
    /// A zero configuration selects `max(2, available cores - 2)` so the
    /// ingest pool never starves the pipeline workers.
    pub fn resolved_executors(&self) -> usize {
        if self.executors > 0 {
            return self.executors;
        }
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        cores.saturating_sub(2).max(2)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.iterate_interval.is_zero() {
            return Err(ConfigError::validation(
                "iterate_interval",
                "iterate interval must be greater than zero",
            ));
        }
        if self.polling_interval.is_zero() {
            return Err(ConfigError::validation(
                "polling_interval",
                "polling interval must be greater than zero",
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
