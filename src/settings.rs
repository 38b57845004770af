// SPDX-License-Identifier: Apache-2.0

//! Per-circuit configuration and its documented defaults.

use std::time::Duration;

/// Default timeout applied to the primary command of a call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);
/// Default size of a circuit's ticket pool.
pub const DEFAULT_MAX_CONCURRENT_CALLS: u32 = 1000;
/// Default fraction of failed requests (over the rolling window) that trips a circuit.
pub const DEFAULT_ERROR_THRESHOLD: f32 = 0.05;
/// Default cooldown between half-open probes once a circuit has tripped.
pub const DEFAULT_SLEEP_DURATION: Duration = Duration::from_secs(1);

/// Number of buckets in a circuit's rolling window counters.
pub const SLOTS: usize = 10;
/// Width of a single rolling-window bucket.
pub const SLOT_DURATION: Duration = Duration::from_secs(1);

/// Per-circuit settings.
///
/// A zero-valued field (`Duration::ZERO`, `0`, `0.0`) is treated as "unset"
/// and replaced by its default in [`Settings::normalize`]. This mirrors the
/// reference implementation's per-field, not whole-struct, normalization:
/// a caller may override just `timeout` and leave the rest defaulted.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Settings {
    /// How long the primary command is allowed to run before the call is
    /// classified as a timeout.
    #[serde(with = "duration_secs_f64")]
    pub timeout: Duration,
    /// Size of the circuit's ticket pool; bounds calls admitted concurrently.
    pub max_concurrent_calls: u32,
    /// Fraction of requests, within the rolling window, that must be errors
    /// before the circuit is considered broken.
    pub error_threshold: f32,
    /// Minimum interval between half-open probes once broken.
    #[serde(with = "duration_secs_f64")]
    pub sleep_duration: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_concurrent_calls: DEFAULT_MAX_CONCURRENT_CALLS,
            error_threshold: DEFAULT_ERROR_THRESHOLD,
            sleep_duration: DEFAULT_SLEEP_DURATION,
        }
    }
}

impl Settings {
    /// Replace every zero/unset field with its documented default, returning
    /// the normalized settings. Each field is normalized independently.
    #[must_use]
    pub fn normalize(mut self) -> Self {
        if self.timeout.is_zero() {
            self.timeout = DEFAULT_TIMEOUT;
        }
        if self.max_concurrent_calls == 0 {
            self.max_concurrent_calls = DEFAULT_MAX_CONCURRENT_CALLS;
        }
        if self.error_threshold == 0.0 {
            self.error_threshold = DEFAULT_ERROR_THRESHOLD;
        }
        if self.sleep_duration.is_zero() {
            self.sleep_duration = DEFAULT_SLEEP_DURATION;
        }
        self
    }
}

mod duration_secs_f64 {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}
