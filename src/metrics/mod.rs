// SPDX-License-Identifier: Apache-2.0

//! Per-circuit bundle of named rolling counters.

mod rolling;

pub use rolling::RollingCounter;

use crate::settings::{SLOTS, SLOT_DURATION};

/// The seven rolling counters tracked per circuit.
///
/// Pure aggregation: this type holds no state-machine logic of its own, it
/// only hands out counters for [`crate::circuit::Circuit`] to read and
/// increment.
pub struct Collector {
    /// Total calls admitted to the circuit (success + all error kinds).
    pub requests: RollingCounter,
    /// Calls that did not end in `success`.
    pub errors: RollingCounter,
    /// Calls denied admission by the ticket pool.
    pub rejects: RollingCounter,
    /// Calls that exceeded the configured timeout.
    pub timeouts: RollingCounter,
    /// Calls cut short by cancellation.
    pub cancelled: RollingCounter,
    /// Fallbacks that completed without error.
    pub fallback_success: RollingCounter,
    /// Fallbacks that returned an error or panicked.
    pub fallback_failure: RollingCounter,
}

impl Collector {
    fn counter() -> RollingCounter {
        RollingCounter::new(SLOTS, SLOT_DURATION)
    }
}

impl Collector {
    /// Reinitialize all seven counters, discarding accumulated history.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl Default for Collector {
    fn default() -> Self {
        Self {
            requests: Self::counter(),
            errors: Self::counter(),
            rejects: Self::counter(),
            timeouts: Self::counter(),
            cancelled: Self::counter(),
            fallback_success: Self::counter(),
            fallback_failure: Self::counter(),
        }
    }
}
