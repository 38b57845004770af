// SPDX-License-Identifier: Apache-2.0

//! A single named circuit: metrics, a ticket pool, and the half-open probe clock.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::limiter::Limiter;
use crate::metrics::Collector;
use crate::settings::Settings;

/// The classified outcome of one call, reported to a circuit's metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryKind {
    /// The primary command completed without error.
    Success,
    /// The primary command returned an error, or panicked.
    Failure,
    /// Admission was denied by the ticket pool.
    Rejected,
    /// The primary command did not finish within the timeout.
    Timeout,
    /// The caller's cancellation token fired first.
    Cancelled,
}

/// The classified outcome of a fallback, if one ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackKind {
    /// The fallback completed without error.
    Success,
    /// The fallback returned an error, or panicked.
    Failure,
}

/// One call's classified outcome: exactly one primary kind and, if a
/// fallback ran, at most one fallback kind.
#[derive(Debug, Clone, Copy)]
pub struct Event {
    /// How the primary command resolved.
    pub primary: PrimaryKind,
    /// How the fallback resolved, if one ran.
    pub fallback: Option<FallbackKind>,
}

/// The per-name unit of breaker state: metrics, a fixed-capacity ticket
/// pool, and a single-probe clock for the half-open state.
///
/// Created once on first reference to its name and kept for the process
/// lifetime (see [`crate::registry::Registry`]). Settings are re-read from
/// the registry on every admission decision, but the limiter's capacity is
/// fixed at construction time — a later `configure` call changing
/// `max_concurrent_calls` only takes effect for circuits created after it.
pub struct Circuit {
    name: String,
    metrics: Collector,
    limiter: Limiter,
    /// Nanoseconds since an arbitrary epoch fixed at process start;
    /// [`NEVER_TESTED`] means "never probed". Mutated only via
    /// compare-and-swap so that at most one half-open probe is admitted per
    /// `sleep_duration` across all racing callers.
    last_tested_nanos: AtomicI64,
    /// Serializes `report_event` so the seven counter updates it performs
    /// are observed as a single atomic step, and guards the
    /// closed/broken log transition.
    write_lock: Mutex<()>,
}

/// Process-start reference point so `last_tested_nanos` can be a plain
/// `AtomicI64` rather than an `Instant`, which has no fixed representation.
static EPOCH: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

fn epoch() -> Instant {
    *EPOCH.get_or_init(Instant::now)
}

fn now_nanos() -> i64 {
    epoch().elapsed().as_nanos() as i64
}

/// Sentinel `last_tested_nanos` value meaning "no probe has ever been
/// admitted", distinct from any real elapsed-nanoseconds reading so the
/// very first probe is always admitted regardless of `sleep_duration`.
const NEVER_TESTED: i64 = i64::MIN;

impl Circuit {
    /// Create a circuit whose limiter is sized from `settings`.
    pub(crate) fn new(name: String, settings: Settings) -> Self {
        debug!(name = %name, max_concurrent_calls = settings.max_concurrent_calls, "creating circuit");
        Self {
            name,
            metrics: Collector::default(),
            limiter: Limiter::new(settings.max_concurrent_calls),
            last_tested_nanos: AtomicI64::new(NEVER_TESTED),
            write_lock: Mutex::new(()),
        }
    }

    /// The circuit's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// This circuit's ticket pool.
    pub(crate) fn limiter(&self) -> &Limiter {
        &self.limiter
    }

    /// Read-only access to this circuit's metrics.
    pub fn metrics(&self) -> &Collector {
        &self.metrics
    }

    /// `true` iff the circuit is not broken, or a half-open probe is due.
    pub fn allow_request(&self, settings: Settings) -> bool {
        !self.is_broken(settings) || self.allow_single_test(settings)
    }

    /// Too many failed requests, by the crude (no floor, no smoothing)
    /// policy in the reference implementation: the raw error ratio over the
    /// rolling window, compared directly against `error_threshold`.
    fn is_broken(&self, settings: Settings) -> bool {
        let now = Instant::now();
        let requests = self.metrics.requests.sum(now);
        let errors = self.metrics.errors.sum(now);

        if errors == 0 {
            return false;
        }

        // Every error also increments `requests` (see `report_event`), so
        // `requests == 0` here would mean `errors == 0` too.
        let broken = (errors as f32 / requests as f32) >= settings.error_threshold;
        if broken {
            warn!(name = %self.name, errors, requests, "circuit is broken, rejecting requests");
        }
        broken
    }

    /// The half-open probe: admits at most one caller per `sleep_duration`.
    fn allow_single_test(&self, settings: Settings) -> bool {
        let last_tested = self.last_tested_nanos.load(Ordering::SeqCst);
        let now = now_nanos();

        let due = last_tested == NEVER_TESTED
            || (last_tested + settings.sleep_duration.as_nanos() as i64) < now;
        if !due {
            return false;
        }

        let admitted = self
            .last_tested_nanos
            .compare_exchange(last_tested, now, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if admitted {
            debug!(name = %self.name, "admitting half-open probe");
        }
        admitted
    }

    /// Record one call's outcome. Always increments `requests`; for a
    /// non-`success` primary kind, also increments `errors`, the matching
    /// primary sub-counter, and the matching fallback sub-counter if one is
    /// present. Serialized under `write_lock` so an observer never sees a
    /// partially-applied event.
    pub(crate) fn report_event(&self, event: Event) {
        let _guard = self.write_lock.lock();

        self.metrics.requests.increment();

        if event.primary == PrimaryKind::Success {
            return;
        }

        self.metrics.errors.increment();

        match event.primary {
            PrimaryKind::Rejected => self.metrics.rejects.increment(),
            PrimaryKind::Timeout => self.metrics.timeouts.increment(),
            PrimaryKind::Cancelled => self.metrics.cancelled.increment(),
            PrimaryKind::Failure | PrimaryKind::Success => {}
        }

        match event.fallback {
            Some(FallbackKind::Success) => self.metrics.fallback_success.increment(),
            Some(FallbackKind::Failure) => self.metrics.fallback_failure.increment(),
            None => {}
        }
    }
}
