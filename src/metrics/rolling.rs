// SPDX-License-Identifier: Apache-2.0

//! Fixed-length ring of time buckets answering `sum(now)` over a rolling window.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

#[derive(Clone, Copy)]
struct Bucket {
    start: Instant,
    value: i64,
}

struct Ring {
    buckets: Vec<Option<Bucket>>,
    position: usize,
    period: Duration,
}

impl Ring {
    fn window(&self) -> Duration {
        self.period * self.buckets.len() as u32
    }

    /// Returns the current bucket, rotating the ring by at most one position
    /// if the bucket at `position` has gone stale relative to `now`.
    fn current_bucket_mut(&mut self, now: Instant) -> &mut Bucket {
        let stale = match &self.buckets[self.position] {
            None => true,
            Some(b) if b.start + self.period < now => {
                self.position = (self.position + 1) % self.buckets.len();
                true
            }
            Some(_) => false,
        };
        if stale {
            self.buckets[self.position] = Some(Bucket {
                start: now,
                value: 0,
            });
        }
        self.buckets[self.position]
            .as_mut()
            .expect("just installed")
    }
}

/// A time-bucketed monotonically-increasing counter.
///
/// Values are organized into `slots` buckets of `period` width; `sum(now)`
/// aggregates whichever buckets are still live within the trailing
/// `slots * period` window. The ring advances lazily: a quiescent period
/// followed by a single access retires only the bucket being written to,
/// not every slot that went stale in between — `sum` filters the rest out
/// by their `start` timestamp rather than relying on eager retirement.
pub struct RollingCounter {
    ring: Mutex<Ring>,
}

impl RollingCounter {
    /// Create a counter with `slots` buckets, each spanning `period`.
    pub fn new(slots: usize, period: Duration) -> Self {
        Self {
            ring: Mutex::new(Ring {
                buckets: vec![None; slots],
                position: 0,
                period,
            }),
        }
    }

    /// Add 1 to the current bucket.
    pub fn increment(&self) {
        self.add(1);
    }

    /// Add `value` to the current bucket.
    pub fn add(&self, value: i64) {
        let mut ring = self.ring.lock();
        let now = Instant::now();
        ring.current_bucket_mut(now).value += value;
    }

    /// The present bucket's value, rotating it into existence first if needed.
    pub fn current_value(&self) -> i64 {
        let mut ring = self.ring.lock();
        let now = Instant::now();
        ring.current_bucket_mut(now).value
    }

    /// Sum of every bucket still live in the rolling window anchored at `now`.
    ///
    /// A bucket is live when its `start` is strictly before `now` and
    /// `now - start <= slots * period`. This does not rotate the ring; it
    /// only filters the buckets as they currently stand.
    pub fn sum(&self, now: Instant) -> i64 {
        let ring = self.ring.lock();
        let window = ring.window();
        ring.buckets
            .iter()
            .flatten()
            .filter(|b| b.start < now && now.saturating_duration_since(b.start) <= window)
            .map(|b| b.value)
            .sum()
    }
}
