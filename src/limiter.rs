// SPDX-License-Identifier: Apache-2.0

//! Fixed-capacity ticket pool used to bound concurrent calls into a circuit.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// An opaque, value-less admission token.
///
/// Held exclusively by the call that acquired it; dropping it is the only
/// way to release it, so a ticket can never be "lost" across a panic or an
/// early return the way a manually-balanced acquire/release pair can.
pub struct Ticket {
    _permit: OwnedSemaphorePermit,
}

/// A pool of `N` indistinguishable tickets.
///
/// Backed by a [`tokio::sync::Semaphore`] sized to exactly `N` permits: the
/// reference implementation's own ticket channel could silently drop a
/// legitimately-held ticket if a `Return` raced a concurrent push past
/// capacity (see the crate's design notes in `DESIGN.md`); a semaphore
/// sized once at creation makes over-release structurally impossible
/// instead of merely guarded against.
pub struct Limiter {
    semaphore: Arc<Semaphore>,
    capacity: u32,
}

impl Limiter {
    /// Create a pool with `size` tickets.
    pub fn new(size: u32) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(size as usize)),
            capacity: size,
        }
    }

    /// Attempt to acquire a ticket without blocking.
    ///
    /// Returns `None` immediately if the pool is exhausted.
    pub fn try_acquire(&self) -> Option<Ticket> {
        Arc::clone(&self.semaphore)
            .try_acquire_owned()
            .ok()
            .map(|permit| Ticket { _permit: permit })
    }

    /// Wait for a ticket to become available.
    ///
    /// Not used by the execution orchestrator, which only ever calls
    /// [`Limiter::try_acquire`]; exposed for integrators that want to queue
    /// for admission rather than fail fast.
    pub async fn take(&self) -> Ticket {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .expect("limiter semaphore is never closed");
        Ticket { _permit: permit }
    }

    /// Current number of free tickets (advisory: may be stale by the time
    /// the caller acts on it).
    pub fn size(&self) -> u32 {
        self.semaphore.available_permits() as u32
    }

    /// Total capacity the pool was created with.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}
