// SPDX-License-Identifier: Apache-2.0

//! A circuit-breaker execution guard for unreliable calls.
//!
//! [`go`] wraps an async primary command with bounded concurrency, a
//! timeout, cancellation propagation, an optional fallback, and
//! rolling-window metrics that drive an open/half-open/closed admission
//! decision per named circuit. It isolates failures of one dependency so
//! they do not cascade into the caller.
//!
//! ```no_run
//! # async fn run() {
//! use breaker::{self, Error};
//! use tokio_util::sync::CancellationToken;
//!
//! let ctx = CancellationToken::new();
//! let rx = breaker::go(
//!     "users-service",
//!     ctx,
//!     |_ctx| async { reqwest_like_call().await },
//!     None::<fn(CancellationToken, Error) -> std::future::Ready<Result<(), std::io::Error>>>,
//! )
//! .await;
//!
//! match rx.await {
//!     Ok(err) => eprintln!("call failed: {err}"),
//!     Err(_) => println!("call succeeded"),
//! }
//!
//! async fn reqwest_like_call() -> Result<(), std::io::Error> {
//!     Ok(())
//! }
//! # }
//! ```
//!
//! # Scope
//!
//! This crate owns the hard-engineering core: the execution orchestrator,
//! the per-circuit registry and admission decision, the rolling-window
//! counters behind it, and the bounded ticket pool. It does not install a
//! `tracing` subscriber, parse configuration files, or provide an HTTP/RPC
//! adaptor — those are left to the embedding application; this crate only
//! emits structured log events and accepts plain [`Settings`] values.
//!
//! # Non-goals
//!
//! Persistence of metrics across restarts, distributed/cluster-wide state
//! sharing, adaptive (statistical) trip thresholds, request hedging,
//! priority scheduling among admission waiters, and atomic reconfiguration
//! while calls are in flight are all out of scope.

mod circuit;
mod error;
mod executor;
mod limiter;
mod metrics;
mod registry;
mod settings;

pub use circuit::{Circuit, Event, FallbackKind, PrimaryKind};
pub use error::Error;
pub use executor::{go as go_with, ErrorChannel};
pub use limiter::{Limiter, Ticket};
pub use metrics::Collector as MetricsCollector;
pub use metrics::RollingCounter;
pub use registry::Registry;
pub use settings::{
    Settings, DEFAULT_ERROR_THRESHOLD, DEFAULT_MAX_CONCURRENT_CALLS, DEFAULT_SLEEP_DURATION,
    DEFAULT_TIMEOUT, SLOTS, SLOT_DURATION,
};

use std::future::Future;
use std::sync::OnceLock;

use tokio_util::sync::CancellationToken;

/// The process-wide registry backing the free functions below.
///
/// Exposed as `fn()` rather than a `static` so callers that want an
/// isolated set of circuits (most commonly: tests run in parallel against
/// the same process) can construct their own [`Registry`] and call
/// [`go_with`] directly instead of going through this default instance.
fn default_registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(Registry::new)
}

/// Install (or replace) settings for `name` on the process-wide registry,
/// normalizing zero fields to their defaults, and return the normalized
/// value.
pub fn configure(name: impl Into<String>, settings: Settings) -> Settings {
    default_registry().configure(name, settings)
}

/// The settings stored for `name` on the process-wide registry, or a
/// defaults-only value if none were ever configured.
pub fn get_settings(name: &str) -> Settings {
    default_registry().get_settings(name)
}

/// `true` iff `name`'s circuit is not broken, or a half-open probe is due.
///
/// Exposed so integrators may gate before calling [`go`]; `go` itself does
/// not consult this — see the crate-level design notes in `DESIGN.md`.
pub fn allow_request(name: &str) -> bool {
    let circuit = default_registry().get_circuit(name);
    let settings = default_registry().get_settings(name);
    circuit.allow_request(settings)
}

/// Run `exec` through the named circuit on the process-wide registry,
/// racing it against the circuit's configured timeout and `ctx`'s
/// cancellation, with an optional `fallback` run on any failure path.
///
/// Returns a single-producer, zero-or-one-item error channel: a value means
/// failure, closure without a value means success (the primary command
/// completed, or a fallback absorbed its error). See [`ErrorChannel`].
pub async fn go<E, Exec, ExecFut, Fb, FbFut>(
    name: impl Into<String>,
    ctx: CancellationToken,
    exec: Exec,
    fallback: Option<Fb>,
) -> ErrorChannel
where
    E: std::error::Error + Send + Sync + 'static,
    Exec: FnOnce(CancellationToken) -> ExecFut + Send + 'static,
    ExecFut: Future<Output = Result<(), E>> + Send + 'static,
    Fb: FnOnce(CancellationToken, Error) -> FbFut + Send + 'static,
    FbFut: Future<Output = Result<(), E>> + Send + 'static,
{
    executor::go(default_registry(), name, ctx, exec, fallback).await
}
