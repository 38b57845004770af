// SPDX-License-Identifier: Apache-2.0

//! Error values surfaced by the circuit breaker.
//!
//! Identity matters here: callers match on these variants (not just on
//! their rendered message) to decide whether a failure was the dependency's
//! fault, the breaker's own admission policy, or the caller giving up. The
//! four sentinel variants below are constructed only by this crate; they
//! never wrap the primary or fallback command's own error.

/// Errors that can flow out of a [`crate::go`] call.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The circuit's ticket pool had no free ticket when the call was admitted.
    #[error("concurrent calls limit reached")]
    ConcurrentLimit,

    /// The primary command did not finish within the circuit's configured timeout.
    #[error("timeout")]
    Timeout,

    /// The caller's cancellation token fired before the primary command finished.
    #[error("cancelled")]
    Cancelled,

    /// The circuit is open and is not currently admitting a half-open probe.
    ///
    /// Reserved: the orchestrator in this crate does not emit this variant on
    /// its own (see [`crate::allow_request`]); it exists for integrators that
    /// wire the admission check in front of [`crate::go`] themselves.
    #[error("circuit is broken")]
    CircuitBroken,

    /// The primary command returned an error, or panicked.
    ///
    /// A panic is converted to this variant with the message
    /// `"exec panic: <payload>"`.
    #[error(transparent)]
    Exec(#[from] Box<dyn std::error::Error + Send + Sync>),

    /// The fallback command returned an error, or panicked, after the
    /// primary command had already failed.
    ///
    /// A panic is converted to this variant with the message
    /// `"failover panic: <payload>"`. This masks the primary error on the
    /// wire; the primary failure is still recorded in metrics.
    #[error(transparent)]
    Fallback(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Build the error a caught `exec` panic surfaces, matching the
    /// reference implementation's `"exec panic: <value>"` message format.
    pub(crate) fn exec_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        Error::Exec(panic_message("exec panic", payload).into())
    }

    /// Build the error a caught `fallback` panic surfaces, matching the
    /// reference implementation's `"failover panic: <value>"` message format.
    pub(crate) fn fallback_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        Error::Fallback(panic_message("failover panic", payload).into())
    }
}

fn panic_message(prefix: &str, payload: &(dyn std::any::Any + Send)) -> String {
    let detail = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    };
    format!("{prefix}: {detail}")
}

impl PartialEq for Error {
    /// Compares sentinel variants by identity and `Exec`/`Fallback` by their
    /// rendered message, since the wrapped `dyn Error` itself has none.
    fn eq(&self, other: &Self) -> bool {
        use Error::*;
        match (self, other) {
            (ConcurrentLimit, ConcurrentLimit)
            | (Timeout, Timeout)
            | (Cancelled, Cancelled)
            | (CircuitBroken, CircuitBroken) => true,
            (Exec(a), Exec(b)) => a.to_string() == b.to_string(),
            (Fallback(a), Fallback(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
