// SPDX-License-Identifier: Apache-2.0

//! The execution orchestrator: races a caller's primary command against a
//! timeout and a cancellation signal, coordinates an optional fallback, and
//! reports the outcome to the circuit's metrics before the call returns.

use std::future::Future;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::circuit::{Circuit, Event, FallbackKind, PrimaryKind};
use crate::error::Error;
use crate::registry::Registry;

/// The receiving half of the single-producer, zero-or-one-item channel a
/// call to [`crate::go`] returns.
///
/// By the time [`crate::go`] resolves this channel's sender has already
/// fired (or been dropped), so a single `.await` drains it immediately:
/// `Ok(err)` is a failure, `Err(_)` (the sender dropped without sending)
/// means the call succeeded, possibly via a fallback that absorbed the
/// primary error.
pub type ErrorChannel = oneshot::Receiver<Error>;

/// Run `exec` through the named circuit, racing it against the circuit's
/// configured timeout and `ctx`'s cancellation, with an optional `fallback`
/// run on any failure path.
///
/// See the crate-level documentation for the full protocol; in short:
/// 1. An admission ticket is requested from the circuit's limiter. Denial
///    short-circuits straight to the fallback path with
///    [`Error::ConcurrentLimit`] and never starts a worker.
/// 2. On admission, `exec` runs on a spawned task while this call holds the
///    ticket. The ticket is released as soon as the race below resolves and
///    this function returns, even if that is because the call was
///    classified `timeout` or `cancelled` while the worker kept running —
///    the worker is never forcibly aborted, just no longer observed, and no
///    longer counted against the circuit's concurrency limit.
/// 3. Whichever of {`ctx` cancellation, the timeout, `exec` completion}
///    resolves first determines the outcome; exactly one event is reported.
pub async fn go<E, Exec, ExecFut, Fb, FbFut>(
    registry: &Registry,
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
    let name = name.into();
    let circuit = registry.get_circuit(&name);
    let settings = registry.get_settings(&name);
    let (tx, rx) = oneshot::channel();

    // Held in this frame, not the worker's, so it is released as soon as the
    // race below resolves and this function returns — even if the worker is
    // still running because it lost the race to a timeout or a
    // cancellation. Concurrency is bounded on admitted-and-racing calls, not
    // on physically-still-executing workers.
    let _ticket = match circuit.limiter().try_acquire() {
        Some(ticket) => ticket,
        None => {
            tracing::debug!(name = %name, "admission rejected: ticket pool exhausted");
            fail(&circuit, ctx, Error::ConcurrentLimit, fallback, tx).await;
            return rx;
        }
    };

    let exec_ctx = ctx.clone();
    let mut worker = tokio::spawn(async move { exec(exec_ctx).await });

    tokio::select! {
        () = ctx.cancelled() => {
            fail(&circuit, ctx, Error::Cancelled, fallback, tx).await;
        }
        () = tokio::time::sleep(settings.timeout) => {
            fail(&circuit, ctx, Error::Timeout, fallback, tx).await;
        }
        joined = &mut worker => {
            match joined {
                Ok(Ok(())) => {
                    circuit.report_event(Event { primary: PrimaryKind::Success, fallback: None });
                }
                Ok(Err(exec_err)) => {
                    let err = Error::Exec(Box::new(exec_err));
                    fail(&circuit, ctx, err, fallback, tx).await;
                }
                Err(join_err) if join_err.is_panic() => {
                    error!(name = %name, "primary command panicked");
                    let err = Error::exec_panic(join_err.into_panic().as_ref());
                    fail(&circuit, ctx, err, fallback, tx).await;
                }
                Err(_cancelled) => {
                    // The worker is never aborted by this crate, so this arm
                    // is unreachable in practice; treat it as an ordinary
                    // primary failure rather than panicking ourselves.
                    let err = Error::Exec("worker task ended unexpectedly".into());
                    fail(&circuit, ctx, err, fallback, tx).await;
                }
            }
        }
    }

    rx
}

/// Shared tail of every failure path: classify `primary_err`, run the
/// fallback (if any) under the same panic isolation as the primary command,
/// record one event, and send at most one value on the error channel.
async fn fail<E, Fb, FbFut>(
    circuit: &Circuit,
    ctx: CancellationToken,
    primary_err: Error,
    fallback: Option<Fb>,
    tx: oneshot::Sender<Error>,
) where
    E: std::error::Error + Send + Sync + 'static,
    Fb: FnOnce(CancellationToken, Error) -> FbFut + Send + 'static,
    FbFut: Future<Output = Result<(), E>> + Send + 'static,
{
    let primary = classify(&primary_err);

    let Some(fallback) = fallback else {
        circuit.report_event(Event {
            primary,
            fallback: None,
        });
        let _ = tx.send(primary_err);
        return;
    };

    let name = circuit.name().to_string();
    let fallback_result = tokio::spawn(async move { fallback(ctx, primary_err).await }).await;

    let fb_err = match fallback_result {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(Error::Fallback(Box::new(e))),
        Err(join_err) if join_err.is_panic() => {
            error!(name = %name, "fallback panicked");
            Some(Error::fallback_panic(join_err.into_panic().as_ref()))
        }
        Err(_cancelled) => Some(Error::Fallback("fallback task ended unexpectedly".into())),
    };

    let fallback_kind = match &fb_err {
        None => FallbackKind::Success,
        Some(_) => FallbackKind::Failure,
    };
    circuit.report_event(Event {
        primary,
        fallback: Some(fallback_kind),
    });

    if let Some(err) = fb_err {
        let _ = tx.send(err);
    }
}

/// Maps a failure's identity to the primary event kind it is reported as.
/// `primary_err` is always one of the four variants constructed within this
/// module; anything else falls back to `Failure`.
fn classify(err: &Error) -> PrimaryKind {
    match err {
        Error::ConcurrentLimit => PrimaryKind::Rejected,
        Error::Cancelled => PrimaryKind::Cancelled,
        Error::Timeout => PrimaryKind::Timeout,
        Error::Exec(_) | Error::Fallback(_) | Error::CircuitBroken => PrimaryKind::Failure,
    }
}
