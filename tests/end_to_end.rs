// SPDX-License-Identifier: Apache-2.0

//! End-to-end orchestrator scenarios, mirroring the crate's scenario table:
//! each call is driven through [`breaker::go_with`] against its own
//! isolated [`breaker::Registry`] so tests can run concurrently without
//! circuits bleeding into one another.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use breaker::{Error, Registry, Settings};
use tokio::sync::Barrier;
use tokio_util::sync::CancellationToken;

fn boom() -> io::Error {
    io::Error::other("boom")
}

#[tokio::test]
async fn successful_call_closes_the_channel_without_a_value() {
    let registry = Registry::new();
    let rx = breaker::go_with(
        &registry,
        "A",
        CancellationToken::new(),
        |_ctx| async { Ok::<(), io::Error>(()) },
        None::<fn(CancellationToken, Error) -> std::future::Ready<Result<(), io::Error>>>,
    )
    .await;

    assert!(rx.await.is_err(), "channel should close empty on success");

    let circuit = registry.get_circuit("A");
    let now = std::time::Instant::now();
    assert_eq!(circuit.metrics().requests.sum(now), 1);
    assert_eq!(circuit.metrics().errors.sum(now), 0);
}

#[tokio::test]
async fn slow_exec_is_classified_as_timeout() {
    let registry = Registry::new();
    let _ = registry.configure(
        "B",
        Settings {
            timeout: Duration::from_millis(30),
            ..Settings::default()
        },
    );

    let rx = breaker::go_with(
        &registry,
        "B",
        CancellationToken::new(),
        |_ctx| async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<(), io::Error>(())
        },
        None::<fn(CancellationToken, Error) -> std::future::Ready<Result<(), io::Error>>>,
    )
    .await;

    let err = rx.await.expect("timeout should surface an error");
    assert_eq!(err, Error::Timeout);

    let circuit = registry.get_circuit("B");
    let now = std::time::Instant::now();
    assert_eq!(circuit.metrics().requests.sum(now), 1);
    assert_eq!(circuit.metrics().errors.sum(now), 1);
    assert_eq!(circuit.metrics().timeouts.sum(now), 1);
}

#[tokio::test]
async fn primary_failure_without_fallback_surfaces_the_primary_error() {
    let registry = Registry::new();
    let rx = breaker::go_with(
        &registry,
        "C",
        CancellationToken::new(),
        |_ctx| async { Err::<(), io::Error>(boom()) },
        None::<fn(CancellationToken, Error) -> std::future::Ready<Result<(), io::Error>>>,
    )
    .await;

    let err = rx.await.expect("failure should surface an error");
    assert_eq!(err.to_string(), "boom");

    let circuit = registry.get_circuit("C");
    let now = std::time::Instant::now();
    assert_eq!(circuit.metrics().requests.sum(now), 1);
    assert_eq!(circuit.metrics().errors.sum(now), 1);
}

#[tokio::test]
async fn fallback_success_absorbs_the_primary_failure() {
    let registry = Registry::new();
    let rx = breaker::go_with(
        &registry,
        "D",
        CancellationToken::new(),
        |_ctx| async { Err::<(), io::Error>(boom()) },
        Some(|_ctx, _primary_err| async { Ok::<(), io::Error>(()) }),
    )
    .await;

    assert!(
        rx.await.is_err(),
        "a successful fallback should absorb the primary error"
    );

    let circuit = registry.get_circuit("D");
    let now = std::time::Instant::now();
    assert_eq!(circuit.metrics().requests.sum(now), 1);
    assert_eq!(circuit.metrics().errors.sum(now), 1);
    assert_eq!(circuit.metrics().fallback_success.sum(now), 1);
}

#[tokio::test]
async fn fallback_failure_masks_the_primary_error_on_the_wire() {
    let registry = Registry::new();
    let rx = breaker::go_with(
        &registry,
        "D2",
        CancellationToken::new(),
        |_ctx| async { Err::<(), io::Error>(boom()) },
        Some(|_ctx, _primary_err| async {
            Err::<(), io::Error>(io::Error::other("fallback down"))
        }),
    )
    .await;

    let err = rx.await.expect("fallback failure should surface an error");
    assert_eq!(err.to_string(), "fallback down");

    let circuit = registry.get_circuit("D2");
    let now = std::time::Instant::now();
    assert_eq!(circuit.metrics().errors.sum(now), 1);
    assert_eq!(circuit.metrics().fallback_failure.sum(now), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn admission_limit_rejects_the_second_concurrent_call() {
    let registry = Arc::new(Registry::new());
    let _ = registry.configure(
        "E",
        Settings {
            max_concurrent_calls: 1,
            timeout: Duration::from_secs(5),
            ..Settings::default()
        },
    );

    let barrier = Arc::new(Barrier::new(2));
    let first_barrier = Arc::clone(&barrier);
    let registry_for_first = Arc::clone(&registry);

    let first = tokio::spawn(async move {
        breaker::go_with(
            &registry_for_first,
            "E",
            CancellationToken::new(),
            move |_ctx| async move {
                first_barrier.wait().await;
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok::<(), io::Error>(())
            },
            None::<fn(CancellationToken, Error) -> std::future::Ready<Result<(), io::Error>>>,
        )
        .await
        .await
    });

    // Give the first call a chance to acquire its ticket and reach the barrier.
    tokio::time::sleep(Duration::from_millis(20)).await;
    barrier.wait().await;

    let second_rx = breaker::go_with(
        &registry,
        "E",
        CancellationToken::new(),
        |_ctx| async { Ok::<(), io::Error>(()) },
        None::<fn(CancellationToken, Error) -> std::future::Ready<Result<(), io::Error>>>,
    )
    .await;

    let second_err = second_rx.await.expect("second call should be rejected");
    assert_eq!(second_err, Error::ConcurrentLimit);

    let first_result = first.await.expect("first call task should not panic");
    assert!(first_result.is_err(), "first call should succeed");

    let circuit = registry.get_circuit("E");
    let now = std::time::Instant::now();
    assert_eq!(circuit.metrics().requests.sum(now), 2);
    assert_eq!(circuit.metrics().errors.sum(now), 1);
    assert_eq!(circuit.metrics().rejects.sum(now), 1);
}

#[tokio::test]
async fn exec_panic_is_caught_and_reported_as_failure() {
    let registry = Registry::new();
    let rx = breaker::go_with(
        &registry,
        "F",
        CancellationToken::new(),
        |_ctx| async {
            panic!("invalid data");
            #[allow(unreachable_code)]
            Ok::<(), io::Error>(())
        },
        None::<fn(CancellationToken, Error) -> std::future::Ready<Result<(), io::Error>>>,
    )
    .await;

    let err = rx.await.expect("a panic should surface an error");
    assert_eq!(err.to_string(), "exec panic: invalid data");

    let circuit = registry.get_circuit("F");
    let now = std::time::Instant::now();
    assert_eq!(circuit.metrics().requests.sum(now), 1);
    assert_eq!(circuit.metrics().errors.sum(now), 1);
}

#[tokio::test]
async fn cancellation_races_ahead_of_a_slow_exec() {
    let registry = Registry::new();
    let _ = registry.configure(
        "G",
        Settings {
            timeout: Duration::from_secs(5),
            ..Settings::default()
        },
    );

    let ctx = CancellationToken::new();
    let cancel_handle = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel_handle.cancel();
    });

    let rx = breaker::go_with(
        &registry,
        "G",
        ctx,
        |_ctx| async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok::<(), io::Error>(())
        },
        None::<fn(CancellationToken, Error) -> std::future::Ready<Result<(), io::Error>>>,
    )
    .await;

    let err = rx.await.expect("cancellation should surface an error");
    assert_eq!(err, Error::Cancelled);

    let circuit = registry.get_circuit("G");
    let now = std::time::Instant::now();
    assert_eq!(circuit.metrics().cancelled.sum(now), 1);
}

#[tokio::test]
async fn half_open_probe_allows_exactly_one_call_per_sleep_duration() {
    let registry = Registry::new();
    let _ = registry.configure(
        "H",
        Settings {
            error_threshold: 0.5,
            sleep_duration: Duration::from_millis(60),
            ..Settings::default()
        },
    );

    // Trip the circuit: one success, one failure -> 50% error ratio.
    let _ = breaker::go_with(
        &registry,
        "H",
        CancellationToken::new(),
        |_ctx| async { Ok::<(), io::Error>(()) },
        None::<fn(CancellationToken, Error) -> std::future::Ready<Result<(), io::Error>>>,
    )
    .await
    .await;
    let _ = breaker::go_with(
        &registry,
        "H",
        CancellationToken::new(),
        |_ctx| async { Err::<(), io::Error>(boom()) },
        None::<fn(CancellationToken, Error) -> std::future::Ready<Result<(), io::Error>>>,
    )
    .await
    .await;

    let settings = registry.get_settings("H");
    let circuit = registry.get_circuit("H");

    // The circuit is broken, so each `allow_request` call now turns on
    // whether a half-open probe is due. The very first check after tripping
    // admits one; the next one, immediately after, does not.
    assert!(circuit.allow_request(settings));
    assert!(!circuit.allow_request(settings));

    tokio::time::sleep(Duration::from_millis(70)).await;
    assert!(circuit.allow_request(settings));
}
