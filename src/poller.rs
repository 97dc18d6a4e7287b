// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Generic readiness polling with bounded or unbounded waits.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Result of one predicate probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    /// The awaited condition holds.
    Ready,
    /// The condition does not hold yet; keep polling.
    Pending,
    /// The condition can never hold (malformed target, unrecoverable error).
    Failed(String),
}

/// Final outcome of a wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    Ready,
    Failed(String),
    TimedOut,
}

impl WaitOutcome {
    /// Convert into a crate result, naming the awaited condition.
    pub fn into_result(self, what: &str) -> crate::error::Result<()> {
        match self {
            WaitOutcome::Ready => Ok(()),
            WaitOutcome::Failed(reason) => Err(crate::error::CorralError::PreconditionFailed(
                format!("{what}: {reason}"),
            )),
            WaitOutcome::TimedOut => Err(crate::error::CorralError::Timeout(what.to_string())),
        }
    }
}

/// One readiness gate: how often to probe and how long to keep trying.
/// Created per wait-point and discarded after resolving.
#[derive(Debug, Clone, Copy)]
pub struct ReadinessCheck {
    /// Delay between probes; enforced even when the predicate returns instantly.
    pub interval: Duration,
    /// Upper bound on the total wait. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl ReadinessCheck {
    pub fn new(interval: Duration, timeout: Option<Duration>) -> Self {
        Self { interval, timeout }
    }
}

/// Repeatedly invoke `predicate` at `check.interval` spacing until it reports
/// [`Probe::Ready`] or [`Probe::Failed`], the optional timeout elapses, or the
/// cancellation token fires. Cancellation resolves promptly to a
/// `Failed`-class outcome instead of running out the timeout.
pub async fn wait<F, Fut>(
    check: &ReadinessCheck,
    cancel: &CancellationToken,
    mut predicate: F,
) -> WaitOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Probe>,
{
    let started = Instant::now();

    loop {
        if cancel.is_cancelled() {
            return WaitOutcome::Failed("wait cancelled".to_string());
        }

        match predicate().await {
            Probe::Ready => return WaitOutcome::Ready,
            Probe::Failed(reason) => return WaitOutcome::Failed(reason),
            Probe::Pending => {
                debug!("condition not yet met, next probe in {:?}", check.interval);
            }
        }

        if let Some(timeout) = check.timeout {
            if started.elapsed() >= timeout {
                return WaitOutcome::TimedOut;
            }
        }

        tokio::select! {
            _ = sleep(check.interval) => {}
            _ = cancel.cancelled() => {
                return WaitOutcome::Failed("wait cancelled".to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_check(timeout: Option<Duration>) -> ReadinessCheck {
        ReadinessCheck::new(Duration::from_millis(10), timeout)
    }

    #[tokio::test]
    async fn test_ready_on_first_probe() {
        let cancel = CancellationToken::new();
        let outcome = wait(&fast_check(None), &cancel, || async { Probe::Ready }).await;
        assert_eq!(outcome, WaitOutcome::Ready);
    }

    #[tokio::test]
    async fn test_ready_after_pending_probes() {
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in = calls.clone();

        let outcome = wait(&fast_check(None), &cancel, move || {
            let calls = calls_in.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Probe::Pending
                } else {
                    Probe::Ready
                }
            }
        })
        .await;

        assert_eq!(outcome, WaitOutcome::Ready);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failed_returns_immediately() {
        let cancel = CancellationToken::new();
        let outcome = wait(&fast_check(None), &cancel, || async {
            Probe::Failed("bad selector".to_string())
        })
        .await;
        assert_eq!(outcome, WaitOutcome::Failed("bad selector".to_string()));
    }

    #[tokio::test]
    async fn test_times_out_within_bound() {
        let cancel = CancellationToken::new();
        let check = ReadinessCheck::new(Duration::from_millis(10), Some(Duration::from_millis(50)));
        let started = Instant::now();

        let outcome = wait(&check, &cancel, || async { Probe::Pending }).await;

        assert_eq!(outcome, WaitOutcome::TimedOut);
        // Must resolve within timeout + one interval, not run forever.
        assert!(started.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_interval_enforced_between_instant_probes() {
        let cancel = CancellationToken::new();
        let check = ReadinessCheck::new(Duration::from_millis(20), Some(Duration::from_millis(90)));
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in = calls.clone();

        let outcome = wait(&check, &cancel, move || {
            calls_in.fetch_add(1, Ordering::SeqCst);
            async { Probe::Pending }
        })
        .await;

        assert_eq!(outcome, WaitOutcome::TimedOut);
        // 90ms budget at 20ms spacing allows at most ~6 probes; a busy loop
        // would rack up thousands.
        assert!(calls.load(Ordering::SeqCst) <= 7);
    }

    #[tokio::test]
    async fn test_cancellation_resolves_promptly() {
        let cancel = CancellationToken::new();
        let check = ReadinessCheck::new(Duration::from_secs(60), Some(Duration::from_secs(600)));

        let cancel_in = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(20)).await;
            cancel_in.cancel();
        });

        let started = Instant::now();
        let outcome = wait(&check, &cancel, || async { Probe::Pending }).await;

        assert!(matches!(outcome, WaitOutcome::Failed(_)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_outcome_into_result_maps_variants() {
        assert!(WaitOutcome::Ready.into_result("x").is_ok());
        assert!(matches!(
            WaitOutcome::TimedOut.into_result("rollout"),
            Err(crate::error::CorralError::Timeout(_))
        ));
        assert!(matches!(
            WaitOutcome::Failed("no".to_string()).into_result("rollout"),
            Err(crate::error::CorralError::PreconditionFailed(_))
        ));
    }
}
