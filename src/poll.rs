//! Poll Loop
//!
//! Every wait in the bridge (receipts, game coverage, the challenge window)
//! is the same loop: ask a predicate, sleep, ask again. Misses sleep the
//! configured interval; transient errors back off exponentially. The sleep
//! is the only suspension point and can be interrupted by the caller's
//! cancellation token.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{BridgeError, Result};

/// Polling cadence and budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Sleep after a miss, and the first backoff step after a transient error
    pub interval: Duration,
    /// Upper bound for the transient-error backoff
    pub max_backoff: Duration,
    /// Total wait budget, `None` waits until success or cancellation
    pub max_wait: Option<Duration>,
}

impl PollConfig {
    /// Short waits such as receipts: backoff may grow to 8x the interval
    pub fn fast(interval: Duration) -> Self {
        Self {
            interval,
            max_backoff: interval.saturating_mul(8),
            max_wait: None,
        }
    }

    /// Long waits such as the challenge window: the interval is already coarse
    pub fn slow(interval: Duration) -> Self {
        Self {
            interval,
            max_backoff: interval.saturating_mul(2),
            max_wait: None,
        }
    }

    /// Bound the total wait
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }

    /// Remove the wait bound
    pub fn unbounded(mut self) -> Self {
        self.max_wait = None;
        self
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::fast(Duration::from_secs(4))
    }
}

/// Poll `predicate` until it yields a value.
///
/// - `Ok(Some(v))` returns `v`
/// - `Ok(None)` or `NotYetAvailable` sleeps `interval`
/// - `Transient` sleeps an exponential backoff capped at `max_backoff`
/// - any other error is returned as is
pub async fn poll<T, F, Fut>(
    what: &str,
    config: &PollConfig,
    cancel: &CancellationToken,
    mut predicate: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let started = Instant::now();
    let mut backoff = config.interval;
    let mut attempt: u64 = 0;

    loop {
        attempt += 1;

        let delay = match predicate().await {
            Ok(Some(value)) => {
                debug!(target: "opbridge::poll", what, attempt, "condition met");
                return Ok(value);
            }
            Ok(None) | Err(BridgeError::NotYetAvailable(_)) => {
                backoff = config.interval;
                config.interval
            }
            Err(BridgeError::Transient(reason)) => {
                warn!(
                    target: "opbridge::poll",
                    what,
                    attempt,
                    backoff = ?backoff,
                    reason = %reason,
                    "transient error, backing off"
                );
                let delay = backoff;
                backoff = backoff.saturating_mul(2).min(config.max_backoff);
                delay
            }
            Err(e) => return Err(e),
        };

        let waited = started.elapsed();
        let delay = match config.max_wait {
            Some(max_wait) if waited >= max_wait => {
                return Err(BridgeError::Timeout {
                    what: what.to_string(),
                    waited,
                });
            }
            Some(max_wait) => delay.min(max_wait - waited),
            None => delay,
        };

        if cancel.is_cancelled() {
            return Err(BridgeError::Cancelled(what.to_string()));
        }

        debug!(target: "opbridge::poll", what, attempt, delay = ?delay, "not ready, sleeping");
        tokio::select! {
            _ = cancel.cancelled() => {
                return Err(BridgeError::Cancelled(what.to_string()));
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_misses_then_ready() {
        let calls = counter();
        let config = PollConfig::slow(Duration::from_secs(60));
        let start = Instant::now();

        let c = calls.clone();
        let value = poll("provable", &config, &CancellationToken::new(), move || {
            let n = c.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Ok(if n >= 4 { Some(n) } else { None }) }
        })
        .await
        .unwrap();

        assert_eq!(value, 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        // three sleeps of the configured interval
        assert_eq!(start.elapsed(), Duration::from_secs(180));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reports_waited() {
        let config =
            PollConfig::fast(Duration::from_secs(10)).with_max_wait(Duration::from_secs(25));

        let err = poll::<(), _, _>("l2 receipt", &config, &CancellationToken::new(), || async {
            Ok(None)
        })
        .await
        .unwrap_err();

        match err {
            BridgeError::Timeout { what, waited } => {
                assert_eq!(what, "l2 receipt");
                assert_eq!(waited, Duration::from_secs(25));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_yet_available_counts_as_miss() {
        let calls = counter();
        let c = calls.clone();
        let start = Instant::now();

        let config = PollConfig::fast(Duration::from_secs(5));
        let value = poll("game", &config, &CancellationToken::new(), move || {
            let n = c.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(BridgeError::not_yet_available("no game yet"))
                } else {
                    Ok(Some("ready"))
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(value, "ready");
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_back_off_and_consume_budget() {
        let config = PollConfig {
            interval: Duration::from_secs(1),
            max_backoff: Duration::from_secs(4),
            max_wait: Some(Duration::from_secs(10)),
        };
        let calls = counter();
        let c = calls.clone();

        let err = poll::<(), _, _>("receipt", &config, &CancellationToken::new(), move || {
            c.fetch_add(1, Ordering::SeqCst);
            async { Err(BridgeError::transient("connection reset")) }
        })
        .await
        .unwrap_err();

        // sleeps 1, 2, 4, then 3 to reach the budget
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_resets_after_miss() {
        let config = PollConfig {
            interval: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            max_wait: None,
        };
        let calls = counter();
        let c = calls.clone();
        let start = Instant::now();

        // transient, transient, miss, transient, ready
        poll("receipt", &config, &CancellationToken::new(), move || {
            let n = c.fetch_add(1, Ordering::SeqCst);
            async move {
                match n {
                    0 | 1 | 3 => Err(BridgeError::transient("busy")),
                    2 => Ok(None),
                    _ => Ok(Some(())),
                }
            }
        })
        .await
        .unwrap();

        // 1 + 2 + 1 + 1
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_returns_immediately() {
        let calls = counter();
        let c = calls.clone();

        let config = PollConfig::default();
        let err = poll::<(), _, _>("receipt", &config, &CancellationToken::new(), move || {
            c.fetch_add(1, Ordering::SeqCst);
            async { Err(BridgeError::malformed(Default::default(), "no log")) }
        })
        .await
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::MalformedReceipt);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_sleep() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let config = PollConfig::slow(Duration::from_secs(300));
        let err = poll::<(), _, _>("finalize window", &config, &cancel, || async { Ok(None) })
        .await
        .unwrap_err();

        assert!(matches!(err, BridgeError::Cancelled(ref what) if what == "finalize window"));
        assert!(start.elapsed() < Duration::from_secs(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_cancelled_still_checks_once() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let done = poll("receipt", &PollConfig::default(), &cancel, || async { Ok(Some(1)) })
            .await
            .unwrap();
        assert_eq!(done, 1);

        let err = poll::<(), _, _>("receipt", &PollConfig::default(), &cancel, || async {
            Ok(None)
        })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }
}
