//! Deferred start: suspends the job until its start instant.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::Cancelled;

/// Time source for the gate, injected so tests can drive a paused clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

type ProgressFn = Box<dyn Fn(Duration) + Send + Sync>;

/// Blocks the job until its start instant, re-deriving the remaining
/// delay at least once per poll interval so progress stays visible and
/// cancellation stays responsive.
pub struct TimeGate {
    poll_interval: Duration,
    clock: Box<dyn Clock>,
    on_progress: Option<ProgressFn>,
}

impl Default for TimeGate {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl TimeGate {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            clock: Box::new(SystemClock),
            on_progress: None,
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Observer invoked with the remaining delay before each sleep.
    pub fn with_progress(mut self, observer: impl Fn(Duration) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Box::new(observer));
        self
    }

    /// Returns immediately when `start_at` is now or already past;
    /// otherwise sleeps in poll-interval steps until it is reached.
    pub async fn wait_until(
        &self,
        start_at: DateTime<Utc>,
        token: &CancellationToken,
    ) -> Result<(), Cancelled> {
        loop {
            let remaining = match (start_at - self.clock.now()).to_std() {
                Ok(remaining) if !remaining.is_zero() => remaining,
                // Zero or negative: the start instant has been reached.
                _ => return Ok(()),
            };

            info!(remaining_secs = remaining.as_secs(), "waiting for start time");
            if let Some(observer) = &self.on_progress {
                observer(remaining);
            }

            let step = remaining.min(self.poll_interval);
            tokio::select! {
                _ = token.cancelled() => return Err(Cancelled::during("waiting for start time")),
                _ = tokio::time::sleep(step) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestClock;
    use chrono::TimeZone;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 18, 9, 0, 0).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn past_instant_returns_immediately_without_progress() {
        let reports = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&reports);
        let gate = TimeGate::new(Duration::from_secs(60))
            .with_clock(TestClock::new(base()))
            .with_progress(move |_| {
                counted.fetch_add(1, Ordering::SeqCst);
            });

        let token = CancellationToken::new();
        let before = Instant::now();
        gate.wait_until(base() - chrono::Duration::seconds(1), &token)
            .await
            .unwrap();

        assert_eq!(before.elapsed(), Duration::ZERO);
        assert_eq!(reports.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_full_delay_and_reports_each_poll() {
        let reports = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&reports);
        let gate = TimeGate::new(Duration::from_secs(60))
            .with_clock(TestClock::new(base()))
            .with_progress(move |_| {
                counted.fetch_add(1, Ordering::SeqCst);
            });

        let token = CancellationToken::new();
        let before = Instant::now();
        gate.wait_until(base() + chrono::Duration::seconds(150), &token)
            .await
            .unwrap();

        assert!(before.elapsed() >= Duration::from_secs(150));
        // 150 s at a 60 s poll interval: reports at 150, 90 and 30 remaining.
        assert_eq!(reports.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_the_wait() {
        let gate = TimeGate::new(Duration::from_secs(60)).with_clock(TestClock::new(base()));
        let token = CancellationToken::new();

        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            cancel.cancel();
        });

        let err = gate
            .wait_until(base() + chrono::Duration::seconds(600), &token)
            .await
            .unwrap_err();
        assert_eq!(err, Cancelled::during("waiting for start time"));
    }
}
