//! Bounded retry of the playback-start interaction.
//!
//! Players routinely render their controls after the page load event, so
//! the first click attempts are expected to fail. Exhausting all attempts
//! is still not fatal: some pages begin streaming without any
//! interaction, and the manifest request may already have fired.

use std::fmt;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::Cancelled;

pub const DEFAULT_MAX_TRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// The interaction succeeded on attempt `tries`.
    Triggered { tries: u32 },
    /// Every attempt failed; discovery proceeds regardless.
    Exhausted { tries: u32 },
}

/// Runs `action` up to `max_tries` times, sleeping `retry_delay` between
/// attempts and stopping on the first success. Independent of any
/// rendering engine so it can be exercised with a fake action.
pub async fn attempt<E>(
    mut action: impl AsyncFnMut() -> Result<(), E>,
    max_tries: u32,
    retry_delay: Duration,
    token: &CancellationToken,
) -> Result<TriggerOutcome, Cancelled>
where
    E: fmt::Display,
{
    for tried in 1..=max_tries {
        if token.is_cancelled() {
            return Err(Cancelled::during("triggering playback"));
        }
        match action().await {
            Ok(()) => {
                debug!(tried, "playback interaction succeeded");
                return Ok(TriggerOutcome::Triggered { tries: tried });
            }
            Err(reason) => {
                debug!(tried, max_tries, %reason, "playback interaction failed");
            }
        }
        if tried < max_tries {
            tokio::select! {
                _ = token.cancelled() => return Err(Cancelled::during("triggering playback")),
                _ = tokio::time::sleep(retry_delay) => {}
            }
        }
    }

    warn!(
        max_tries,
        "playback interaction never succeeded, continuing discovery anyway"
    );
    Ok(TriggerOutcome::Exhausted { tries: max_tries })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn flaky(fail_first: u32) -> (impl AsyncFnMut() -> Result<(), String>, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let counted = Arc::clone(&calls);
        let action = move || {
            let calls = Arc::clone(&counted);
            async move {
                let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if call <= fail_first {
                    Err(format!("element not ready (attempt {call})"))
                } else {
                    Ok(())
                }
            }
        };
        (action, calls)
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_third_attempt() {
        let (action, calls) = flaky(2);
        let token = CancellationToken::new();

        let outcome = attempt(action, 3, Duration::from_secs(1), &token)
            .await
            .unwrap();

        assert_eq!(outcome, TriggerOutcome::Triggered { tries: 3 });
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_is_not_an_error() {
        let (action, calls) = flaky(u32::MAX);
        let token = CancellationToken::new();

        let outcome = attempt(action, 3, Duration::from_secs(1), &token)
            .await
            .unwrap();

        assert_eq!(outcome, TriggerOutcome::Exhausted { tries: 3 });
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_once_successful() {
        let (action, calls) = flaky(0);
        let token = CancellationToken::new();

        let outcome = attempt(action, 3, Duration::from_secs(1), &token)
            .await
            .unwrap();

        assert_eq!(outcome, TriggerOutcome::Triggered { tries: 1 });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_between_attempts() {
        let (action, _) = flaky(u32::MAX);
        let token = CancellationToken::new();
        token.cancel();

        let err = attempt(action, 3, Duration::from_secs(1), &token)
            .await
            .unwrap_err();
        assert_eq!(err, Cancelled::during("triggering playback"));
    }
}
