// ── Watchbot LLM: Retry layer ──────────────────────────────────────────────
// Transient-error retry wrapped around every provider call when
// `max_retries > 1`. Classification is by error-message substring so the
// same policy covers HTTP status failures ("API error 429: …") and
// transport failures ("connection reset by peer").
//
// Backoff is exponential from a 500 ms base, capped at 30 s; sleeps race
// the shutdown signal so cancellation preempts a pending retry.

use std::time::Duration;
use tokio::sync::watch;

/// Substrings that mark an error as transient.
const RETRYABLE_MARKERS: &[&str] = &["429", "500", "502", "503", "timeout", "connection reset"];

/// Initial retry delay in milliseconds (doubles each attempt).
const INITIAL_RETRY_DELAY_MS: u64 = 500;

/// Maximum retry delay cap in milliseconds (30 seconds).
const MAX_RETRY_DELAY_MS: u64 = 30_000;

/// Check if an error message represents a transient/retryable failure.
pub fn is_retryable(message: &str) -> bool {
    let msg = message.to_ascii_lowercase();
    RETRYABLE_MARKERS.iter().any(|marker| msg.contains(marker))
}

/// Delay before retry `attempt` (0-based): 500ms, 1s, 2s, … capped at 30s.
pub fn backoff_delay(attempt: u32) -> Duration {
    let ms = INITIAL_RETRY_DELAY_MS
        .saturating_mul(2u64.saturating_pow(attempt))
        .min(MAX_RETRY_DELAY_MS);
    Duration::from_millis(ms)
}

/// Sleep for `delay`, or return early when the shutdown signal fires.
/// Returns `true` when the sleep was cancelled.
pub async fn sleep_or_cancel(delay: Duration, shutdown: Option<&watch::Receiver<bool>>) -> bool {
    match shutdown {
        None => {
            tokio::time::sleep(delay).await;
            false
        }
        Some(rx) => {
            if *rx.borrow() {
                return true;
            }
            let mut rx = rx.clone();
            tokio::select! {
                _ = tokio::time::sleep(delay) => false,
                changed = rx.changed() => changed.is_ok() && *rx.borrow(),
            }
        }
    }
}
