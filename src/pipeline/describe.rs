//! Vision describe calls with retry and in-place degradation.
//!
//! A transient provider failure on one page must never cost the whole
//! request, and it must never shift later pages out of position either.
//! So each slot retries with exponential backoff, and when retries run
//! out the slot keeps its place in the join order carrying an inline
//! error string instead of a description.

use crate::config::IngestConfig;
use crate::error::SlotError;
use crate::output::SlotResult;
use crate::providers::VisionDescriber;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Describe one slot (page or keyframe), retrying on failure.
///
/// Always returns a [`SlotResult`] — never an error. After
/// `config.max_retries` extra attempts the result degrades in place:
/// `text` becomes an inline error string and `error` records the failure.
pub async fn describe_slot(
    describer: &Arc<dyn VisionDescriber>,
    config: &IngestConfig,
    index: usize,
    label: String,
    prompt: &str,
    image_data_url: String,
) -> SlotResult {
    let started = Instant::now();
    let mut attempt: u32 = 0;

    loop {
        match describer.describe(prompt, &image_data_url).await {
            Ok(text) => {
                debug!(%label, retries = attempt, "described");
                return SlotResult {
                    index,
                    label,
                    text,
                    retries: attempt,
                    duration_ms: started.elapsed().as_millis() as u64,
                    error: None,
                };
            }
            Err(e) if attempt < config.max_retries => {
                let delay = backoff_delay(config.retry_backoff_ms, attempt);
                attempt += 1;
                warn!(%label, attempt, delay_ms = delay, "describe failed, retrying: {e}");
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            Err(e) => {
                warn!(%label, retries = attempt, "describe failed permanently: {e}");
                return SlotResult {
                    index,
                    text: format!("Error describing {label}: {e}"),
                    label: label.clone(),
                    retries: attempt,
                    duration_ms: started.elapsed().as_millis() as u64,
                    error: Some(SlotError::DescribeFailed {
                        label,
                        retries: attempt,
                        detail: e.to_string(),
                    }),
                };
            }
        }
    }
}

/// Exponential backoff delay: `base_ms`, `2*base_ms`, `4*base_ms`, ...
///
/// Saturates instead of overflowing; the shift alone would wrap once the
/// attempt count reaches the bit width, and `max_retries` is unbounded.
fn backoff_delay(base_ms: u64, attempt: u32) -> u64 {
    match 1u64.checked_shl(attempt) {
        Some(factor) => base_ms.saturating_mul(factor),
        None => u64::MAX,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ProviderError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails `failures` times, then answers.
    struct Flaky {
        failures: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl VisionDescriber for Flaky {
        async fn describe(&self, _: &str, _: &str) -> Result<String, ProviderError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(ProviderError::Api {
                    status: 429,
                    body: "rate limited".to_string(),
                })
            } else {
                Ok("a diagram of the system".to_string())
            }
        }
    }

    fn fast_config() -> IngestConfig {
        let mut c = IngestConfig::default();
        c.max_retries = 2;
        c.retry_backoff_ms = 1;
        c
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        assert_eq!(backoff_delay(500, 0), 500);
        assert_eq!(backoff_delay(500, 1), 1_000);
        assert_eq!(backoff_delay(500, 2), 2_000);
    }

    #[test]
    fn backoff_saturates_instead_of_overflowing() {
        assert_eq!(backoff_delay(500, 64), u64::MAX);
        assert_eq!(backoff_delay(500, u32::MAX), u64::MAX);
        assert_eq!(backoff_delay(u64::MAX, 1), u64::MAX);
        assert_eq!(backoff_delay(0, 3), 0);
    }

    #[tokio::test]
    async fn success_on_first_attempt_records_zero_retries() {
        let d: Arc<dyn VisionDescriber> =
            Arc::new(Flaky { failures: 0, calls: AtomicUsize::new(0) });
        let slot = describe_slot(&d, &fast_config(), 0, "page 1".into(), "p", "u".into()).await;
        assert_eq!(slot.text, "a diagram of the system");
        assert_eq!(slot.retries, 0);
        assert!(slot.error.is_none());
    }

    #[tokio::test]
    async fn transient_failures_are_retried_away() {
        let d: Arc<dyn VisionDescriber> =
            Arc::new(Flaky { failures: 2, calls: AtomicUsize::new(0) });
        let slot = describe_slot(&d, &fast_config(), 3, "page 4".into(), "p", "u".into()).await;
        assert_eq!(slot.text, "a diagram of the system");
        assert_eq!(slot.retries, 2);
        assert!(slot.error.is_none());
    }

    #[tokio::test]
    async fn exhausted_retries_degrade_in_place() {
        let d: Arc<dyn VisionDescriber> =
            Arc::new(Flaky { failures: 10, calls: AtomicUsize::new(0) });
        let slot = describe_slot(&d, &fast_config(), 1, "keyframe 2".into(), "p", "u".into()).await;
        assert_eq!(slot.index, 1);
        assert!(slot.text.starts_with("Error describing keyframe 2:"), "got {}", slot.text);
        assert_eq!(slot.retries, 2);
        match slot.error {
            Some(SlotError::DescribeFailed { ref label, retries, .. }) => {
                assert_eq!(label, "keyframe 2");
                assert_eq!(retries, 2);
            }
            ref other => panic!("expected DescribeFailed, got {other:?}"),
        }
    }
}
