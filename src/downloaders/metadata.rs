use std::time::Duration;

use vidqueue_core::error::DownloadError;
use vidqueue_core::models::media::VideoInfo;
use vidqueue_core::models::settings::AdvancedSettings;

use crate::downloaders::traits::VideoSource;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    fn delay_before(&self, attempt: u32) -> Duration {
        self.base_delay * attempt.saturating_sub(1)
    }
}

impl From<&AdvancedSettings> for RetryPolicy {
    fn from(advanced: &AdvancedSettings) -> Self {
        Self::new(
            advanced.max_retries,
            Duration::from_millis(advanced.retry_delay_ms),
        )
    }
}

/// Fetches metadata, retrying transient failures up to the policy bound.
pub async fn fetch_info_with_retry(
    source: &dyn VideoSource,
    id: &str,
    policy: RetryPolicy,
) -> Result<VideoInfo, DownloadError> {
    for attempt in 1..=policy.max_attempts {
        let delay = policy.delay_before(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match source.get_video(id).await {
            Ok(info) => return Ok(info),
            Err(e) => {
                tracing::warn!(
                    "metadata for {} unavailable (attempt {}/{}): {}",
                    id,
                    attempt,
                    policy.max_attempts,
                    e
                );
            }
        }
    }

    Err(DownloadError::RetryExhausted {
        id: id.to_string(),
        attempts: policy.max_attempts,
    })
}
