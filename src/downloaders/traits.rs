use async_trait::async_trait;

use vidqueue_core::error::DownloadError;
use vidqueue_core::models::media::{DownloadResult, VideoInfo};

/// Performs one download attempt for a job. The worker does not care how.
#[async_trait]
pub trait VideoDownloader: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch_video(&self, id: &str, quality: &str) -> Result<DownloadResult, DownloadError>;
}

/// Resolves a video id to its title and stream list.
#[async_trait]
pub trait VideoSource: Send + Sync {
    async fn get_video(&self, id: &str) -> anyhow::Result<VideoInfo>;
}
