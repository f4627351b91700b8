use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use vidqueue_core::error::DownloadError;
use vidqueue_core::models::media::DownloadResult;

use crate::core::dependencies;
use crate::core::filename::output_stem;
use crate::core::quality::QualityTier;
use crate::core::ytdlp;
use crate::downloaders::metadata::{fetch_info_with_retry, RetryPolicy};
use crate::downloaders::traits::{VideoDownloader, VideoSource};

/// Hands the whole download to the `ytdl` executable.
pub struct YtdlProcessDownloader {
    ytdl: PathBuf,
    source: Arc<dyn VideoSource>,
    output_dir: PathBuf,
    retry: RetryPolicy,
    ffmpeg_program: String,
    cleanup_fragments: bool,
}

impl YtdlProcessDownloader {
    pub fn new(
        ytdl: impl Into<PathBuf>,
        source: Arc<dyn VideoSource>,
        output_dir: impl Into<PathBuf>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            ytdl: ytdl.into(),
            source,
            output_dir: output_dir.into(),
            retry,
            ffmpeg_program: "ffmpeg".into(),
            cleanup_fragments: true,
        }
    }

    pub fn with_ffmpeg_program(mut self, program: impl Into<String>) -> Self {
        self.ffmpeg_program = program.into();
        self
    }

    pub fn with_cleanup_fragments(mut self, cleanup: bool) -> Self {
        self.cleanup_fragments = cleanup;
        self
    }

    fn output_template(&self, stem: &str) -> String {
        self.output_dir
            .join(format!("{}.%(ext)s", ytdlp::escape_template(stem)))
            .to_string_lossy()
            .to_string()
    }
}

#[async_trait]
impl VideoDownloader for YtdlProcessDownloader {
    fn name(&self) -> &str {
        "process"
    }

    async fn fetch_video(&self, id: &str, quality: &str) -> Result<DownloadResult, DownloadError> {
        // The selector always asks for a merged pair, so ffmpeg must be there.
        dependencies::require_tool(&self.ffmpeg_program).await?;

        let info = fetch_info_with_retry(self.source.as_ref(), id, self.retry).await?;
        let stem = output_stem(&info.title, id);
        let selector = QualityTier::from_hint(quality).format_selector();

        tokio::fs::create_dir_all(&self.output_dir).await?;
        tracing::info!(
            "ytdl fetching '{}' by {} ({}, {}) with -f {}",
            info.title,
            info.author,
            id,
            ytdlp::describe_duration(info.duration_seconds),
            selector
        );

        let downloaded =
            ytdlp::download_video(&self.ytdl, id, &self.output_template(&stem), &selector).await;

        if self.cleanup_fragments {
            match ytdlp::cleanup_fragments(&self.output_dir, &stem).await {
                Ok(0) => {}
                Ok(n) => tracing::debug!("removed {} fragments of {}", n, id),
                Err(e) => tracing::warn!("fragment cleanup for {} failed: {}", id, e),
            }
        }
        downloaded?;

        let file_path = ytdlp::find_downloaded_file(&self.output_dir, &stem).await?;
        let meta = tokio::fs::metadata(&file_path).await?;
        Ok(DownloadResult {
            file_path,
            file_size_bytes: meta.len(),
        })
    }
}
