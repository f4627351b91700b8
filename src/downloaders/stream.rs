use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use vidqueue_core::error::DownloadError;
use vidqueue_core::models::media::{DownloadResult, Format};

use crate::core::dependencies;
use crate::core::direct_downloader::{self, StreamOutcome};
use crate::core::extension::pick_extension;
use crate::core::ffmpeg;
use crate::core::filename::output_stem;
use crate::core::ytdlp::describe_duration;
use crate::core::quality::{plan_formats, FormatPlan, QualityTier};
use crate::downloaders::metadata::{fetch_info_with_retry, RetryPolicy};
use crate::downloaders::traits::{VideoDownloader, VideoSource};

const COMPOSITE_MEDIA_TYPE: &str = "video/mp4";

/// Downloads streams in-process over HTTP; only muxing is handed to ffmpeg.
pub struct StreamDownloader {
    source: Arc<dyn VideoSource>,
    client: reqwest::Client,
    output_dir: PathBuf,
    retry: RetryPolicy,
    ffmpeg_program: String,
    cleanup_fragments: bool,
}

impl StreamDownloader {
    pub fn new(
        source: Arc<dyn VideoSource>,
        client: reqwest::Client,
        output_dir: impl Into<PathBuf>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            source,
            client,
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

    async fn download_single(&self, stem: &str, format: &Format) -> Result<PathBuf, DownloadError> {
        let staging = self.output_dir.join(format!("{}.f{}", stem, format.format_id));
        let outcome = direct_downloader::download_to_file(&self.client, &format.url, &staging).await?;

        let media_type = declared_or(&outcome, format);
        let target = self.output_dir.join(format!("{}{}", stem, pick_extension(&media_type)));
        tokio::fs::rename(&staging, &target).await?;
        Ok(target)
    }

    async fn download_composite(
        &self,
        stem: &str,
        video: &Format,
        audio: &Format,
    ) -> Result<PathBuf, DownloadError> {
        let ffmpeg = dependencies::require_tool(&self.ffmpeg_program).await?;

        let video_path = self.output_dir.join(format!("{}.f{}.m4v", stem, video.format_id));
        let audio_path = self.output_dir.join(format!("{}.f{}.m4a", stem, audio.format_id));
        let target = self
            .output_dir
            .join(format!("{}{}", stem, pick_extension(COMPOSITE_MEDIA_TYPE)));

        let result: Result<(), DownloadError> = async {
            direct_downloader::download_to_file(&self.client, &video.url, &video_path).await?;
            direct_downloader::download_to_file(&self.client, &audio.url, &audio_path).await?;
            ffmpeg::mux_video_audio(&ffmpeg, &video_path, &audio_path, &target).await
        }
        .await;

        if self.cleanup_fragments {
            remove_quietly(&video_path).await;
            remove_quietly(&audio_path).await;
        }

        match result {
            Ok(()) => Ok(target),
            Err(e) => {
                // ffmpeg runs with -y, so a failed mux can leave a partial file.
                remove_quietly(&target).await;
                Err(e)
            }
        }
    }
}

fn declared_or(outcome: &StreamOutcome, format: &Format) -> String {
    outcome
        .content_type
        .clone()
        .unwrap_or_else(|| format.mime_type.clone())
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("could not remove {}: {}", path.display(), e);
        }
    }
}

#[async_trait]
impl VideoDownloader for StreamDownloader {
    fn name(&self) -> &str {
        "stream"
    }

    async fn fetch_video(&self, id: &str, quality: &str) -> Result<DownloadResult, DownloadError> {
        let info = fetch_info_with_retry(self.source.as_ref(), id, self.retry).await?;

        let tier = QualityTier::from_hint(quality);
        let plan = plan_formats(&info.formats, tier)
            .ok_or_else(|| DownloadError::NoFormats(id.to_string()))?;

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let stem = output_stem(&info.title, id);

        tracing::info!(
            "video '{}' by {} ({}, {}) tier {:?}, muxing: {}",
            info.title,
            info.author,
            id,
            describe_duration(info.duration_seconds),
            tier,
            plan.needs_muxing()
        );

        let file_path = match &plan {
            FormatPlan::Single(format) => self.download_single(&stem, format).await?,
            FormatPlan::Composite { video, audio } => {
                self.download_composite(&stem, video, audio).await?
            }
        };

        let meta = tokio::fs::metadata(&file_path).await?;
        Ok(DownloadResult {
            file_path,
            file_size_bytes: meta.len(),
        })
    }
}
