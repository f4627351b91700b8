pub mod metadata;
pub mod stream;
pub mod traits;
pub mod ytdl_process;

use std::path::PathBuf;
use std::sync::Arc;

use vidqueue_core::models::settings::{AppSettings, DownloaderBackend};

use crate::core::ytdlp::YtdlSource;
use metadata::RetryPolicy;
use traits::VideoDownloader;

pub fn build_downloader(
    settings: &AppSettings,
    ytdl: PathBuf,
    output_dir: PathBuf,
) -> anyhow::Result<Arc<dyn VideoDownloader>> {
    let source = Arc::new(YtdlSource::new(ytdl.clone()));
    let retry = RetryPolicy::from(&settings.advanced);
    let cleanup = settings.download.cleanup_fragments;

    let downloader: Arc<dyn VideoDownloader> = match settings.download.backend {
        DownloaderBackend::Process => Arc::new(
            ytdl_process::YtdlProcessDownloader::new(ytdl, source, output_dir, retry)
                .with_cleanup_fragments(cleanup),
        ),
        DownloaderBackend::Stream => Arc::new(
            stream::StreamDownloader::new(
                source,
                crate::core::direct_downloader::build_client()?,
                output_dir,
                retry,
            )
            .with_cleanup_fragments(cleanup),
        ),
    };

    tracing::info!("using {} downloader", downloader.name());
    Ok(downloader)
}
