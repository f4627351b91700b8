use std::future::IntoFuture;
use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use vidqueue_core::core::events::EventEmitter;
use vidqueue_core::fs_paths::{AppPaths, WorkingDirPaths};
use vidqueue_core::models::settings::AppSettings;

pub mod commands;
pub mod core;
pub mod downloaders;
pub mod storage;

#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<core::queue::JobQueue>,
    pub events: Arc<dyn EventEmitter>,
    pub default_quality: String,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn load_or_init_settings() -> AppSettings {
    let path = storage::config::settings_path();
    let mut settings = storage::config::load_settings(&path);
    if !path.exists() {
        match storage::config::save_settings(&path, &settings) {
            Ok(()) => tracing::info!("wrote default settings to {}", path.display()),
            Err(e) => tracing::warn!("could not write settings {}: {}", path.display(), e),
        }
    }
    storage::config::apply_env_overrides(&mut settings);
    settings
}

/// Resolves the `ytdl` executable, installing it when allowed. A failed
/// install is logged and the configured path is used anyway.
async fn prepare_ytdl(settings: &AppSettings, paths: &WorkingDirPaths) -> PathBuf {
    let configured = PathBuf::from(core::dependencies::bin_name(&settings.ytdl.executable));
    let target = if configured.is_absolute() {
        configured
    } else {
        paths.bin_dir().join(configured)
    };

    if settings.ytdl.auto_install {
        if let Err(e) =
            core::ytdlp::ensure_ytdl(&target, settings.ytdl.download_url.as_deref()).await
        {
            tracing::error!("ytdl install failed: {:#}", e);
        }
    }

    match core::dependencies::check_version(&target).await {
        Some(version) => tracing::info!("ytdl version: {}", version),
        None => tracing::warn!("ytdl not usable at {}", target.display()),
    }
    target
}

async fn shutdown_signal(cancel: CancellationToken) {
    tokio::select! {
        res = tokio::signal::ctrl_c() => match res {
            Ok(()) => {
                tracing::info!("shutting down");
                cancel.cancel();
            }
            Err(e) => {
                tracing::error!("failed to install Ctrl+C handler: {}", e);
                cancel.cancelled().await;
            }
        },
        _ = cancel.cancelled() => {}
    }
}

pub async fn serve(settings: AppSettings) -> anyhow::Result<()> {
    let paths = WorkingDirPaths::from_current_dir(&settings.download.output_dir)?;
    let ytdl = prepare_ytdl(&settings, &paths).await;
    let downloader = downloaders::build_downloader(&settings, ytdl, paths.downloads_dir())?;

    let state = AppState {
        queue: Arc::new(core::queue::JobQueue::new()),
        events: Arc::new(core::events::LogEmitter),
        default_quality: settings.download.default_quality.clone(),
    };

    let cancel = CancellationToken::new();
    let mut worker = tokio::spawn(core::queue::run_worker(
        state.queue.clone(),
        downloader,
        state.events.clone(),
        cancel.clone(),
    ));

    let listener = tokio::net::TcpListener::bind(settings.server.address.as_str()).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);

    let app = commands::downloads::router(state);
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        res = &mut server => {
            cancel.cancel();
            res?;
            worker.await??;
        }
        res = &mut worker => {
            res??;
            if !cancel.is_cancelled() {
                anyhow::bail!("worker exited unexpectedly");
            }
            server.await?;
        }
    }
    Ok(())
}

pub fn run() -> anyhow::Result<()> {
    init_tracing();
    let settings = load_or_init_settings();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve(settings))
}
