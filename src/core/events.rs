use vidqueue_core::core::events::{EventEmitter, JobEvent, JobPhase};

/// Emits job lifecycle events as log lines.
#[derive(Clone, Default)]
pub struct LogEmitter;

impl EventEmitter for LogEmitter {
    fn emit_job_event(&self, event: &JobEvent) {
        match &event.phase {
            JobPhase::Queued => {
                tracing::info!("video: {} queued, quality: {}", event.id, event.quality)
            }
            JobPhase::Started => tracing::info!("video: {} download started", event.id),
            JobPhase::Finished {
                file_path,
                file_size_bytes,
            } => tracing::info!(
                "video: {} download done: {} ({} bytes)",
                event.id,
                file_path.display(),
                file_size_bytes
            ),
            JobPhase::Failed { message } => {
                tracing::error!("video: {} download failed: {}", event.id, message)
            }
        }
    }
}
