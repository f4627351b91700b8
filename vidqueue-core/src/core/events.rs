use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum JobPhase {
    Queued,
    Started,
    Finished {
        file_path: PathBuf,
        file_size_bytes: u64,
    },
    Failed {
        message: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct JobEvent {
    pub id: String,
    pub quality: String,
    pub phase: JobPhase,
}

pub trait EventEmitter: Send + Sync + 'static {
    fn emit_job_event(&self, event: &JobEvent);
}
