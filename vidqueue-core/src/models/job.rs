use serde::{Deserialize, Serialize};

/// A pending download request. Identity is the video id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub quality: String,
}

impl Job {
    pub fn new(id: impl Into<String>, quality: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            quality: quality.into(),
        }
    }
}

pub fn render_job_listing(jobs: &[Job]) -> String {
    let mut out = String::from("Download videos list: \n");
    for job in jobs {
        out.push_str(&format!(
            "video id: {}, video quality: {}\n",
            job.id, job.quality
        ));
    }
    out
}
