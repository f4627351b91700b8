use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, Notify, Semaphore};
use tokio_util::sync::CancellationToken;

use vidqueue_core::core::events::{EventEmitter, JobEvent, JobPhase};
use vidqueue_core::models::job::Job;

use crate::downloaders::traits::VideoDownloader;

struct PendingJob {
    quality: String,
    seq: u64,
    in_flight: bool,
}

#[derive(Default)]
struct QueueState {
    jobs: HashMap<String, PendingJob>,
    next_seq: u64,
}

/// A job taken by a worker; `seq` identifies the submission it came from.
#[derive(Debug, Clone)]
pub struct Claim {
    pub job: Job,
    seq: u64,
}

/// Pending jobs keyed by video id, plus the one-slot gate every download
/// must hold.
pub struct JobQueue {
    state: Mutex<QueueState>,
    wake: Notify,
    gate: Semaphore,
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl JobQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            wake: Notify::new(),
            gate: Semaphore::new(1),
        }
    }

    /// Inserts or overwrites the job for `id` and returns the current listing.
    pub async fn enqueue(&self, id: String, quality: String) -> Vec<Job> {
        let listing = {
            let mut state = self.state.lock().await;
            state.next_seq += 1;
            let seq = state.next_seq;
            state.jobs.insert(
                id,
                PendingJob {
                    quality,
                    seq,
                    in_flight: false,
                },
            );
            listing_of(&state)
        };
        self.wake.notify_one();
        listing
    }

    pub async fn snapshot(&self) -> Vec<Job> {
        listing_of(&*self.state.lock().await)
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.jobs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Oldest job nobody is working on, marked in flight.
    pub async fn try_claim(&self) -> Option<Claim> {
        let mut state = self.state.lock().await;
        let (id, pending) = state
            .jobs
            .iter_mut()
            .filter(|(_, p)| !p.in_flight)
            .min_by_key(|(_, p)| p.seq)?;
        pending.in_flight = true;
        Some(Claim {
            job: Job::new(id.clone(), pending.quality.clone()),
            seq: pending.seq,
        })
    }

    /// Waits until a job can be claimed.
    pub async fn claim(&self) -> Claim {
        loop {
            if let Some(claim) = self.try_claim().await {
                return claim;
            }
            self.wake.notified().await;
        }
    }

    /// Drops the entry after an attempt, unless the id was submitted again
    /// while it was running; in that case the new submission stays pending.
    pub async fn complete(&self, claim: &Claim) -> bool {
        let mut state = self.state.lock().await;
        let resubmitted = match state.jobs.get(&claim.job.id) {
            Some(p) if p.seq == claim.seq => false,
            Some(_) => true,
            None => return false,
        };
        if resubmitted {
            drop(state);
            self.wake.notify_one();
            return false;
        }
        state.jobs.remove(&claim.job.id);
        true
    }
}

fn listing_of(state: &QueueState) -> Vec<Job> {
    let mut entries: Vec<(&String, &PendingJob)> = state.jobs.iter().collect();
    entries.sort_by_key(|(_, p)| p.seq);
    entries
        .into_iter()
        .map(|(id, p)| Job::new(id.clone(), p.quality.clone()))
        .collect()
}

fn emit(events: &dyn EventEmitter, job: &Job, phase: JobPhase) {
    events.emit_job_event(&JobEvent {
        id: job.id.clone(),
        quality: job.quality.clone(),
        phase,
    });
}

pub async fn process_job(
    queue: &JobQueue,
    downloader: &dyn VideoDownloader,
    events: &dyn EventEmitter,
    claim: &Claim,
) -> anyhow::Result<()> {
    let permit = queue.gate.acquire().await?;
    emit(events, &claim.job, JobPhase::Started);

    let phase = match downloader.fetch_video(&claim.job.id, &claim.job.quality).await {
        Ok(result) => JobPhase::Finished {
            file_path: result.file_path,
            file_size_bytes: result.file_size_bytes,
        },
        Err(e) => JobPhase::Failed {
            message: e.to_string(),
        },
    };
    emit(events, &claim.job, phase);

    drop(permit);
    queue.complete(claim).await;
    Ok(())
}

/// Services jobs one at a time until `cancel` fires. A download already
/// running is allowed to finish.
pub async fn run_worker(
    queue: Arc<JobQueue>,
    downloader: Arc<dyn VideoDownloader>,
    events: Arc<dyn EventEmitter>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    tracing::info!("worker started with {} downloader", downloader.name());
    loop {
        let claim = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("worker stopping");
                return Ok(());
            }
            claim = queue.claim() => claim,
        };
        process_job(&queue, downloader.as_ref(), events.as_ref(), &claim).await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex as StdMutex;
    use std::time::{Duration, Instant};

    use async_trait::async_trait;

    use crate::core::events::LogEmitter;
    use vidqueue_core::error::DownloadError;
    use vidqueue_core::models::media::DownloadResult;

    /// Records the execution window of every call.
    struct RecordingDownloader {
        delay: Duration,
        fail_ids: Vec<String>,
        windows: StdMutex<Vec<(String, Instant, Instant)>>,
    }

    impl RecordingDownloader {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                fail_ids: Vec::new(),
                windows: StdMutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.windows.lock().unwrap().iter().map(|(id, _, _)| id.clone()).collect()
        }
    }

    #[async_trait]
    impl VideoDownloader for RecordingDownloader {
        fn name(&self) -> &str {
            "recording"
        }

        async fn fetch_video(&self, id: &str, _quality: &str) -> Result<DownloadResult, DownloadError> {
            let start = Instant::now();
            tokio::time::sleep(self.delay).await;
            let end = Instant::now();
            self.windows.lock().unwrap().push((id.to_string(), start, end));
            if self.fail_ids.iter().any(|f| f == id) {
                return Err(DownloadError::NoFormats(id.to_string()));
            }
            Ok(DownloadResult {
                file_path: PathBuf::from(format!("Downloads/{}.mp4", id)),
                file_size_bytes: 1,
            })
        }
    }

    #[derive(Default)]
    struct CollectingEmitter {
        events: StdMutex<Vec<JobEvent>>,
    }

    impl EventEmitter for CollectingEmitter {
        fn emit_job_event(&self, event: &JobEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    async fn wait_until_empty(queue: &JobQueue) {
        tokio::time::timeout(Duration::from_secs(10), async {
            while !queue.is_empty().await {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("queue drained");
    }

    #[tokio::test]
    async fn resubmission_overwrites_quality() {
        let queue = JobQueue::new();
        queue.enqueue("aaaaaaaaaaa".into(), "hd720".into()).await;
        let listing = queue.enqueue("aaaaaaaaaaa".into(), "1080".into()).await;
        assert_eq!(listing, vec![Job::new("aaaaaaaaaaa", "1080")]);
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn listing_follows_submission_order() {
        let queue = JobQueue::new();
        queue.enqueue("ccccccccccc".into(), "q".into()).await;
        queue.enqueue("aaaaaaaaaaa".into(), "q".into()).await;
        queue.enqueue("bbbbbbbbbbb".into(), "q".into()).await;
        let ids: Vec<String> = queue.snapshot().await.into_iter().map(|j| j.id).collect();
        assert_eq!(ids, vec!["ccccccccccc", "aaaaaaaaaaa", "bbbbbbbbbbb"]);
    }

    #[tokio::test]
    async fn claimed_jobs_are_not_handed_out_twice() {
        let queue = JobQueue::new();
        queue.enqueue("aaaaaaaaaaa".into(), "q".into()).await;
        let first = queue.try_claim().await.unwrap();
        assert_eq!(first.job.id, "aaaaaaaaaaa");
        assert!(queue.try_claim().await.is_none());
        // still listed while in flight
        assert_eq!(queue.snapshot().await.len(), 1);
        assert!(queue.complete(&first).await);
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn resubmission_during_download_survives_completion() {
        let queue = JobQueue::new();
        queue.enqueue("aaaaaaaaaaa".into(), "hd720".into()).await;
        let claim = queue.try_claim().await.unwrap();
        queue.enqueue("aaaaaaaaaaa".into(), "1080".into()).await;

        assert!(!queue.complete(&claim).await);
        let again = queue.try_claim().await.unwrap();
        assert_eq!(again.job, Job::new("aaaaaaaaaaa", "1080"));
    }

    #[tokio::test]
    async fn claim_waits_for_enqueue() {
        let queue = Arc::new(JobQueue::new());
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.claim().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        queue.enqueue("aaaaaaaaaaa".into(), "q".into()).await;
        let claim = tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .expect("woken by enqueue")
            .unwrap();
        assert_eq!(claim.job.id, "aaaaaaaaaaa");
    }

    #[tokio::test]
    async fn worker_drains_queue_and_reports_failures() {
        let queue = Arc::new(JobQueue::new());
        let mut dl = RecordingDownloader::new(Duration::from_millis(1));
        dl.fail_ids.push("bbbbbbbbbbb".into());
        let dl = Arc::new(dl);
        let events = Arc::new(CollectingEmitter::default());
        let cancel = CancellationToken::new();

        let worker = tokio::spawn(run_worker(
            queue.clone(),
            dl.clone(),
            events.clone(),
            cancel.clone(),
        ));

        queue.enqueue("aaaaaaaaaaa".into(), "hd720".into()).await;
        queue.enqueue("bbbbbbbbbbb".into(), "1080".into()).await;
        wait_until_empty(&queue).await;

        cancel.cancel();
        worker.await.unwrap().unwrap();

        assert_eq!(dl.calls(), vec!["aaaaaaaaaaa", "bbbbbbbbbbb"]);
        let events = events.events.lock().unwrap();
        let phases: Vec<(&str, &JobPhase)> =
            events.iter().map(|e| (e.id.as_str(), &e.phase)).collect();
        assert_eq!(phases.len(), 4);
        assert!(matches!(phases[1], ("aaaaaaaaaaa", JobPhase::Finished { .. })));
        assert!(matches!(phases[3], ("bbbbbbbbbbb", JobPhase::Failed { .. })));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn gate_prevents_overlapping_downloads() {
        let queue = Arc::new(JobQueue::new());
        let dl = Arc::new(RecordingDownloader::new(Duration::from_millis(15)));
        let cancel = CancellationToken::new();

        // Extra workers only contend for the gate.
        let workers: Vec<_> = (0..3)
            .map(|_| {
                tokio::spawn(run_worker(
                    queue.clone(),
                    dl.clone(),
                    Arc::new(LogEmitter),
                    cancel.clone(),
                ))
            })
            .collect();

        let submitters: Vec<_> = (0..8)
            .map(|i| {
                let queue = queue.clone();
                tokio::spawn(async move {
                    queue.enqueue(format!("video{:06}", i), "hd720".into()).await;
                })
            })
            .collect();
        for s in submitters {
            s.await.unwrap();
        }

        wait_until_empty(&queue).await;
        cancel.cancel();
        for w in workers {
            w.await.unwrap().unwrap();
        }

        let mut windows = dl.windows.lock().unwrap().clone();
        assert_eq!(windows.len(), 8);
        windows.sort_by_key(|(_, start, _)| *start);
        for pair in windows.windows(2) {
            let (_, _, prev_end) = &pair[0];
            let (_, next_start, _) = &pair[1];
            assert!(next_start >= prev_end, "downloads overlapped");
        }
    }

    #[tokio::test]
    async fn cancelled_idle_worker_returns() {
        let queue = Arc::new(JobQueue::new());
        let cancel = CancellationToken::new();
        let worker = tokio::spawn(run_worker(
            queue,
            Arc::new(RecordingDownloader::new(Duration::ZERO)),
            Arc::new(LogEmitter),
            cancel.clone(),
        ));
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), worker)
            .await
            .expect("worker stopped")
            .unwrap()
            .unwrap();
    }
}
