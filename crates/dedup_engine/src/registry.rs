use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::{Duration, Instant};

use dedup_core::{ArtifactPart, JobKind, JobStatus, MAX_RUNNING_PERCENT};
use engine_logging::{engine_debug, engine_error, engine_info, engine_trace, engine_warn};

use crate::artifact::Artifact;
use crate::dedup::ProgressSink;
use crate::types::{
    Download, EngineError, EngineEvent, FailureKind, JobFailure, JobId, JobSummary,
    NotFoundReason, PartSummary, PollStatus,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct PartSlot {
    part: ArtifactPart,
    artifact: Option<Artifact>,
}

enum RecordState {
    Pending,
    Running,
    Ready {
        summary: JobSummary,
        slots: Vec<PartSlot>,
    },
    Consumed {
        summary: JobSummary,
    },
    Failed(JobFailure),
}

impl RecordState {
    fn status(&self) -> JobStatus {
        match self {
            RecordState::Pending => JobStatus::Pending,
            RecordState::Running => JobStatus::Running,
            RecordState::Ready { .. } => JobStatus::Ready,
            RecordState::Consumed { .. } => JobStatus::Consumed,
            RecordState::Failed(_) => JobStatus::Failed,
        }
    }
}

/// One job as seen by the registry. Only the job's own worker writes
/// progress and the result; retrieval moves it to consumed.
pub(crate) struct JobRecord {
    id: JobId,
    kind: JobKind,
    /// Set once the job turns ready or failed; reaping ages from here.
    settled_at: OnceLock<Instant>,
    progress: AtomicU8,
    state: Mutex<RecordState>,
}

impl JobRecord {
    fn new(id: JobId, kind: JobKind) -> Self {
        Self {
            id,
            kind,
            settled_at: OnceLock::new(),
            progress: AtomicU8::new(0),
            state: Mutex::new(RecordState::Pending),
        }
    }

    pub(crate) fn id(&self) -> JobId {
        self.id
    }

    pub(crate) fn kind(&self) -> JobKind {
        self.kind
    }

    /// Applies `next` if the state machine allows it; logs and drops it
    /// otherwise.
    fn advance(&self, state: &mut RecordState, next: RecordState) -> bool {
        let (from, to) = (state.status(), next.status());
        if !from.can_advance_to(to) {
            engine_error!(
                "job {} rejected transition {:?} -> {:?}",
                self.id,
                from,
                to
            );
            return false;
        }
        if matches!(to, JobStatus::Ready | JobStatus::Failed) {
            let _ = self.settled_at.set(Instant::now());
        }
        *state = next;
        true
    }

    pub(crate) fn mark_running(&self) {
        let mut state = lock(&self.state);
        if self.advance(&mut state, RecordState::Running) {
            engine_debug!("job {} running", self.id);
        }
    }

    /// Raises the progress estimate; never lowers it and never reaches 100.
    /// Returns the new value when it changed.
    pub(crate) fn raise_progress(&self, percent: u8) -> Option<u8> {
        let percent = percent.min(MAX_RUNNING_PERCENT);
        let previous = self.progress.fetch_max(percent, Ordering::AcqRel);
        (percent > previous).then_some(percent)
    }

    pub(crate) fn complete(&self, artifacts: Vec<(ArtifactPart, Artifact)>) -> Option<JobSummary> {
        let summary = JobSummary {
            kind: self.kind,
            parts: artifacts
                .iter()
                .map(|(part, artifact)| PartSummary {
                    part: *part,
                    line_count: artifact.line_count(),
                })
                .collect(),
        };
        let slots = artifacts
            .into_iter()
            .map(|(part, artifact)| PartSlot {
                part,
                artifact: Some(artifact),
            })
            .collect();

        let mut state = lock(&self.state);
        let ready = RecordState::Ready {
            summary: summary.clone(),
            slots,
        };
        if !self.advance(&mut state, ready) {
            return None;
        }
        // Published only once the artifacts are reachable through `take`.
        self.progress.store(100, Ordering::Release);
        Some(summary)
    }

    pub(crate) fn fail(&self, failure: JobFailure) -> bool {
        let mut state = lock(&self.state);
        self.advance(&mut state, RecordState::Failed(failure))
    }

    fn poll(&self) -> PollStatus {
        let state = lock(&self.state);
        match &*state {
            RecordState::Pending | RecordState::Running => PollStatus::Processing {
                progress: self
                    .progress
                    .load(Ordering::Acquire)
                    .min(MAX_RUNNING_PERCENT),
            },
            RecordState::Ready { summary, .. } => PollStatus::Ready(summary.clone()),
            RecordState::Consumed { summary } => PollStatus::Consumed(summary.clone()),
            RecordState::Failed(failure) => PollStatus::Failed(failure.clone()),
        }
    }

    fn take(&self, part: Option<ArtifactPart>) -> Result<Download, EngineError> {
        let part = match part {
            Some(part) => part,
            None => match self.kind.parts() {
                [only] => *only,
                _ => {
                    return Err(EngineError::InvalidInput(format!(
                        "{} jobs need an explicit result part",
                        self.kind
                    )))
                }
            },
        };
        if !self.kind.parts().contains(&part) {
            return Err(EngineError::not_found(self.id, NotFoundReason::UnknownPart));
        }

        let mut state = lock(&self.state);
        let (artifact, drained, summary) = match &mut *state {
            RecordState::Pending | RecordState::Running => {
                return Err(EngineError::not_found(self.id, NotFoundReason::NotReady))
            }
            RecordState::Consumed { .. } => {
                return Err(EngineError::not_found(self.id, NotFoundReason::Consumed))
            }
            RecordState::Failed(_) => {
                return Err(EngineError::not_found(self.id, NotFoundReason::Failed))
            }
            RecordState::Ready { summary, slots } => {
                let artifact = slots
                    .iter_mut()
                    .find(|slot| slot.part == part)
                    .and_then(|slot| slot.artifact.take())
                    .ok_or_else(|| EngineError::not_found(self.id, NotFoundReason::Consumed))?;
                let drained = slots.iter().all(|slot| slot.artifact.is_none());
                (artifact, drained, summary.clone())
            }
        };
        if drained {
            self.advance(&mut state, RecordState::Consumed { summary });
        }
        drop(state);

        let line_count = artifact.line_count();
        let reader = artifact.open().map_err(|err| {
            engine_error!("job {} failed to open {} result: {}", self.id, part, err);
            EngineError::Artifact(err)
        })?;
        Ok(Download {
            reader,
            filename: part.suggested_filename(line_count),
            line_count,
        })
    }
}

/// Owns every job record of one engine.
pub struct JobRegistry {
    next_id: AtomicU64,
    jobs: Mutex<HashMap<JobId, Arc<JobRecord>>>,
    subscribers: Mutex<Vec<mpsc::Sender<EngineEvent>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            jobs: Mutex::new(HashMap::new()),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn register(&self, kind: JobKind) -> Arc<JobRecord> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let record = Arc::new(JobRecord::new(id, kind));
        lock(&self.jobs).insert(id, record.clone());
        record
    }

    fn get(&self, job_id: JobId) -> Option<Arc<JobRecord>> {
        lock(&self.jobs).get(&job_id).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.jobs).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn poll(&self, job_id: JobId) -> PollStatus {
        match self.get(job_id) {
            Some(record) => record.poll(),
            None => PollStatus::NotFound,
        }
    }

    /// Hands over one artifact. Only the first caller per job and part
    /// succeeds; the slot is emptied under the record lock.
    pub fn take(&self, job_id: JobId, part: Option<ArtifactPart>) -> Result<Download, EngineError> {
        let record = self
            .get(job_id)
            .ok_or_else(|| EngineError::not_found(job_id, NotFoundReason::Unknown))?;
        let download = record.take(part)?;
        engine_info!(
            "job {} retrieved {} ({} lines)",
            job_id,
            download.filename,
            download.line_count
        );
        Ok(download)
    }

    /// Evicts records that settled at least `ttl` ago. Pending and running
    /// jobs never expire. Dropping an unretrieved record deletes its
    /// artifacts.
    pub fn reap(&self, ttl: Duration) -> usize {
        let now = Instant::now();
        let mut jobs = lock(&self.jobs);
        let before = jobs.len();
        jobs.retain(|_, record| match record.settled_at.get() {
            Some(settled) => now.duration_since(*settled) < ttl,
            None => true,
        });
        let reaped = before - jobs.len();
        if reaped > 0 {
            engine_info!("reaped {} expired jobs", reaped);
        }
        reaped
    }

    pub fn subscribe(&self) -> mpsc::Receiver<EngineEvent> {
        let (tx, rx) = mpsc::channel();
        lock(&self.subscribers).push(tx);
        rx
    }

    pub(crate) fn publish(&self, event: EngineEvent) {
        let mut subscribers = lock(&self.subscribers);
        if subscribers.is_empty() {
            return;
        }
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub(crate) fn finish(
        &self,
        record: &JobRecord,
        outcome: Result<Vec<(ArtifactPart, Artifact)>, JobFailure>,
    ) {
        let result = match outcome {
            Ok(artifacts) => match record.complete(artifacts) {
                Some(summary) => {
                    engine_info!("job {} ready: {:?}", record.id(), summary.parts);
                    Ok(summary)
                }
                None => return,
            },
            Err(failure) => {
                engine_warn!("job {} failed: {}", record.id(), failure);
                if !record.fail(failure.clone()) {
                    return;
                }
                Err(failure)
            }
        };
        self.publish(EngineEvent::JobCompleted {
            job_id: record.id(),
            result,
        });
    }

    pub(crate) fn crashed(&self, record: &JobRecord, message: String) {
        self.finish(record, Err(JobFailure::new(FailureKind::Crashed, message)));
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Progress sink bound to one job record.
pub(crate) struct RecordProgress {
    pub(crate) registry: Arc<JobRegistry>,
    pub(crate) record: Arc<JobRecord>,
}

impl ProgressSink for RecordProgress {
    fn report(&self, percent: u8) {
        if let Some(percent) = self.record.raise_progress(percent) {
            engine_trace!("job {} progress {}%", self.record.id(), percent);
            self.registry.publish(EngineEvent::Progress {
                job_id: self.record.id(),
                percent,
            });
        }
    }
}
