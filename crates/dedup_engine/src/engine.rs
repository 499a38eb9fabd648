use std::sync::{mpsc, Arc};

use dedup_core::{ArtifactPart, JobKind, Validator};
use engine_logging::{engine_debug, engine_info};
use tokio::runtime::Runtime;

use crate::config::EngineConfig;
use crate::dedup::{self, DedupContext};
use crate::registry::{JobRecord, JobRegistry, RecordProgress};
use crate::source::{DedupError, InputSource};
use crate::types::{
    Download, EngineError, EngineEvent, FailureKind, JobFailure, JobId, PollStatus,
};

/// Entry point for submitting, polling and retrieving dedup jobs.
///
/// Each job runs on the runtime's blocking pool; `poll` and `retrieve` never
/// wait for a computation.
pub struct EngineHandle {
    runtime: Runtime,
    registry: Arc<JobRegistry>,
    validator: Arc<Validator>,
    config: Arc<EngineConfig>,
}

impl EngineHandle {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.worker_threads.max(1))
            .max_blocking_threads(config.max_parallel_jobs.max(1))
            .thread_name("dedup-worker")
            .enable_time()
            .build()?;
        let registry = Arc::new(JobRegistry::new());
        let validator = Arc::new(Validator::new(config.validator.clone()));

        if let Some(ttl) = config.job_ttl() {
            let registry = Arc::downgrade(&registry);
            let period = config.reap_interval();
            runtime.spawn(async move {
                let start = tokio::time::Instant::now() + period;
                let mut ticker = tokio::time::interval_at(start, period);
                loop {
                    ticker.tick().await;
                    match registry.upgrade() {
                        Some(registry) => {
                            registry.reap(ttl);
                        }
                        None => break,
                    }
                }
            });
        }

        Ok(Self {
            runtime,
            registry,
            validator,
            config: Arc::new(config),
        })
    }

    pub fn submit_merge(&self, sources: Vec<InputSource>) -> Result<JobId, EngineError> {
        self.submit(JobKind::Merge, sources)
    }

    pub fn submit_compare(
        &self,
        source_a: InputSource,
        source_b: InputSource,
    ) -> Result<JobId, EngineError> {
        self.submit(JobKind::Compare, vec![source_a, source_b])
    }

    pub fn submit_dedup(&self, source: InputSource) -> Result<JobId, EngineError> {
        self.submit(JobKind::SingleDedup, vec![source])
    }

    /// Registers a pending job and starts its computation in the background.
    pub fn submit(&self, kind: JobKind, sources: Vec<InputSource>) -> Result<JobId, EngineError> {
        let inputs = JobInputs::new(kind, sources)?;

        let record = self.registry.register(kind);
        let job_id = record.id();
        engine_info!(
            "job {} submitted: kind={} inputs={}",
            job_id,
            kind,
            inputs.len()
        );

        let registry = self.registry.clone();
        let validator = self.validator.clone();
        let config = self.config.clone();
        self.runtime.spawn(async move {
            let worker_registry = registry.clone();
            let worker_record = record.clone();
            let joined = tokio::task::spawn_blocking(move || {
                run_job(&worker_registry, worker_record, &validator, &config, inputs)
            })
            .await;
            if let Err(err) = joined {
                registry.crashed(&record, err.to_string());
            }
        });

        Ok(job_id)
    }

    pub fn poll(&self, job_id: JobId) -> PollStatus {
        self.registry.poll(job_id)
    }

    /// Takes the artifact of a ready job. `part` is required for compare jobs.
    pub fn retrieve(
        &self,
        job_id: JobId,
        part: Option<ArtifactPart>,
    ) -> Result<Download, EngineError> {
        self.registry.take(job_id, part)
    }

    pub fn subscribe(&self) -> mpsc::Receiver<EngineEvent> {
        self.registry.subscribe()
    }

    /// Runs one reaping pass now, using the configured TTL.
    pub fn reap_expired(&self) -> usize {
        match self.config.job_ttl() {
            Some(ttl) => self.registry.reap(ttl),
            None => 0,
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }
}

/// Inputs of one job, already checked against its kind.
enum JobInputs {
    Merge(Vec<InputSource>),
    Single(InputSource),
    Compare(InputSource, InputSource),
}

impl JobInputs {
    fn new(kind: JobKind, sources: Vec<InputSource>) -> Result<Self, EngineError> {
        let count = sources.len();
        if !kind.accepts_inputs(count) {
            return Err(EngineError::InvalidInput(match kind {
                JobKind::Merge => "merge needs at least one input".to_string(),
                JobKind::Compare => format!("compare needs exactly two inputs, got {count}"),
                JobKind::SingleDedup => format!("dedup needs exactly one input, got {count}"),
            }));
        }
        let mut sources = sources.into_iter();
        let inputs = match (kind, sources.next(), sources.next()) {
            (JobKind::Merge, Some(first), second) => {
                JobInputs::Merge(std::iter::once(first).chain(second).chain(sources).collect())
            }
            (JobKind::SingleDedup, Some(only), None) => JobInputs::Single(only),
            (JobKind::Compare, Some(a), Some(b)) => JobInputs::Compare(a, b),
            _ => {
                return Err(EngineError::InvalidInput(format!(
                    "{kind} cannot take {count} inputs"
                )))
            }
        };
        Ok(inputs)
    }

    fn len(&self) -> usize {
        match self {
            JobInputs::Merge(sources) => sources.len(),
            JobInputs::Single(_) => 1,
            JobInputs::Compare(..) => 2,
        }
    }
}

fn run_job(
    registry: &Arc<JobRegistry>,
    record: Arc<JobRecord>,
    validator: &Validator,
    config: &EngineConfig,
    inputs: JobInputs,
) {
    record.mark_running();
    engine_debug!(
        "job {} ({}) reading {} inputs",
        record.id(),
        record.kind(),
        inputs.len()
    );

    let sink = RecordProgress {
        registry: registry.clone(),
        record: record.clone(),
    };
    let ctx = DedupContext {
        validator,
        sink: &sink,
        progress_interval_lines: config.progress_interval_lines,
        artifact_dir: config.artifact_dir.as_deref(),
    };

    let outcome = match inputs {
        JobInputs::Merge(sources) => {
            dedup::merge(sources, &ctx).map(|merged| vec![(ArtifactPart::Merged, merged)])
        }
        JobInputs::Single(source) => {
            dedup::dedup_single(source, &ctx).map(|merged| vec![(ArtifactPart::Merged, merged)])
        }
        JobInputs::Compare(a, b) => dedup::compare(a, b, &ctx)
            .map(|(only_a, only_b)| vec![(ArtifactPart::A, only_a), (ArtifactPart::B, only_b)]),
    };

    registry.finish(&record, outcome.map_err(to_failure));
}

fn to_failure(err: DedupError) -> JobFailure {
    let kind = match &err {
        DedupError::Read { .. } => FailureKind::Read,
        DedupError::Decode { .. } => FailureKind::Decode,
        DedupError::Artifact(_) => FailureKind::Write,
    };
    JobFailure::new(kind, err.to_string())
}
