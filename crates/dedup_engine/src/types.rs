use std::fmt;
use std::io;

use dedup_core::{ArtifactPart, JobKind};
use serde::Serialize;

use crate::artifact::{ArtifactError, ArtifactReader};

pub type JobId = u64;

/// Line count of one finished artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PartSummary {
    pub part: ArtifactPart,
    pub line_count: usize,
}

/// What a finished job produced; kept after the artifacts are consumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSummary {
    pub kind: JobKind,
    pub parts: Vec<PartSummary>,
}

impl JobSummary {
    pub fn line_count(&self, part: ArtifactPart) -> Option<usize> {
        self.parts
            .iter()
            .find(|p| p.part == part)
            .map(|p| p.line_count)
    }
}

/// Answer to a status poll. Never blocks on the computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus {
    NotFound,
    /// Pending or running; `progress` is in `0..=99`.
    Processing { progress: u8 },
    Ready(JobSummary),
    Consumed(JobSummary),
    Failed(JobFailure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Progress { job_id: JobId, percent: u8 },
    JobCompleted {
        job_id: JobId,
        result: Result<JobSummary, JobFailure>,
    },
}

/// A retrieved artifact. Dropping the reader deletes the backing file.
#[derive(Debug)]
pub struct Download {
    pub reader: ArtifactReader,
    pub filename: String,
    pub line_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct JobFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl JobFailure {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Read,
    Decode,
    Write,
    Crashed,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Read => write!(f, "read error"),
            FailureKind::Decode => write!(f, "decode error"),
            FailureKind::Write => write!(f, "write error"),
            FailureKind::Crashed => write!(f, "worker crashed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundReason {
    Unknown,
    NotReady,
    Consumed,
    Failed,
    UnknownPart,
}

impl fmt::Display for NotFoundReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotFoundReason::Unknown => write!(f, "unknown job"),
            NotFoundReason::NotReady => write!(f, "result not ready"),
            NotFoundReason::Consumed => write!(f, "result already retrieved"),
            NotFoundReason::Failed => write!(f, "job failed"),
            NotFoundReason::UnknownPart => write!(f, "no such result part"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("job {job_id}: {reason}")]
    NotFound {
        job_id: JobId,
        reason: NotFoundReason,
    },
    #[error("failed to start worker runtime: {0}")]
    Runtime(#[from] io::Error),
    #[error("failed to open result: {0}")]
    Artifact(#[from] ArtifactError),
}

impl EngineError {
    pub(crate) fn not_found(job_id: JobId, reason: NotFoundReason) -> Self {
        EngineError::NotFound { job_id, reason }
    }

    /// The not-found reason, if this is a not-found error.
    pub fn not_found_reason(&self) -> Option<NotFoundReason> {
        match self {
            EngineError::NotFound { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}
