use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Merge,
    Compare,
    SingleDedup,
}

impl JobKind {
    /// Artifacts produced by a job of this kind, in retrieval order.
    pub fn parts(self) -> &'static [ArtifactPart] {
        match self {
            JobKind::Merge | JobKind::SingleDedup => &[ArtifactPart::Merged],
            JobKind::Compare => &[ArtifactPart::A, ArtifactPart::B],
        }
    }

    /// Number of progress-weighted write phases after the read phase.
    pub fn write_phases(self) -> u8 {
        match self {
            JobKind::Merge | JobKind::SingleDedup => 0,
            JobKind::Compare => 2,
        }
    }

    /// Checks the input count a job of this kind accepts.
    pub fn accepts_inputs(self, count: usize) -> bool {
        match self {
            JobKind::Merge => count >= 1,
            JobKind::Compare => count == 2,
            JobKind::SingleDedup => count == 1,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::Merge => write!(f, "merge"),
            JobKind::Compare => write!(f, "compare"),
            JobKind::SingleDedup => write!(f, "single-dedup"),
        }
    }
}

/// Names one artifact of a job. Compare jobs own `A` (only in the first
/// input) and `B` (only in the second); the others own a single `Merged`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtifactPart {
    Merged,
    A,
    B,
}

impl ArtifactPart {
    pub fn suggested_filename(self, line_count: usize) -> String {
        let prefix = match self {
            ArtifactPart::Merged => "MG",
            ArtifactPart::A => "A",
            ArtifactPart::B => "B",
        };
        format!("{prefix}_{line_count}.txt")
    }
}

impl fmt::Display for ArtifactPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactPart::Merged => write!(f, "merged"),
            ArtifactPart::A => write!(f, "A"),
            ArtifactPart::B => write!(f, "B"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Ready,
    Consumed,
    Failed,
}

impl JobStatus {
    /// Whether `self -> next` is an edge of the job state machine.
    ///
    /// `Running -> Running` is the progress-only self loop; a failure may end
    /// either active state.
    pub fn can_advance_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Running, Running)
                | (Running, Ready)
                | (Ready, Consumed)
                | (Pending, Failed)
                | (Running, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Consumed | JobStatus::Failed)
    }
}
