//! Dedup engine: background jobs, streamed set operations and result files.
mod artifact;
mod config;
mod dedup;
mod engine;
mod persist;
mod registry;
mod source;
mod types;

pub use artifact::{Artifact, ArtifactError, ArtifactReader};
pub use config::EngineConfig;
pub use dedup::{
    compare, dedup_single, merge, DedupContext, NoProgress, ProgressSink,
    DEFAULT_PROGRESS_INTERVAL_LINES,
};
pub use engine::EngineHandle;
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use registry::JobRegistry;
pub use source::{DedupError, InputSource};
pub use types::{
    Download, EngineError, EngineEvent, FailureKind, JobFailure, JobId, JobSummary,
    NotFoundReason, PartSummary, PollStatus,
};
