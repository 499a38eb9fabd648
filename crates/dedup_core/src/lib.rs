//! Dedup core: identifier normalization, validation and the job state machine.
//!
//! Everything in this crate is pure; I/O lives in `dedup_engine`.
mod job;
mod normalize;
mod progress;
mod validate;

pub use job::{ArtifactPart, JobKind, JobStatus};
pub use normalize::{logical_lines, normalize};
pub use progress::{ProgressPlan, MAX_RUNNING_PERCENT};
pub use validate::{
    is_valid, BlacklistMatching, Validator, ValidatorConfig, DEFAULT_BLACKLIST,
};
