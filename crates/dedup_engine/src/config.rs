use std::path::PathBuf;
use std::time::Duration;

use dedup_core::ValidatorConfig;
use serde::{Deserialize, Serialize};

use crate::dedup::DEFAULT_PROGRESS_INTERVAL_LINES;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Async runtime workers; they only drive the reaper and job supervision.
    pub worker_threads: usize,
    /// Upper bound on job computations running at the same time.
    pub max_parallel_jobs: usize,
    pub progress_interval_lines: u64,
    /// Where result files are written; `None` uses the system temp dir.
    pub artifact_dir: Option<PathBuf>,
    /// Age after which finished, failed or abandoned jobs are evicted.
    pub job_ttl_secs: Option<u64>,
    pub reap_interval_secs: u64,
    pub validator: ValidatorConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_threads: 2,
            max_parallel_jobs: 8,
            progress_interval_lines: DEFAULT_PROGRESS_INTERVAL_LINES,
            artifact_dir: None,
            job_ttl_secs: Some(3600),
            reap_interval_secs: 60,
            validator: ValidatorConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn job_ttl(&self) -> Option<Duration> {
        self.job_ttl_secs.map(Duration::from_secs)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs.max(1))
    }
}
