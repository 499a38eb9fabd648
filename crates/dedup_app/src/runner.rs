use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use dedup_core::{ArtifactPart, JobKind};
use dedup_engine::{AtomicFileWriter, EngineHandle, InputSource, JobId, JobSummary, PollStatus};
use engine_logging::{engine_debug, engine_info};
use serde::Serialize;

use crate::cli::Command;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A saved result file, as reported on stdout.
#[derive(Debug, Serialize)]
pub struct SavedPart {
    pub part: ArtifactPart,
    pub line_count: usize,
    pub path: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub job_id: JobId,
    pub kind: JobKind,
    pub files: Vec<SavedPart>,
}

fn open(path: &Path) -> Result<InputSource> {
    InputSource::open(path).with_context(|| format!("cannot open {}", path.display()))
}

pub fn submit(engine: &EngineHandle, command: &Command) -> Result<JobId> {
    let job_id = match command {
        Command::Merge { files } => {
            let sources = files.iter().map(|f| open(f)).collect::<Result<Vec<_>>>()?;
            engine.submit_merge(sources)?
        }
        Command::Compare { file_a, file_b } => engine.submit_compare(open(file_a)?, open(file_b)?)?,
        Command::Dedup { file } => engine.submit_dedup(open(file)?)?,
    };
    Ok(job_id)
}

/// Polls until the job is ready, logging progress as it moves.
pub fn wait_for(engine: &EngineHandle, job_id: JobId) -> Result<JobSummary> {
    let mut last_progress = None;
    loop {
        match engine.poll(job_id) {
            PollStatus::Processing { progress } => {
                if last_progress != Some(progress) {
                    engine_info!("job {} at {}%", job_id, progress);
                    last_progress = Some(progress);
                }
                thread::sleep(POLL_INTERVAL);
            }
            PollStatus::Ready(summary) => return Ok(summary),
            PollStatus::Failed(failure) => bail!("job {job_id} failed: {failure}"),
            PollStatus::Consumed(_) => bail!("job {job_id} was already retrieved"),
            PollStatus::NotFound => bail!("job {job_id} disappeared"),
        }
    }
}

/// Retrieves every part of a ready job and writes it under its suggested name.
pub fn save_results(
    engine: &EngineHandle,
    job_id: JobId,
    summary: &JobSummary,
    out_dir: &Path,
) -> Result<RunReport> {
    let writer = AtomicFileWriter::new(out_dir.to_path_buf());
    let mut files = Vec::with_capacity(summary.parts.len());
    for part in summary.kind.parts() {
        let mut download = engine
            .retrieve(job_id, Some(*part))
            .with_context(|| format!("retrieving {part} result of job {job_id}"))?;
        let path = writer
            .write_from(&download.filename, &mut download.reader)
            .with_context(|| format!("saving {}", download.filename))?;
        engine_debug!("job {} saved {} to {:?}", job_id, part, path);
        files.push(SavedPart {
            part: *part,
            line_count: download.line_count,
            path,
        });
    }
    Ok(RunReport {
        job_id,
        kind: summary.kind,
        files,
    })
}

pub fn run(engine: &EngineHandle, command: &Command, out_dir: &Path) -> Result<RunReport> {
    let job_id = submit(engine, command)?;
    let summary = wait_for(engine, job_id)?;
    save_results(engine, job_id, &summary, out_dir)
}
