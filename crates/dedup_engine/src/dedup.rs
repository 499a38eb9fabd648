use std::collections::BTreeSet;
use std::path::Path;

use dedup_core::{logical_lines, ProgressPlan, Validator};

use crate::artifact::Artifact;
use crate::source::{DedupError, InputSource};

pub const DEFAULT_PROGRESS_INTERVAL_LINES: u64 = 4096;

/// Receives progress estimates in `0..=99` while a kernel runs.
pub trait ProgressSink: Send + Sync {
    fn report(&self, percent: u8);
}

/// Sink for callers that do not track progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _percent: u8) {}
}

/// Collaborators shared by the dedup kernels.
pub struct DedupContext<'a> {
    pub validator: &'a Validator,
    pub sink: &'a dyn ProgressSink,
    pub progress_interval_lines: u64,
    pub artifact_dir: Option<&'a Path>,
}

impl<'a> DedupContext<'a> {
    pub fn new(validator: &'a Validator, sink: &'a dyn ProgressSink) -> Self {
        Self {
            validator,
            sink,
            progress_interval_lines: DEFAULT_PROGRESS_INTERVAL_LINES,
            artifact_dir: None,
        }
    }
}

/// Tracks the read phase across all inputs of one job.
struct ReadMeter<'a> {
    plan: ProgressPlan,
    sink: &'a dyn ProgressSink,
    interval: u64,
    finished_bytes: u64,
    lines_since_report: u64,
}

impl<'a> ReadMeter<'a> {
    fn new(sources: &[InputSource], write_phases: u8, ctx: &DedupContext<'a>) -> Self {
        let total_bytes = sources
            .iter()
            .map(InputSource::size_hint)
            .sum::<Option<u64>>();
        Self {
            plan: ProgressPlan::new(total_bytes, write_phases),
            sink: ctx.sink,
            interval: ctx.progress_interval_lines.max(1),
            finished_bytes: 0,
            lines_since_report: 0,
        }
    }

    fn tick(&mut self, current_source_bytes: u64) {
        self.lines_since_report += 1;
        if self.lines_since_report >= self.interval {
            self.lines_since_report = 0;
            let read = self.finished_bytes + current_source_bytes;
            self.sink.report(self.plan.read_percent(read));
        }
    }

    fn finish_source(&mut self, source_bytes: u64) {
        self.finished_bytes += source_bytes;
    }

    fn finish_read(&self) {
        self.sink.report(self.plan.read_done());
    }

    fn finish_write(&self, phases_done: u8) {
        self.sink.report(self.plan.write_percent(phases_done));
    }
}

fn collect_into(
    source: InputSource,
    set: &mut BTreeSet<String>,
    validator: &Validator,
    meter: &mut ReadMeter<'_>,
) -> Result<(), DedupError> {
    let mut lines = source.into_lines();
    loop {
        {
            let record = match lines.next_record()? {
                Some(record) => record,
                None => break,
            };
            for line in logical_lines(&record) {
                if let Some(identifier) = validator.admit(line) {
                    set.insert(identifier);
                }
            }
        }
        meter.tick(lines.bytes_read());
    }
    meter.finish_source(lines.bytes_read());
    Ok(())
}

/// Union of the validated identifiers of every input, sorted by code point.
pub fn merge(sources: Vec<InputSource>, ctx: &DedupContext<'_>) -> Result<Artifact, DedupError> {
    let mut meter = ReadMeter::new(&sources, 0, ctx);
    let mut set = BTreeSet::new();
    for source in sources {
        collect_into(source, &mut set, ctx.validator, &mut meter)?;
    }
    meter.finish_read();
    Ok(Artifact::materialize(ctx.artifact_dir, &set)?)
}

/// Deduplicates one input; the same as merging a single stream.
pub fn dedup_single(source: InputSource, ctx: &DedupContext<'_>) -> Result<Artifact, DedupError> {
    merge(vec![source], ctx)
}

/// Returns `(A \ B, B \ A)` over the validated identifiers of each input.
pub fn compare(
    source_a: InputSource,
    source_b: InputSource,
    ctx: &DedupContext<'_>,
) -> Result<(Artifact, Artifact), DedupError> {
    let sources = vec![source_a, source_b];
    let mut meter = ReadMeter::new(&sources, 2, ctx);
    let mut sets = [BTreeSet::new(), BTreeSet::new()];
    for (source, set) in sources.into_iter().zip(sets.iter_mut()) {
        collect_into(source, set, ctx.validator, &mut meter)?;
    }
    meter.finish_read();

    let [set_a, set_b] = sets;
    let only_a = Artifact::materialize(ctx.artifact_dir, set_a.difference(&set_b))?;
    meter.finish_write(1);
    let only_b = Artifact::materialize(ctx.artifact_dir, set_b.difference(&set_a))?;
    meter.finish_write(2);
    Ok((only_a, only_b))
}
