use std::io::{self, Read};
use std::sync::{mpsc, Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use dedup_core::{ArtifactPart, JobKind};
use dedup_engine::{
    EngineConfig, EngineError, EngineEvent, EngineHandle, FailureKind, InputSource, JobId,
    NotFoundReason, PollStatus,
};
use pretty_assertions::assert_eq;

const WAIT: Duration = Duration::from_secs(10);

fn engine() -> EngineHandle {
    engine_logging::initialize_for_tests();
    EngineHandle::new(EngineConfig::default()).expect("engine")
}

fn source(name: &str, lines: &[&str]) -> InputSource {
    InputSource::from_bytes(name, lines.concat())
}

/// Polls until the job leaves the processing state.
fn wait_done(engine: &EngineHandle, job_id: JobId) -> PollStatus {
    let deadline = Instant::now() + WAIT;
    loop {
        match engine.poll(job_id) {
            PollStatus::Processing { .. } if Instant::now() < deadline => {
                thread::sleep(Duration::from_millis(5));
            }
            status => return status,
        }
    }
}

fn download_lines(engine: &EngineHandle, job_id: JobId, part: Option<ArtifactPart>) -> Vec<String> {
    let download = engine.retrieve(job_id, part).expect("download");
    let content = download.reader.read_all().unwrap();
    content.lines().map(str::to_string).collect()
}

#[test]
fn dedup_job_runs_to_ready_and_is_retrieved_once() {
    let engine = engine();
    let job_id = engine
        .submit_dedup(source(
            "u.txt",
            &["UserA\n", "+UserA\n", "userabot\n", "\u{200B}userB\n"],
        ))
        .unwrap();

    match wait_done(&engine, job_id) {
        PollStatus::Ready(summary) => {
            assert_eq!(summary.kind, JobKind::SingleDedup);
            assert_eq!(summary.line_count(ArtifactPart::Merged), Some(2));
        }
        other => panic!("unexpected status {other:?}"),
    }

    let download = engine.retrieve(job_id, None).unwrap();
    assert_eq!(download.filename, "MG_2.txt");
    assert_eq!(download.line_count, 2);
    assert_eq!(download.reader.read_all().unwrap(), "usera\nuserb\n");

    let again = engine.retrieve(job_id, None).unwrap_err();
    assert_eq!(again.not_found_reason(), Some(NotFoundReason::Consumed));
    assert!(matches!(engine.poll(job_id), PollStatus::Consumed(_)));
}

#[test]
fn merge_job_result() {
    let engine = engine();
    let job_id = engine
        .submit_merge(vec![source("1", &["a\n", "b\n"]), source("2", &["b\n", "c\n"])])
        .unwrap();
    assert!(matches!(wait_done(&engine, job_id), PollStatus::Ready(_)));
    assert_eq!(download_lines(&engine, job_id, None), vec!["a", "b", "c"]);
}

#[test]
fn compare_parts_have_independent_lifecycles() {
    let engine = engine();
    let job_id = engine
        .submit_compare(source("a", &["x\n", "y\n"]), source("b", &["y\n", "z\n"]))
        .unwrap();
    assert!(matches!(wait_done(&engine, job_id), PollStatus::Ready(_)));

    let missing_part = engine.retrieve(job_id, None).unwrap_err();
    assert!(matches!(missing_part, EngineError::InvalidInput(_)));
    let wrong_part = engine.retrieve(job_id, Some(ArtifactPart::Merged)).unwrap_err();
    assert_eq!(wrong_part.not_found_reason(), Some(NotFoundReason::UnknownPart));

    let a = engine.retrieve(job_id, Some(ArtifactPart::A)).unwrap();
    assert_eq!(a.filename, "A_1.txt");
    assert_eq!(a.reader.read_all().unwrap(), "x\n");

    // B is still waiting; the job stays ready until every part is taken.
    assert!(matches!(engine.poll(job_id), PollStatus::Ready(_)));
    let a_again = engine.retrieve(job_id, Some(ArtifactPart::A)).unwrap_err();
    assert_eq!(a_again.not_found_reason(), Some(NotFoundReason::Consumed));

    let b = engine.retrieve(job_id, Some(ArtifactPart::B)).unwrap();
    assert_eq!(b.filename, "B_1.txt");
    assert_eq!(b.reader.read_all().unwrap(), "z\n");
    assert!(matches!(engine.poll(job_id), PollStatus::Consumed(_)));
}

#[test]
fn invalid_submissions_create_no_job() {
    let engine = engine();
    assert!(matches!(
        engine.submit_merge(Vec::new()),
        Err(EngineError::InvalidInput(_))
    ));
    assert!(matches!(
        engine.submit(JobKind::Compare, vec![source("a", &["x\n"])]),
        Err(EngineError::InvalidInput(_))
    ));
    assert!(matches!(
        engine.submit(
            JobKind::SingleDedup,
            vec![source("a", &["x\n"]), source("b", &["y\n"])]
        ),
        Err(EngineError::InvalidInput(_))
    ));
    assert!(engine.registry().is_empty());
}

#[test]
fn unknown_job_is_not_found() {
    let engine = engine();
    assert_eq!(engine.poll(4242), PollStatus::NotFound);
    let err = engine.retrieve(4242, None).unwrap_err();
    assert_eq!(err.not_found_reason(), Some(NotFoundReason::Unknown));
}

#[test]
fn job_ids_are_unique_across_threads() {
    let engine = Arc::new(engine());
    let barrier = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let engine = engine.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                engine
                    .submit_dedup(InputSource::from_bytes(format!("t{i}"), format!("u{i}\n")))
                    .unwrap()
            })
        })
        .collect();
    let mut ids: Vec<JobId> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 8);
}

#[test]
fn concurrent_retrieval_succeeds_exactly_once() {
    let engine = Arc::new(engine());
    let job_id = engine
        .submit_dedup(source("s", &["one\n", "two\n"]))
        .unwrap();
    assert!(matches!(wait_done(&engine, job_id), PollStatus::Ready(_)));

    let callers = 8;
    let barrier = Arc::new(Barrier::new(callers));
    let handles: Vec<_> = (0..callers)
        .map(|_| {
            let engine = engine.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                engine.retrieve(job_id, None).map(|d| d.line_count)
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners, vec![&2]);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| e.not_found_reason() == Some(NotFoundReason::Consumed)));
}

struct BrokenReader;

impl Read for BrokenReader {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::Other, "disk on fire"))
    }
}

#[test]
fn read_failure_moves_job_to_failed() {
    let engine = engine();
    let job_id = engine
        .submit_dedup(InputSource::from_reader("broken", BrokenReader, None))
        .unwrap();

    match wait_done(&engine, job_id) {
        PollStatus::Failed(failure) => {
            assert_eq!(failure.kind, FailureKind::Read);
            assert!(failure.message.contains("broken"));
        }
        other => panic!("unexpected status {other:?}"),
    }
    let err = engine.retrieve(job_id, None).unwrap_err();
    assert_eq!(err.not_found_reason(), Some(NotFoundReason::Failed));
}

struct PanickingReader;

impl Read for PanickingReader {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        panic!("reader exploded");
    }
}

#[test]
fn panicking_worker_is_recorded_as_crashed() {
    let engine = engine();
    let job_id = engine
        .submit_dedup(InputSource::from_reader("panicky", PanickingReader, None))
        .unwrap();

    match wait_done(&engine, job_id) {
        PollStatus::Failed(failure) => {
            assert_eq!(failure.kind, FailureKind::Crashed);
            assert!(failure.message.contains("reader exploded"), "{}", failure.message);
        }
        other => panic!("unexpected status {other:?}"),
    }
    let err = engine.retrieve(job_id, None).unwrap_err();
    assert_eq!(err.not_found_reason(), Some(NotFoundReason::Failed));
}

/// Serves one line, then blocks until released.
struct GatedReader {
    served: bool,
    gate: mpsc::Receiver<()>,
}

impl Read for GatedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.served {
            self.served = true;
            buf[..2].copy_from_slice(b"a\n");
            return Ok(2);
        }
        let _ = self.gate.recv();
        Ok(0)
    }
}

#[test]
fn running_job_reports_processing_and_is_not_ready() {
    let engine = engine();
    let (release, gate) = mpsc::channel();
    let job_id = engine
        .submit_dedup(InputSource::from_reader(
            "gated",
            GatedReader { served: false, gate },
            Some(1_000),
        ))
        .unwrap();

    match engine.poll(job_id) {
        PollStatus::Processing { progress } => assert!(progress < 100),
        other => panic!("unexpected status {other:?}"),
    }
    let early = engine.retrieve(job_id, None).unwrap_err();
    assert_eq!(early.not_found_reason(), Some(NotFoundReason::NotReady));

    release.send(()).unwrap();
    assert!(matches!(wait_done(&engine, job_id), PollStatus::Ready(_)));
}

#[test]
fn events_report_monotonic_progress_then_completion() {
    let engine = EngineHandle::new(EngineConfig {
        progress_interval_lines: 16,
        ..EngineConfig::default()
    })
    .unwrap();
    let events = engine.subscribe();
    let lines: Vec<String> = (0..2_000).map(|i| format!("member{i}\n")).collect();
    let job_id = engine
        .submit_dedup(InputSource::from_bytes("big", lines.concat()))
        .unwrap();

    let mut progress = Vec::new();
    let completion = loop {
        match events.recv_timeout(WAIT).expect("event") {
            EngineEvent::Progress { job_id: id, percent } if id == job_id => progress.push(percent),
            EngineEvent::JobCompleted { job_id: id, result } if id == job_id => break result,
            _ => {}
        }
    };

    assert!(!progress.is_empty());
    assert!(progress.windows(2).all(|w| w[0] < w[1]), "{progress:?}");
    assert!(progress.iter().all(|p| *p < 100));
    let summary = completion.expect("job succeeded");
    assert_eq!(summary.line_count(ArtifactPart::Merged), Some(2_000));
    assert!(matches!(engine.poll(job_id), PollStatus::Ready(_)));
}

#[test]
fn reaper_evicts_expired_jobs_and_their_files() {
    let artifacts = tempfile::TempDir::new().unwrap();
    let engine = EngineHandle::new(EngineConfig {
        job_ttl_secs: Some(0),
        reap_interval_secs: 3600,
        artifact_dir: Some(artifacts.path().to_path_buf()),
        ..EngineConfig::default()
    })
    .unwrap();
    let job_id = engine.submit_dedup(source("s", &["k\n"])).unwrap();
    assert!(matches!(wait_done(&engine, job_id), PollStatus::Ready(_)));
    assert_eq!(std::fs::read_dir(artifacts.path()).unwrap().count(), 1);

    assert_eq!(engine.reap_expired(), 1);
    assert_eq!(engine.poll(job_id), PollStatus::NotFound);

    // The worker may still hold the record for a moment after it turned ready.
    let deadline = Instant::now() + WAIT;
    while std::fs::read_dir(artifacts.path()).unwrap().count() > 0 {
        assert!(Instant::now() < deadline, "artifact file was not reclaimed");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn job_running_longer_than_ttl_stays_retrievable_once_ready() {
    let engine = EngineHandle::new(EngineConfig {
        job_ttl_secs: Some(1),
        reap_interval_secs: 3600,
        ..EngineConfig::default()
    })
    .unwrap();
    let (release, gate) = mpsc::channel();
    let job_id = engine
        .submit_dedup(InputSource::from_reader(
            "slow",
            GatedReader { served: false, gate },
            None,
        ))
        .unwrap();

    thread::sleep(Duration::from_millis(1_200));
    assert_eq!(engine.reap_expired(), 0);
    release.send(()).unwrap();
    assert!(matches!(wait_done(&engine, job_id), PollStatus::Ready(_)));

    assert_eq!(engine.reap_expired(), 0);
    assert_eq!(download_lines(&engine, job_id, None), vec!["a"]);
}

#[test]
fn summary_serializes_for_callers() {
    let engine = engine();
    let job_id = engine
        .submit_compare(source("a", &["x\n"]), source("b", &["y\n"]))
        .unwrap();
    let summary = match wait_done(&engine, job_id) {
        PollStatus::Ready(summary) => summary,
        other => panic!("unexpected status {other:?}"),
    };
    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["kind"], "compare");
    assert_eq!(json["parts"][0]["part"], "A");
    assert_eq!(json["parts"][1]["line_count"], 1);
}
