//! End-to-end runs of the generation pipeline against a fake solver environment.

mod support;

use std::time::Duration;

use support::{draft, pipeline, Behaviour, FakeRunner, DRAFT, TIMETABLE};
use timetable_pipeline::db::calculate_checksum;
use timetable_pipeline::db::repository::{QueueRepository, ResultRepository, TimetableRepository};
use timetable_pipeline::models::{DraftId, QueueEntry, QueueStatus, TimetableId, UserId};
use timetable_pipeline::services::processor::INTERRUPTED;
use timetable_pipeline::services::{
    GenerationRequest, JobStatus, LogLevel, PersonKind, PipelineContext, PipelineError,
    ProcessOutcome,
};
use timetable_pipeline::storage::{ArtifactKey, ArtifactStore};

const LONG: Duration = Duration::from_secs(30);

fn supplied(comment: &str) -> GenerationRequest {
    GenerationRequest {
        document: Some(format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<fet version=\"7.3.0\"><Comments>{}</Comments></fet>\n",
            comment
        )),
        ..request()
    }
}

async fn stored_input(ctx: &PipelineContext, entry: &QueueEntry) -> Vec<u8> {
    let key: ArtifactKey = entry.input_artifact.parse().unwrap();
    ctx.store.get(&key).await.unwrap()
}

fn request() -> GenerationRequest {
    GenerationRequest {
        timetable_id: TimetableId::new(TIMETABLE),
        file_name: "term".to_string(),
        document: None,
        submitted_by: UserId::new("admin"),
    }
}

// =========================================================
// Successful runs
// =========================================================

#[tokio::test]
async fn test_submit_process_and_import() {
    let runner = FakeRunner::new(Behaviour::Solve);
    let (ctx, repo) = pipeline(runner.clone(), LONG);

    let submission = ctx.submit(request()).await.unwrap();
    assert!(submission.warnings.is_empty());
    let entry = submission.entry;
    assert_eq!(entry.status, QueueStatus::Queued);
    assert_eq!(entry.draft_id, DraftId::new(DRAFT));
    assert_eq!(entry.input_file_name(), "term.fet");
    assert_eq!(entry.input_checksum.len(), 64);

    let outcome = ctx.processor().process_next().await.unwrap();
    assert_eq!(outcome, ProcessOutcome::Processed(entry.id));

    let stored = ctx.queue.get(entry.id).await.unwrap();
    assert_eq!(stored.status, QueueStatus::Completed);
    assert!(stored.started_at.is_some());
    assert!(stored.completed_at.is_some());

    // Activity 1 splits into two blocks, activity 2 stays whole.
    let solved = repo.list_solved_activities(DraftId::new(DRAFT)).await.unwrap();
    assert_eq!(solved.len(), 3);
    assert!(solved.iter().all(|a| a.is_scheduled() && a.has_room()));
    assert_eq!(solved.iter().map(|a| a.duration).sum::<u32>(), 4);

    let artifacts = ctx
        .generation
        .list_artifacts(TimetableId::new(TIMETABLE))
        .await
        .unwrap();
    // Input and outputs of one submission share its run folder.
    let run = entry.run().unwrap();
    assert_eq!(artifacts.input, vec![format!("{}/term.fet", run)]);
    assert!(artifacts.output.contains(&format!("{}/term_data_and_timetable.fet", run)));
    assert!(artifacts.output.contains(&format!("{}/term_teachers.html", run)));

    let job = ctx.tracker().get_job(entry.id).unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.logs.iter().any(|l| l.level == LogLevel::Success));
    let result = job.result.unwrap();
    assert_eq!(result["import"]["imported"], 3);

    assert!(!runner.has_leftovers());
    assert_eq!(ctx.processor().process_next().await.unwrap(), ProcessOutcome::Idle);
}

#[tokio::test]
async fn test_import_supersedes_older_drafts() {
    let runner = FakeRunner::new(Behaviour::Solve);
    let (ctx, repo) = pipeline(runner, LONG);
    repo.insert_draft(draft(99, 6));

    ctx.submit(request()).await.unwrap();
    ctx.processor().process_next().await.unwrap();

    assert!(repo.get_draft(DraftId::new(99)).await.unwrap().is_superseded());
    let current = repo.get_draft(DraftId::new(DRAFT)).await.unwrap();
    assert!(!current.is_superseded());
    assert!(current.error.is_none());
}

#[tokio::test]
async fn test_reimport_keeps_one_row_per_activity() {
    let runner = FakeRunner::new(Behaviour::Solve);
    let (ctx, repo) = pipeline(runner, LONG);
    ctx.submit(request()).await.unwrap();
    ctx.processor().process_next().await.unwrap();

    let first = repo.list_solved_activities(DraftId::new(DRAFT)).await.unwrap();
    let summary = ctx.importer.reimport(DraftId::new(DRAFT)).await.unwrap();
    let second = repo.list_solved_activities(DraftId::new(DRAFT)).await.unwrap();

    assert_eq!(summary.imported, 3);
    assert_eq!(summary.source, "term_data_and_timetable.fet");
    assert_eq!(first, second);

    let mut ids: Vec<u32> = second.iter().map(|a| a.activity_id).collect();
    ids.dedup();
    assert_eq!(ids.len(), 3);
}

#[tokio::test]
async fn test_reimport_reads_latest_run_only() {
    let runner = FakeRunner::new(Behaviour::Solve);
    let (ctx, repo) = pipeline(runner.clone(), LONG);
    let first = ctx.submit(request()).await.unwrap().entry;
    ctx.processor().process_next().await.unwrap();

    runner.set_behaviour(Behaviour::SolveCsvOnly);
    let second = ctx.submit(request()).await.unwrap().entry;
    ctx.processor().process_next().await.unwrap();
    assert_ne!(first.run(), second.run());

    // Both runs' outputs stay stored, each in its own folder.
    let artifacts = ctx
        .generation
        .list_artifacts(TimetableId::new(TIMETABLE))
        .await
        .unwrap();
    assert!(artifacts
        .output
        .contains(&format!("{}/term_data_and_timetable.fet", first.run().unwrap())));
    assert!(artifacts
        .output
        .contains(&format!("{}/term_timetable.csv", second.run().unwrap())));

    let summary = ctx.importer.reimport(DraftId::new(DRAFT)).await.unwrap();
    assert_eq!(summary.source, "term_timetable.csv");
    assert_eq!(summary.imported, 1);

    let solved = repo.list_solved_activities(DraftId::new(DRAFT)).await.unwrap();
    assert_eq!(solved.len(), 1);
    assert_eq!(solved[0].day.value(), 2);
}

#[tokio::test]
async fn test_csv_export_is_used_without_result_document() {
    let runner = FakeRunner::new(Behaviour::SolveCsvOnly);
    let (ctx, repo) = pipeline(runner, LONG);
    ctx.submit(request()).await.unwrap();
    ctx.processor().process_next().await.unwrap();

    let solved = repo.list_solved_activities(DraftId::new(DRAFT)).await.unwrap();
    assert_eq!(solved.len(), 1);
    assert_eq!(solved[0].day.value(), 2);
    assert_eq!(solved[0].period.value(), 13);
}

#[tokio::test]
async fn test_statistics_after_import() {
    let runner = FakeRunner::new(Behaviour::Solve);
    let (ctx, _repo) = pipeline(runner, LONG);
    ctx.submit(request()).await.unwrap();
    ctx.processor().process_next().await.unwrap();

    let stats = ctx.statistics.for_draft(DraftId::new(DRAFT)).await.unwrap();
    assert_eq!(stats.total_days, 2);
    assert_eq!(stats.scheduled_activities, 3);
    assert_eq!(stats.unscheduled_activities, 0);

    let teacher = &stats.teachers[0];
    assert_eq!(teacher.kind, PersonKind::Teacher);
    assert_eq!(teacher.person_id, "t1");
    assert_eq!(teacher.summary.total_duration, 4);
    assert_eq!(teacher.summary.busy_days, 1);
    assert_eq!(teacher.summary.free_days, 1);

    // Both members of group 7A attend everything.
    assert_eq!(stats.students.len(), 2);
    assert!(stats.students.iter().all(|s| s.summary.total_duration == 4));
}

// =========================================================
// Failures
// =========================================================

#[tokio::test]
async fn test_unavailable_environment_refuses_submission() {
    let runner = FakeRunner::new(Behaviour::Solve);
    runner.set_available(false);
    let (ctx, _repo) = pipeline(runner, LONG);

    let err = ctx.submit(request()).await.unwrap_err();
    assert!(matches!(err, PipelineError::EnvironmentUnavailable(_)));

    let artifacts = ctx
        .generation
        .list_artifacts(TimetableId::new(TIMETABLE))
        .await
        .unwrap();
    assert!(artifacts.input.is_empty());
    assert!(ctx.queue.list(TimetableId::new(TIMETABLE)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_same_file_name_keeps_each_queued_input() {
    let (ctx, _repo) = pipeline(FakeRunner::new(Behaviour::Solve), LONG);
    let first = ctx.submit(supplied("first")).await.unwrap().entry;
    let second = ctx.submit(supplied("second")).await.unwrap().entry;

    assert_ne!(first.input_artifact, second.input_artifact);
    assert_eq!(first.input_file_name(), second.input_file_name());
    assert_ne!(first.input_checksum, second.input_checksum);

    for entry in [&first, &second] {
        let content = stored_input(&ctx, entry).await;
        assert_eq!(calculate_checksum(&content), entry.input_checksum);
    }
}

#[tokio::test]
async fn test_altered_input_fails_without_running_solver() {
    let runner = FakeRunner::new(Behaviour::Solve);
    let (ctx, repo) = pipeline(runner.clone(), LONG);
    let entry = ctx.submit(request()).await.unwrap().entry;

    let key: ArtifactKey = entry.input_artifact.parse().unwrap();
    ctx.store
        .put(&key, b"<fet version=\"7.3.0\"/>".to_vec(), "application/xml")
        .await
        .unwrap();

    ctx.processor().process_next().await.unwrap();

    let stored = ctx.queue.get(entry.id).await.unwrap();
    assert_eq!(stored.status, QueueStatus::Failed);
    assert!(stored.diagnostics.unwrap().contains("does not match its recorded checksum"));
    assert_eq!(runner.runs.load(std::sync::atomic::Ordering::SeqCst), 0);
    assert!(repo.get_draft(DraftId::new(DRAFT)).await.unwrap().error.is_some());
}

#[tokio::test]
async fn test_unknown_timetable_is_not_found() {
    let (ctx, _repo) = pipeline(FakeRunner::new(Behaviour::Solve), LONG);
    let mut req = request();
    req.timetable_id = TimetableId::new(404);
    assert!(ctx.submit(req).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_non_zero_exit_fails_entry_and_records_diagnostics() {
    let runner = FakeRunner::new(Behaviour::Fail(3, "no slot for activity 4".to_string()));
    let (ctx, repo) = pipeline(runner.clone(), LONG);
    let entry = ctx.submit(request()).await.unwrap().entry;

    ctx.processor().process_next().await.unwrap();

    let stored = ctx.queue.get(entry.id).await.unwrap();
    assert_eq!(stored.status, QueueStatus::Failed);
    assert!(stored.diagnostics.unwrap().contains("no slot for activity 4"));

    let draft = repo.get_draft(DraftId::new(DRAFT)).await.unwrap();
    assert!(draft.error.is_some());
    assert!(draft.solver_response.unwrap().contains("no slot for activity 4"));
    assert!(repo.list_solved_activities(DraftId::new(DRAFT)).await.unwrap().is_empty());

    assert_eq!(ctx.tracker().get_job(entry.id).unwrap().status, JobStatus::Failed);
    assert!(!runner.has_leftovers());
}

#[tokio::test]
async fn test_timeout_fails_entry_and_cleans_up() {
    let runner = FakeRunner::new(Behaviour::Hang);
    let (ctx, _repo) = pipeline(runner.clone(), Duration::from_millis(100));
    let entry = ctx.submit(request()).await.unwrap().entry;

    ctx.processor().process_next().await.unwrap();

    let stored = ctx.queue.get(entry.id).await.unwrap();
    assert_eq!(stored.status, QueueStatus::Failed);
    let diagnostics = stored.diagnostics.unwrap();
    assert!(diagnostics.contains("did not finish"));
    // Logs the solver wrote before it was stopped are kept.
    assert!(diagnostics.contains("== result.txt ==\nPlaced 2 of 3 activities"));
    assert_eq!(runner.terminated.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert!(!runner.has_leftovers());
}

#[tokio::test]
async fn test_empty_output_fails_entry() {
    let runner = FakeRunner::new(Behaviour::Silent);
    let (ctx, _repo) = pipeline(runner, LONG);
    let entry = ctx.submit(request()).await.unwrap().entry;

    ctx.processor().process_next().await.unwrap();
    assert_eq!(ctx.queue.get(entry.id).await.unwrap().status, QueueStatus::Failed);
}

#[tokio::test]
async fn test_import_failure_completes_entry_with_draft_error() {
    let runner = FakeRunner::new(Behaviour::ReportsOnly);
    let (ctx, repo) = pipeline(runner, LONG);
    let entry = ctx.submit(request()).await.unwrap().entry;

    ctx.processor().process_next().await.unwrap();

    assert_eq!(ctx.queue.get(entry.id).await.unwrap().status, QueueStatus::Completed);
    assert!(repo.get_draft(DraftId::new(DRAFT)).await.unwrap().error.is_some());

    let job = ctx.tracker().get_job(entry.id).unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.result.unwrap().get("importError").is_some());
    assert!(job.logs.iter().any(|l| l.level == LogLevel::Error));
}

#[tokio::test]
async fn test_failed_entry_does_not_block_the_next() {
    let runner = FakeRunner::new(Behaviour::Fail(1, "boom".to_string()));
    let (ctx, _repo) = pipeline(runner.clone(), LONG);
    let first = ctx.submit(request()).await.unwrap().entry;
    let second = ctx.submit(request()).await.unwrap().entry;

    ctx.processor().process_next().await.unwrap();
    runner.set_behaviour(Behaviour::Solve);
    assert_eq!(
        ctx.processor().process_next().await.unwrap(),
        ProcessOutcome::Processed(second.id)
    );

    assert_eq!(ctx.queue.get(first.id).await.unwrap().status, QueueStatus::Failed);
    assert_eq!(ctx.queue.get(second.id).await.unwrap().status, QueueStatus::Completed);
}

// =========================================================
// Worker and single flight
// =========================================================

#[tokio::test]
async fn test_second_processor_sees_busy_queue() {
    let runner = FakeRunner::new(Behaviour::Hang);
    let (ctx, _repo) = pipeline(runner, LONG);
    let entry = ctx.submit(request()).await.unwrap().entry;
    ctx.submit(request()).await.unwrap();

    let processor = ctx.processor();
    let running = tokio::spawn(async move { processor.process_next().await });

    for _ in 0..100 {
        if ctx.queue.in_progress().await.unwrap().is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(
        ctx.processor().process_next().await.unwrap(),
        ProcessOutcome::Busy(entry.id)
    );
    running.abort();
}

#[tokio::test]
async fn test_outage_while_running_is_settled_on_next_step() {
    let runner = FakeRunner::new(Behaviour::Solve);
    let (ctx, repo) = pipeline(runner.clone(), LONG);
    let entry = ctx.submit(request()).await.unwrap().entry;
    let next = ctx.submit(request()).await.unwrap().entry;

    runner.break_repository_during_run(repo.clone());
    let err = ctx.processor().process_next().await.unwrap_err();
    assert!(err.is_retryable());
    assert!(ctx.processor().has_unsettled());

    repo.set_healthy(true);
    assert_eq!(
        repo.get_queue_entry(entry.id).await.unwrap().status,
        QueueStatus::InProgress
    );

    // The stranded entry is settled before anything new is claimed.
    assert_eq!(
        ctx.processor().process_next().await.unwrap(),
        ProcessOutcome::Processed(entry.id)
    );
    assert!(!ctx.processor().has_unsettled());
    assert_eq!(ctx.queue.get(entry.id).await.unwrap().status, QueueStatus::Completed);
    assert_eq!(repo.list_solved_activities(DraftId::new(DRAFT)).await.unwrap().len(), 3);

    assert_eq!(
        ctx.processor().process_next().await.unwrap(),
        ProcessOutcome::Processed(next.id)
    );
    assert_eq!(ctx.queue.get(next.id).await.unwrap().status, QueueStatus::Completed);
}

#[tokio::test]
async fn test_worker_start_fails_interrupted_entry() {
    let runner = FakeRunner::new(Behaviour::Solve);
    let (ctx, repo) = pipeline(runner, LONG);
    let stranded = ctx.submit(request()).await.unwrap().entry;
    let waiting = ctx.submit(request()).await.unwrap().entry;

    // Claimed by a process that went away before settling it.
    repo.claim_next().await.unwrap();

    let worker = ctx.start_worker(Duration::from_secs(3600));
    let mut status = QueueStatus::Queued;
    for _ in 0..200 {
        status = ctx.queue.get(waiting.id).await.unwrap().status;
        if status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(status, QueueStatus::Completed);

    let stranded = ctx.queue.get(stranded.id).await.unwrap();
    assert_eq!(stranded.status, QueueStatus::Failed);
    assert_eq!(stranded.diagnostics.as_deref(), Some(INTERRUPTED));

    ctx.worker.shutdown();
    tokio::time::timeout(Duration::from_secs(5), worker)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_worker_processes_triggered_submissions() {
    let runner = FakeRunner::new(Behaviour::Solve);
    let (ctx, _repo) = pipeline(runner, LONG);
    let worker = ctx.start_worker(Duration::from_secs(3600));

    let entry = ctx.submit(request()).await.unwrap().entry;

    let mut status = QueueStatus::Queued;
    for _ in 0..200 {
        status = ctx.queue.get(entry.id).await.unwrap().status;
        if status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(status, QueueStatus::Completed);

    ctx.worker.shutdown();
    tokio::time::timeout(Duration::from_secs(5), worker)
        .await
        .unwrap()
        .unwrap();
}
