//! End-to-end job scenarios through the activity registry
//!
//! Run with: cargo test -p syncflow-activities --test scenarios

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use uuid::Uuid;

use syncflow_activities::activity::error_types;
use syncflow_activities::{
    ActivityError, ActivityRegistry, JobActivities, MemoryEventSink, RetryPolicy,
};
use syncflow_jobs::{
    Attempt, AttemptStatus, FailureOrigin, FailureReason, FailureSummary, InMemoryJobStore, Job,
    JobFilter, JobStatus, JobStore, SyncOutput,
};

struct Harness {
    store: Arc<InMemoryJobStore>,
    events: Arc<MemoryEventSink>,
    registry: ActivityRegistry,
    policy: RetryPolicy,
}

impl Harness {
    fn new() -> Self {
        let store = Arc::new(InMemoryJobStore::new());
        let events = Arc::new(MemoryEventSink::new());
        let service = Arc::new(JobActivities::new(store.clone(), events.clone()));
        Self {
            store,
            events,
            registry: ActivityRegistry::with_job_activities(service),
            policy: RetryPolicy::fixed(Duration::ZERO, 3),
        }
    }

    async fn call(&self, activity: &str, input: Value) -> Result<Value, ActivityError> {
        self.registry
            .execute_with_retry(activity, input, &self.policy)
            .await
    }

    async fn create_job(&self, connection_id: Uuid) -> i64 {
        let output = self
            .call("createNewJob", json!({ "connectionId": connection_id }))
            .await
            .unwrap();
        output["jobId"].as_i64().unwrap()
    }

    async fn create_attempt_number(&self, job_id: i64) -> i64 {
        let output = self
            .call("createNewAttemptNumber", json!({ "jobId": job_id }))
            .await
            .unwrap();
        output["attemptNumber"].as_i64().unwrap()
    }

    async fn job(&self, job_id: i64) -> Job {
        self.store.get_job(job_id).await.unwrap()
    }

    async fn live_jobs(&self, connection_id: Uuid) -> Vec<Job> {
        self.store
            .list_jobs(connection_id, JobFilter::non_terminal())
            .await
            .unwrap()
    }
}

fn summary(message: &str) -> FailureSummary {
    FailureSummary {
        failures: vec![FailureReason {
            failure_origin: Some(FailureOrigin::Source),
            failure_type: None,
            external_message: Some(message.to_string()),
            internal_message: None,
            retryable: Some(true),
            timestamp: chrono::Utc::now(),
            extra: Default::default(),
        }],
        partial_success: Some(false),
    }
}

fn assert_attempt(attempt: &Attempt, number: i32, status: AttemptStatus) {
    assert_eq!(attempt.number, number);
    assert_eq!(attempt.status, status);
}

// =============================================================================
// Scenarios
// =============================================================================

#[test_log::test(tokio::test)]
async fn happy_path() {
    let h = Harness::new();
    let connection_id = Uuid::now_v7();
    let out = json!({ "recordsSynced": 120, "bytesSynced": 40960 });

    let job_id = h.create_job(connection_id).await;
    assert_eq!(h.create_attempt_number(job_id).await, 0);

    h.call(
        "jobSuccessWithAttemptNumber",
        json!({
            "jobId": job_id,
            "attemptNumber": 0,
            "connectionId": connection_id,
            "standardSyncOutput": out,
        }),
    )
    .await
    .unwrap();

    let job = h.job(job_id).await;
    assert_eq!(job.status, JobStatus::Succeeded);
    assert_eq!(job.attempts.len(), 1);
    assert_attempt(&job.attempts[0], 0, AttemptStatus::Succeeded);
    assert_eq!(job.attempts[0].sync_output, Some(SyncOutput::new(out)));
}

#[test_log::test(tokio::test)]
async fn retry_after_lost_acknowledgement_creates_one_attempt() {
    let h = Harness::new();
    let connection_id = Uuid::now_v7();
    let job_id = h.create_job(connection_id).await;

    // The attempt commits but the response is lost
    h.store.fail_next_acks(1);
    let number = h.create_attempt_number(job_id).await;
    assert_eq!(number, 0);

    let job = h.job(job_id).await;
    assert_eq!(job.attempts.len(), 1);
    assert_attempt(&job.attempts[0], 0, AttemptStatus::Running);
}

#[tokio::test]
async fn retry_after_lost_acknowledgement_by_id() {
    let h = Harness::new();
    let job_id = h.create_job(Uuid::now_v7()).await;

    h.store.fail_next_acks(1);
    let output = h
        .call("createNewAttempt", json!({ "jobId": job_id }))
        .await
        .unwrap();

    let job = h.job(job_id).await;
    assert_eq!(job.attempts.len(), 1);
    assert_eq!(output["attemptId"], job.attempts[0].id);
}

#[tokio::test]
async fn failed_attempt_then_successful_attempt() {
    let h = Harness::new();
    let connection_id = Uuid::now_v7();
    let summary1 = summary("source timed out");
    let out = json!({ "recordsSynced": 7 });

    let job_id = h.create_job(connection_id).await;
    assert_eq!(h.create_attempt_number(job_id).await, 0);

    h.call(
        "attemptFailureWithAttemptNumber",
        json!({
            "jobId": job_id,
            "attemptNumber": 0,
            "connectionId": connection_id,
            "attemptFailureSummary": summary1,
        }),
    )
    .await
    .unwrap();
    assert_eq!(h.job(job_id).await.status, JobStatus::Running);

    assert_eq!(h.create_attempt_number(job_id).await, 1);
    h.call(
        "jobSuccessWithAttemptNumber",
        json!({
            "jobId": job_id,
            "attemptNumber": 1,
            "connectionId": connection_id,
            "standardSyncOutput": out,
        }),
    )
    .await
    .unwrap();

    let job = h.job(job_id).await;
    assert_eq!(job.status, JobStatus::Succeeded);
    assert_attempt(&job.attempts[0], 0, AttemptStatus::Failed);
    assert_eq!(job.attempts[0].failure_summary, Some(summary1));
    assert_attempt(&job.attempts[1], 1, AttemptStatus::Succeeded);
    assert_eq!(job.attempts[1].sync_output, Some(SyncOutput::new(out)));
}

#[tokio::test]
async fn cancellation_mid_run() {
    let h = Harness::new();
    let connection_id = Uuid::now_v7();
    let cancel_summary = summary("cancelled by user");

    let job_id = h.create_job(connection_id).await;
    h.create_attempt_number(job_id).await;

    h.call(
        "jobCancelledWithAttemptNumber",
        json!({
            "jobId": job_id,
            "attemptNumber": 0,
            "connectionId": connection_id,
            "attemptFailureSummary": cancel_summary,
        }),
    )
    .await
    .unwrap();

    let job = h.job(job_id).await;
    assert_eq!(job.status, JobStatus::Cancelled);
    assert_attempt(&job.attempts[0], 0, AttemptStatus::Failed);
    assert_eq!(job.attempts[0].failure_summary, Some(cancel_summary));
    assert_eq!(h.events.names_for(job_id), vec!["cancelled"]);
}

#[test_log::test(tokio::test)]
async fn orphan_recovery_after_crash() {
    let h = Harness::new();
    let connection_id = Uuid::now_v7();

    // State left by an orchestrator that crashed mid-attempt
    let mut orphan = Job::new(41, connection_id);
    orphan.status = JobStatus::Running;
    orphan.attempts.push(Attempt::new(90, 0));
    h.store.insert_job(orphan);

    h.call("ensureCleanJobState", json!({ "connectionId": connection_id }))
        .await
        .unwrap();

    let job = h.job(41).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_attempt(&job.attempts[0], 0, AttemptStatus::Failed);
    assert!(job.attempts[0]
        .failure_summary
        .as_ref()
        .is_some_and(|s| s.is_platform_recovery()));
    assert_eq!(h.events.names_for(41), vec!["recovered"]);

    let job_id = h.create_job(connection_id).await;
    assert!(job_id > 41);
    assert_eq!(h.create_attempt_number(job_id).await, 0);
}

#[tokio::test]
async fn conflicting_create() {
    let h = Harness::new();
    let connection_id = Uuid::now_v7();

    let job_id = h.create_job(connection_id).await;
    h.create_attempt_number(job_id).await;

    let error = h
        .call("createNewJob", json!({ "connectionId": connection_id }))
        .await
        .unwrap_err();
    assert!(error.is_type(error_types::CONFLICTING_JOB));
    assert!(!error.retryable);
    assert_eq!(error.details.unwrap()["jobId"], job_id);

    // Other connections are unaffected
    h.create_job(Uuid::now_v7()).await;
}

// =============================================================================
// Properties
// =============================================================================

#[tokio::test]
async fn at_most_one_live_job_per_connection() {
    let h = Arc::new(Harness::new());
    let connection_id = Uuid::now_v7();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let h = h.clone();
        handles.push(tokio::spawn(async move {
            h.call("createNewJob", json!({ "connectionId": connection_id }))
                .await
                .is_ok()
        }));
    }

    let mut created = 0;
    for handle in handles {
        if handle.await.unwrap() {
            created += 1;
        }
    }

    assert_eq!(created, 1);
    assert_eq!(h.live_jobs(connection_id).await.len(), 1);
}

#[tokio::test]
async fn attempt_numbers_are_contiguous() {
    let h = Harness::new();
    let connection_id = Uuid::now_v7();
    let job_id = h.create_job(connection_id).await;

    for expected in 0..5 {
        assert_eq!(h.create_attempt_number(job_id).await, expected);
        h.call(
            "attemptFailureWithAttemptNumber",
            json!({ "jobId": job_id, "attemptNumber": expected, "connectionId": connection_id }),
        )
        .await
        .unwrap();
    }

    let numbers: Vec<i32> = h.job(job_id).await.attempts.iter().map(|a| a.number).collect();
    assert_eq!(numbers, (0..5).collect::<Vec<_>>());
}

#[tokio::test]
async fn second_attempt_while_running_is_rejected() {
    let h = Harness::new();
    let job_id = h.create_job(Uuid::now_v7()).await;
    h.create_attempt_number(job_id).await;

    let error = h
        .call("createNewAttemptNumber", json!({ "jobId": job_id }))
        .await
        .unwrap_err();
    assert!(error.is_type(error_types::ILLEGAL_STATE));
    assert_eq!(h.job(job_id).await.attempts.len(), 1);
}

#[tokio::test]
async fn terminal_outcomes_are_sticky() {
    let h = Harness::new();
    let connection_id = Uuid::now_v7();
    let job_id = h.create_job(connection_id).await;
    h.create_attempt_number(job_id).await;

    let success = json!({
        "jobId": job_id,
        "attemptNumber": 0,
        "connectionId": connection_id,
        "standardSyncOutput": { "recordsSynced": 1 },
    });
    h.call("jobSuccessWithAttemptNumber", success.clone())
        .await
        .unwrap();
    let after_first = h.job(job_id).await;

    // Same outcome: no-op
    h.call("jobSuccessWithAttemptNumber", success).await.unwrap();
    assert_eq!(h.job(job_id).await, after_first);

    // Different outcome: rejected
    let error = h
        .call(
            "jobFailure",
            json!({
                "jobId": job_id,
                "connectionId": connection_id,
                "attemptNumber": 0,
                "reason": "too late",
            }),
        )
        .await
        .unwrap_err();
    assert!(error.is_type(error_types::TERMINAL_CONFLICT));

    let error = h
        .call(
            "jobCancelledWithAttemptNumber",
            json!({ "jobId": job_id, "attemptNumber": 0, "connectionId": connection_id }),
        )
        .await
        .unwrap_err();
    assert!(error.is_type(error_types::TERMINAL_CONFLICT));

    assert_eq!(h.job(job_id).await, after_first);
    assert_eq!(h.events.names_for(job_id), vec!["succeeded"]);
}

#[tokio::test]
async fn success_round_trip_by_attempt_id() {
    let h = Harness::new();
    let connection_id = Uuid::now_v7();
    let job_id = h.create_job(connection_id).await;
    let attempt_id = h
        .call("createNewAttempt", json!({ "jobId": job_id }))
        .await
        .unwrap()["attemptId"]
        .as_i64()
        .unwrap();

    h.call(
        "jobSuccess",
        json!({
            "jobId": job_id,
            "attemptId": attempt_id,
            "connectionId": connection_id,
            "standardSyncOutput": { "recordsSynced": 3 },
        }),
    )
    .await
    .unwrap();

    let job = h.job(job_id).await;
    assert_eq!(job.status, JobStatus::Succeeded);
    assert_eq!(job.attempts.len(), 1);
    assert_eq!(i64::from(job.attempts[0].id), attempt_id);
    assert_eq!(
        job.attempts[0].sync_output,
        Some(SyncOutput::new(json!({ "recordsSynced": 3 })))
    );
}

#[tokio::test]
async fn repeated_terminal_calls_are_idempotent() {
    let h = Harness::new();
    let connection_id = Uuid::now_v7();

    let failed = h.create_job(connection_id).await;
    h.create_attempt_number(failed).await;
    let failure = json!({
        "jobId": failed,
        "connectionId": connection_id,
        "attemptNumber": 0,
        "reason": "destination unreachable",
    });
    h.call("jobFailure", failure.clone()).await.unwrap();
    let snapshot = h.job(failed).await;
    h.call("jobFailure", failure).await.unwrap();
    assert_eq!(h.job(failed).await, snapshot);
    assert_eq!(snapshot.failure_reason.as_deref(), Some("destination unreachable"));

    let cancelled = h.create_job(connection_id).await;
    let cancel = json!({ "jobId": cancelled, "attemptNumber": 0, "connectionId": connection_id });
    h.call("jobCancelledWithAttemptNumber", cancel.clone())
        .await
        .unwrap();
    let snapshot = h.job(cancelled).await;
    h.call("jobCancelledWithAttemptNumber", cancel).await.unwrap();
    assert_eq!(h.job(cancelled).await, snapshot);
    assert_eq!(snapshot.status, JobStatus::Cancelled);

    assert_eq!(h.events.names_for(failed), vec!["failed"]);
    assert_eq!(h.events.names_for(cancelled), vec!["cancelled"]);
}

#[tokio::test]
async fn clean_job_state_leaves_no_live_job() {
    let h = Harness::new();
    let connection_id = Uuid::now_v7();

    let pending = Job::new(7, connection_id);
    h.store.insert_job(pending);
    let mut succeeded = Job::new(3, connection_id);
    succeeded.status = JobStatus::Succeeded;
    h.store.insert_job(succeeded);

    let input = json!({ "connectionId": connection_id });
    h.call("ensureCleanJobState", input.clone()).await.unwrap();
    assert!(h.live_jobs(connection_id).await.is_empty());
    assert_eq!(h.job(3).await.status, JobStatus::Succeeded);

    // Nothing left to clean
    let before = h.events.events().len();
    h.call("ensureCleanJobState", input).await.unwrap();
    assert_eq!(h.events.events().len(), before);
}

#[tokio::test]
async fn report_job_start_does_not_change_outcome() {
    let h = Harness::new();
    let connection_id = Uuid::now_v7();
    let job_id = h.create_job(connection_id).await;
    let input = json!({ "jobId": job_id, "connectionId": connection_id });

    h.call("reportJobStart", input.clone()).await.unwrap();
    h.create_attempt_number(job_id).await;
    h.call("reportJobStart", input.clone()).await.unwrap();
    assert_eq!(h.job(job_id).await.status, JobStatus::Running);

    h.call(
        "jobCancelledWithAttemptNumber",
        json!({ "jobId": job_id, "attemptNumber": 0, "connectionId": connection_id }),
    )
    .await
    .unwrap();
    h.call("reportJobStart", input).await.unwrap();

    let job = h.job(job_id).await;
    assert_eq!(job.status, JobStatus::Cancelled);
    assert!(job.started_at.is_some());
    assert_eq!(
        h.events.names_for(job_id),
        vec!["started", "started", "cancelled", "started"]
    );
}
