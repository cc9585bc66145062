//! Job store state machine and claim contention tests.

use std::str::FromStr;

use fovea_db::{open_file, open_memory, DbError, JobStore, NewJob, ToolSelection};
use fovea_protocol::{JobId, JobStatus, JobType};

fn new_job(plugin: &str, selection: ToolSelection) -> NewJob {
    let job_id = JobId::generate();
    NewJob {
        job_id,
        plugin_id: plugin.to_string(),
        selection,
        input_path: format!("{job_id}.png"),
    }
}

#[tokio::test]
async fn insert_then_get_round_trips() {
    let store = JobStore::new(open_memory().await.unwrap());
    let job = new_job("ocr", ToolSelection::Single("extract_text".into()));
    let job_id = job.job_id;

    store.insert(job).await.unwrap();
    let record = store.get(job_id).await.unwrap();

    assert_eq!(record.job_id, job_id);
    assert_eq!(record.status, JobStatus::Pending);
    assert_eq!(record.job_type, JobType::Single);
    assert_eq!(record.tool.as_deref(), Some("extract_text"));
    assert!(record.tool_list.is_none());
    assert!(record.output_path.is_none());
    assert!(record.error_message.is_none());
}

#[tokio::test]
async fn duplicate_insert_is_rejected() {
    let store = JobStore::new(open_memory().await.unwrap());
    let job = new_job("ocr", ToolSelection::Single("extract_text".into()));

    store.insert(job.clone()).await.unwrap();
    let err = store.insert(job).await.unwrap_err();
    assert!(matches!(err, DbError::DuplicateId(_)));
}

#[tokio::test]
async fn multi_tool_list_preserves_order() {
    let store = JobStore::new(open_memory().await.unwrap());
    let tools = vec!["player_detection".to_string(), "ball_detection".to_string()];
    let job = new_job("yolo-tracker", ToolSelection::Multi(tools.clone()));
    let job_id = job.job_id;

    store.insert(job).await.unwrap();
    let record = store.get(job_id).await.unwrap();

    assert_eq!(record.job_type, JobType::Multi);
    assert_eq!(record.tool_list.as_deref(), Some(tools.as_slice()));
    assert_eq!(record.tools_to_run(), tools);
}

#[tokio::test]
async fn claim_takes_oldest_pending_first() {
    let store = JobStore::new(open_memory().await.unwrap());

    let first = new_job("ocr", ToolSelection::Single("extract_text".into()));
    let second = new_job("ocr", ToolSelection::Single("extract_text".into()));
    store.insert(first.clone()).await.unwrap();
    // created_at has sub-millisecond resolution; a short pause keeps
    // insertion order unambiguous.
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    store.insert(second.clone()).await.unwrap();

    let claimed = store.claim_oldest_pending().await.unwrap().unwrap();
    assert_eq!(claimed.job_id, first.job_id);
    assert_eq!(claimed.status, JobStatus::Running);

    let claimed = store.claim_oldest_pending().await.unwrap().unwrap();
    assert_eq!(claimed.job_id, second.job_id);

    assert!(store.claim_oldest_pending().await.unwrap().is_none());
}

#[tokio::test]
async fn finalize_success_records_output() {
    let store = JobStore::new(open_memory().await.unwrap());
    let job = new_job("ocr", ToolSelection::Single("extract_text".into()));
    let job_id = job.job_id;
    store.insert(job).await.unwrap();
    store.claim_oldest_pending().await.unwrap().unwrap();

    let output_key = format!("output/{job_id}.json");
    store.finalize_success(job_id, &output_key).await.unwrap();

    let record = store.get(job_id).await.unwrap();
    assert_eq!(record.status, JobStatus::Completed);
    assert_eq!(record.output_path.as_deref(), Some(output_key.as_str()));
    assert!(record.error_message.is_none());
}

#[tokio::test]
async fn finalize_failure_records_message_and_clears_output() {
    let store = JobStore::new(open_memory().await.unwrap());
    let job = new_job("ocr", ToolSelection::Single("extract_text".into()));
    let job_id = job.job_id;
    store.insert(job).await.unwrap();
    store.claim_oldest_pending().await.unwrap().unwrap();

    store.finalize_failure(job_id, "tool exploded").await.unwrap();

    let record = store.get(job_id).await.unwrap();
    assert_eq!(record.status, JobStatus::Failed);
    assert_eq!(record.error_message.as_deref(), Some("tool exploded"));
    assert!(record.output_path.is_none());
}

#[tokio::test]
async fn finalize_requires_running_state() {
    let store = JobStore::new(open_memory().await.unwrap());
    let job = new_job("ocr", ToolSelection::Single("extract_text".into()));
    let job_id = job.job_id;
    store.insert(job).await.unwrap();

    // pending -> completed is not a legal edge
    let err = store.finalize_success(job_id, "output/x.json").await.unwrap_err();
    assert!(matches!(err, DbError::IllegalTransition { .. }));

    store.claim_oldest_pending().await.unwrap().unwrap();
    store.finalize_success(job_id, "output/x.json").await.unwrap();

    // A second finalize must not rewrite the terminal row
    let err = store.finalize_failure(job_id, "too late").await.unwrap_err();
    assert!(matches!(err, DbError::IllegalTransition { .. }));

    let record = store.get(job_id).await.unwrap();
    assert_eq!(record.status, JobStatus::Completed);
    assert!(record.error_message.is_none());
}

#[tokio::test]
async fn progress_updates_drop_outside_running() {
    let store = JobStore::new(open_memory().await.unwrap());
    let job = new_job("ocr", ToolSelection::Single("extract_text".into()));
    let job_id = job.job_id;
    store.insert(job).await.unwrap();

    // Dropped: still pending
    store.update_progress(job_id, 50).await.unwrap();
    assert!(store.get(job_id).await.unwrap().progress.is_none());

    store.claim_oldest_pending().await.unwrap().unwrap();
    store.update_progress(job_id, 50).await.unwrap();
    assert_eq!(store.get(job_id).await.unwrap().progress, Some(50));
}

#[tokio::test]
async fn get_unknown_id_is_not_found() {
    let store = JobStore::new(open_memory().await.unwrap());
    let err = store.get(JobId::generate()).await.unwrap_err();
    assert!(matches!(err, DbError::NotFound(_)));
}

#[tokio::test]
async fn orphaned_running_jobs_fail_at_startup() {
    let store = JobStore::new(open_memory().await.unwrap());
    let job = new_job("ocr", ToolSelection::Single("extract_text".into()));
    let job_id = job.job_id;
    store.insert(job).await.unwrap();
    store.claim_oldest_pending().await.unwrap().unwrap();

    let recovered = store
        .fail_orphaned_running("worker crashed before the job finished")
        .await
        .unwrap();
    assert_eq!(recovered, 1);

    let record = store.get(job_id).await.unwrap();
    assert_eq!(record.status, JobStatus::Failed);
    assert!(record.error_message.is_some());

    // Nothing left to recover
    assert_eq!(store.fail_orphaned_running("again").await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_claims_hand_out_each_job_once() {
    let dir = tempfile::tempdir().unwrap();
    let pool = open_file(&dir.path().join("jobs.db")).await.unwrap();
    let store = JobStore::new(pool);

    for _ in 0..8 {
        store
            .insert(new_job("ocr", ToolSelection::Single("extract_text".into())))
            .await
            .unwrap();
    }

    let mut handles = Vec::new();
    for _ in 0..4 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let mut claimed = Vec::new();
            while let Some(job) = store.claim_oldest_pending().await.unwrap() {
                claimed.push(job.job_id);
            }
            claimed
        }));
    }

    let mut all: Vec<JobId> = Vec::new();
    for handle in handles {
        all.extend(handle.await.unwrap());
    }

    assert_eq!(all.len(), 8, "every job claimed exactly once");
    all.sort();
    all.dedup();
    assert_eq!(all.len(), 8, "no job claimed twice");
}

#[tokio::test]
async fn status_survives_text_round_trip() {
    // The table stores status as text; make sure what we write is what the
    // enum parses back.
    for status in ["pending", "running", "completed", "failed"] {
        assert_eq!(JobStatus::from_str(status).unwrap().as_str(), status);
    }
}
