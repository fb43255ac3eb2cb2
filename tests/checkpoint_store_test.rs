//! Behaviour shared by every checkpoint store implementation.

use std::path::PathBuf;
use std::sync::Arc;

use buildfix::adapters::checkpoint::JsonFileCheckpointStore;
use buildfix::adapters::sqlite::SqliteCheckpointStore;
use buildfix::domain::errors::DomainError;
use buildfix::domain::models::{
    AgentResult, CategoryId, FixReport, IterationRecord, RunState, RunStatus,
};
use buildfix::domain::ports::CheckpointStore;
use chrono::Utc;

fn sample_state(run_id: &str, iterations: u32) -> RunState {
    let mut state = RunState::with_id(run_id, 10);
    for iteration in 1..=iterations {
        let mut report = FixReport::default();
        report.resolve(2);
        report.touch(PathBuf::from(format!("/ws/File{iteration}.cs")));
        state.push_iteration(IterationRecord {
            iteration,
            errors_before: 10 - iteration as usize,
            errors_after: Some(9 - iteration as usize),
            uncategorized: 0,
            unlocated: 0,
            results: vec![AgentResult::from_report(
                CategoryId::new("dupes"),
                "remove_duplicate",
                3,
                1,
                report,
            )],
            interrupted: false,
            timestamp: Utc::now(),
        });
    }
    state.outstanding.insert(CategoryId::new("dupes"), 4);
    state
}

async fn exercise(store: Arc<dyn CheckpointStore>) {
    assert!(store.latest().await.unwrap().is_none());
    assert!(matches!(
        store.load("missing").await,
        Err(DomainError::RunNotFound(_))
    ));

    let mut first = sample_state("run-a", 1);
    store.save(&first).await.unwrap();
    let second = sample_state("run-b", 2);
    store.save(&second).await.unwrap();
    assert_eq!(store.latest().await.unwrap().as_deref(), Some("run-b"));

    // Re-saving an older run makes it the latest again.
    first.push_iteration(IterationRecord {
        iteration: 2,
        errors_before: 8,
        errors_after: Some(8),
        uncategorized: 1,
        unlocated: 0,
        results: vec![],
        interrupted: true,
        timestamp: Utc::now(),
    });
    first.set_status(RunStatus::Stalled);
    store.save(&first).await.unwrap();
    assert_eq!(store.latest().await.unwrap().as_deref(), Some("run-a"));

    let loaded = store.load("run-a").await.unwrap();
    assert_eq!(loaded, first);
    assert_eq!(loaded.history.len(), 2);
    assert!(loaded.history[1].interrupted);

    let listed = store.list().await.unwrap();
    let ids: Vec<_> = listed.iter().map(|s| s.run_id.as_str()).collect();
    assert_eq!(ids, vec!["run-a", "run-b"]);
}

#[tokio::test]
async fn json_store_contract() {
    let dir = tempfile::tempdir().unwrap();
    exercise(Arc::new(JsonFileCheckpointStore::new(dir.path().join("runs")))).await;
}

#[tokio::test]
async fn sqlite_store_contract() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteCheckpointStore::open(&dir.path().join("buildfix.db"))
        .await
        .unwrap();
    exercise(Arc::new(store)).await;
}

#[tokio::test]
async fn sqlite_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("buildfix.db");
    let state = sample_state("durable", 3);

    {
        let store = SqliteCheckpointStore::open(&path).await.unwrap();
        store.save(&state).await.unwrap();
    }

    let reopened = SqliteCheckpointStore::open(&path).await.unwrap();
    assert_eq!(reopened.latest().await.unwrap().as_deref(), Some("durable"));
    assert_eq!(reopened.load("durable").await.unwrap(), state);
}

#[tokio::test]
async fn json_checkpoint_is_human_readable() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileCheckpointStore::new(dir.path());
    store.save(&sample_state("readable", 1)).await.unwrap();

    let text = std::fs::read_to_string(dir.path().join("readable.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["schema_version"], 1);
    assert_eq!(value["status"]["state"], "running");
    assert_eq!(value["history"][0]["results"][0]["outcome"], "partial");
    assert!(text.contains('\n'), "checkpoint should be pretty-printed");
}

#[tokio::test]
async fn newer_schema_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileCheckpointStore::new(dir.path());
    let mut state = sample_state("future", 0);
    state.schema_version = 99;
    store.save(&state).await.unwrap();

    assert!(matches!(
        store.load("future").await,
        Err(DomainError::UnsupportedCheckpointVersion { found: 99, .. })
    ));
}
