//! Integración end-to-end del sustrato: ciclo de vida completo con señales y
//! recuperación, en memoria y (si hay DATABASE_URL) sobre Postgres.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use agent_core::{InMemoryCheckpointStore, InMemoryEventLog, InMemorySignalStore, StartWorkflowRequest,
                 WorkflowEngine, WorkflowStatus};
use serde_json::json;

#[test]
fn pause_await_signal_resume_complete() {
    let engine = Arc::new(WorkflowEngine::builder().build());
    let started = engine.start(StartWorkflowRequest::new("proj-int", "needs approval", "owner-1", 10))
                        .expect("start");
    let workflow_id = started.workflow_id;

    engine.record_step(workflow_id, json!({"tool": "plan"})).expect("step");
    engine.pause(workflow_id, Some("waiting for human".into())).expect("pause");

    let waiter = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || engine.await_signal(workflow_id, "approval", 5_000))
    };
    thread::sleep(Duration::from_millis(50));
    engine.signal(workflow_id, "approval", json!({"ok": true})).expect("signal");

    let received = waiter.join().expect("join").expect("signal received");
    assert_eq!(received.signal_name, "approval");
    assert!(received.processed);

    engine.resume(workflow_id).expect("resume");
    engine.record_step(workflow_id, json!({"tool": "apply"})).expect("step post-resume");
    engine.complete(workflow_id).expect("complete");

    let meta = engine.metadata(workflow_id).expect("metadata");
    assert_eq!(meta.status, WorkflowStatus::Completed);
    let state = engine.current_state(workflow_id).expect("state");
    assert!(state.pending_signals.is_empty());
    assert_eq!(state.agent_steps.len(), 2);
}

#[test]
fn restart_resumes_from_checkpoint_and_tail() {
    let event_log = Arc::new(InMemoryEventLog::new());
    let checkpoints = Arc::new(InMemoryCheckpointStore::new());
    let signals = Arc::new(InMemorySignalStore::new());

    let workflow_id = {
        let engine = WorkflowEngine::new_with_stores(Arc::clone(&event_log),
                                                     Arc::clone(&checkpoints),
                                                     Arc::clone(&signals));
        let started = engine.start(StartWorkflowRequest::new("proj-int", "long task", "owner-1", 10))
                            .expect("start");
        for i in 0..2 {
            engine.record_step(started.workflow_id, json!({"i": i})).expect("step");
        }
        engine.checkpoint_now(started.workflow_id).expect("checkpoint");
        // eventos posteriores al checkpoint: el replay debe plegarlos encima
        engine.record_step(started.workflow_id, json!({"i": 2})).expect("tail step");
        started.workflow_id
    };

    let engine = WorkflowEngine::new_with_stores(event_log, checkpoints, signals);
    let state = engine.current_state(workflow_id).expect("state");
    assert_eq!(state.status, WorkflowStatus::Running);
    assert_eq!(state.last_event_sequence, 4, "start + 3 pasos");
    assert_eq!(state.agent_steps.len(), 3, "checkpoint + sufijo");

    engine.complete(workflow_id).expect("complete");
    assert!(engine.record_step(workflow_id, json!({})).is_err(),
            "terminal: no acepta más progreso");
}

#[test]
fn full_lifecycle_over_postgres() {
    use agent_persistence::pg::{build_pool, PgCheckpointStore, PgEventLog, PgSignalStore, PoolProvider};

    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("DATABASE_URL not set; skipping integration test");
        return;
    }
    let cfg = agent_persistence::config::DbConfig::from_env();
    let pool = build_pool(&cfg.url, 1, 1).expect("pool");

    let engine = WorkflowEngine::new_with_stores(PgEventLog::new(PoolProvider { pool: pool.clone() }),
                                                 PgCheckpointStore::new(PoolProvider { pool: pool.clone() }),
                                                 PgSignalStore::new(PoolProvider { pool }));

    let started = engine.start(StartWorkflowRequest::new("proj-int-pg", "pg lifecycle", "owner-1", 10))
                        .expect("start");
    let workflow_id = started.workflow_id;
    engine.record_step(workflow_id, json!({"tool": "bash"})).expect("step");
    engine.advance_iteration(workflow_id).expect("iteration");
    let checkpoint = engine.checkpoint_now(workflow_id).expect("checkpoint");
    assert_eq!(checkpoint.seq, 3);

    engine.pause(workflow_id, None).expect("pause");
    engine.signal(workflow_id, "go", json!({})).expect("signal");
    let received = engine.await_signal(workflow_id, "go", 1_000).expect("await");
    assert!(received.processed);
    engine.resume(workflow_id).expect("resume");
    engine.complete(workflow_id).expect("complete");

    let meta = engine.metadata(workflow_id).expect("metadata");
    assert_eq!(meta.status, WorkflowStatus::Completed);
    assert!(meta.completed_at.is_some());
}
