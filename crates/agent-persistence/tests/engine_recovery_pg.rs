//! Recuperación tras "reinicio de proceso": un engine nuevo sobre el mismo
//! pool debe reconstruir exactamente el estado del anterior vía
//! checkpoint + sufijo de eventos.

use agent_core::{StartWorkflowRequest, WorkflowEngine, WorkflowStatus};
use agent_persistence::pg::{PgCheckpointStore, PgEventLog, PgPool, PgSignalStore, PoolProvider};
use serde_json::json;

use test_support::with_pool;

fn engine_over(pool: &PgPool)
               -> WorkflowEngine<PgEventLog<PoolProvider>, PgCheckpointStore<PoolProvider>, PgSignalStore<PoolProvider>> {
    WorkflowEngine::new_with_stores(PgEventLog::new(PoolProvider { pool: pool.clone() }),
                                    PgCheckpointStore::new(PoolProvider { pool: pool.clone() }),
                                    PgSignalStore::new(PoolProvider { pool: pool.clone() }))
}

#[test]
fn new_engine_recovers_state_from_pg() {
    let pool = match with_pool(|p| p.clone()) {
        Some(p) => p,
        None => {
            eprintln!("skip new_engine_recovers_state_from_pg (no DATABASE_URL)");
            return;
        }
    };

    let workflow_id = {
        let engine = engine_over(&pool);
        let started = engine.start(StartWorkflowRequest::new("proj-recovery", "long task", "owner-1", 10))
                            .expect("start");
        for i in 0..3 {
            engine.record_step(started.workflow_id, json!({"tool": "bash", "i": i}))
                  .expect("step");
        }
        let checkpoint = engine.checkpoint_now(started.workflow_id).expect("checkpoint");
        assert_eq!(checkpoint.seq, 4, "start + 3 pasos");
        engine.signal(started.workflow_id, "user_feedback", json!({"note": "keep going"}))
              .expect("signal");
        started.workflow_id
        // engine dropeado acá: simula la muerte del proceso
    };

    let engine = engine_over(&pool);
    let state = engine.current_state(workflow_id).expect("current_state");
    assert_eq!(state.status, WorkflowStatus::Running);
    assert_eq!(state.last_event_sequence, 4);
    assert_eq!(state.agent_steps.len(), 3);
    assert_eq!(state.pending_signals.len(), 1, "la señal sobrevive el reinicio");
    assert_eq!(state.pending_signals[0].signal_name, "user_feedback");

    // El workflow sigue operable: progresa y cierra.
    engine.record_step(workflow_id, json!({"tool": "edit"})).expect("step post-restart");
    engine.complete(workflow_id).expect("complete");
    let meta = engine.metadata(workflow_id).expect("metadata");
    assert_eq!(meta.status, WorkflowStatus::Completed);
    assert!(meta.completed_at.is_some());
    assert_eq!(meta.version, 6);
}
