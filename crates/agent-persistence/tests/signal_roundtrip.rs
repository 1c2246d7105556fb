use agent_core::{SignalStore, WorkflowError, WorkflowSignal};
use agent_persistence::pg::{PgSignalStore, PoolProvider};
use serde_json::json;
use uuid::Uuid;

use test_support::with_pool;

#[test]
fn enqueue_and_list_oldest_first() {
    let pool = match with_pool(|p| p.clone()) {
        Some(p) => p,
        None => {
            eprintln!("skip enqueue_and_list_oldest_first (no DATABASE_URL)");
            return;
        }
    };
    let store = PgSignalStore::new(PoolProvider { pool });
    let workflow_id = Uuid::new_v4();

    let first = WorkflowSignal::new(workflow_id, "user_feedback", json!({"n": 1}));
    let second = WorkflowSignal::new(workflow_id, "approval", json!({"n": 2}));
    store.enqueue(first.clone()).expect("enqueue first");
    store.enqueue(second.clone()).expect("enqueue second");

    let pending = store.unprocessed(workflow_id).expect("unprocessed");
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].id, first.id, "la más antigua primero");
    assert_eq!(pending[1].id, second.id);
    assert!(pending.iter().all(|s| !s.processed));
}

#[test]
fn mark_processed_is_idempotent() {
    let pool = match with_pool(|p| p.clone()) {
        Some(p) => p,
        None => {
            eprintln!("skip mark_processed_is_idempotent (no DATABASE_URL)");
            return;
        }
    };
    let store = PgSignalStore::new(PoolProvider { pool });
    let workflow_id = Uuid::new_v4();

    let signal = WorkflowSignal::new(workflow_id, "user_feedback", json!({"msg": "lgtm"}));
    store.enqueue(signal.clone()).expect("enqueue");

    let marked = store.mark_processed(signal.id).expect("primer mark");
    assert!(marked.processed);
    let processed_at = marked.processed_at.expect("processed_at fijado");

    // Re-marcar devuelve el registro tal cual, sin tocar processed_at.
    let again = store.mark_processed(signal.id).expect("segundo mark");
    assert!(again.processed);
    assert_eq!(again.processed_at, Some(processed_at));

    // Ya no aparece entre las pendientes.
    let pending = store.unprocessed(workflow_id).expect("unprocessed");
    assert!(pending.iter().all(|s| s.id != signal.id));
}

#[test]
fn mark_unknown_signal_is_not_found() {
    let pool = match with_pool(|p| p.clone()) {
        Some(p) => p,
        None => {
            eprintln!("skip mark_unknown_signal_is_not_found (no DATABASE_URL)");
            return;
        }
    };
    let store = PgSignalStore::new(PoolProvider { pool });
    let ghost = Uuid::new_v4();
    assert_eq!(store.mark_processed(ghost),
               Err(WorkflowError::SignalNotFound(ghost)));
}
