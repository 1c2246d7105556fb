//! Propiedad central del sustrato: plegar (checkpoint + cola de eventos)
//! produce exactamente el mismo estado que plegar el log completo desde la
//! secuencia 1, para un checkpoint tomado en cualquier punto.

use agent_core::{EventLog, InMemoryEventLog, StartWorkflowRequest, WorkflowEngine, WorkflowState};
use serde_json::json;
use uuid::Uuid;

fn seeded_log(workflow_id: Uuid) -> InMemoryEventLog {
    use agent_core::WorkflowEventKind::*;
    let log = InMemoryEventLog::new();
    let kinds = vec![WorkflowStarted { project_id: "proj".into(),
                                       task: "refactor parser".into(),
                                       owner_id: "owner".into(),
                                       max_iterations: 8,
                                       metadata: Some(json!({"priority": "high"})),
                                       git_url: None,
                                       branch: None,
                                       parent_workflow_id: None },
                     MessageAppended { message: json!({"role": "user", "content": "arranca"}) },
                     AgentStepRecorded { step: json!({"tool": "read", "path": "src/lib.rs"}) },
                     IterationAdvanced { iteration: 1 },
                     AgentEditRecorded { edit: json!({"path": "src/lib.rs", "diff": "..."}) },
                     CustomStateUpdated { key: "phase".into(), value: json!("editing") },
                     WorkflowPaused { reason: Some("aprobación".into()) },
                     WorkflowResumed,
                     AgentStepRecorded { step: json!({"tool": "bash", "cmd": "cargo test"}) },
                     WorkflowCompleted];
    for kind in kinds {
        log.append_kind(workflow_id, kind).expect("append");
    }
    log
}

#[test]
fn fold_from_any_checkpoint_matches_full_replay() {
    let workflow_id = Uuid::new_v4();
    let log = seeded_log(workflow_id);
    let all = log.read_all(workflow_id).expect("read_all");
    let reference = WorkflowState::fold(WorkflowState::initial(workflow_id), &all);

    // Un "checkpoint" en cada prefijo posible del log.
    for cut in 0..all.len() {
        let base = WorkflowState::fold(WorkflowState::initial(workflow_id), &all[..cut]);
        let tail = log.read_from(workflow_id, base.last_event_sequence).expect("read_from");
        let rebuilt = WorkflowState::fold(base, &tail);
        assert_eq!(rebuilt, reference, "replay divergente con corte en {cut}");
    }
}

#[test]
fn engine_recovers_identical_state_through_checkpoint() {
    let engine = WorkflowEngine::builder().build();
    let workflow_id = engine.start(StartWorkflowRequest::new("proj", "task", "owner", 5))
                            .expect("start")
                            .workflow_id;
    for i in 0..3 {
        engine.record_step(workflow_id, json!({"n": i})).expect("step");
    }
    let checkpoint = engine.checkpoint_now(workflow_id).expect("checkpoint");
    assert_eq!(checkpoint.seq, 4);
    engine.record_step(workflow_id, json!({"n": 3})).expect("step");

    // El estado reconstruido (checkpoint + cola) debe coincidir evento a
    // evento con un fold completo del log.
    let recovered = engine.current_state(workflow_id).expect("state");
    let full = WorkflowState::fold(WorkflowState::initial(workflow_id),
                                   &engine.event_log.read_all(workflow_id).expect("read_all"));
    assert_eq!(recovered, full);
    assert_eq!(recovered.agent_steps.len(), 4);
}
