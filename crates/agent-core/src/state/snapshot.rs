//! Vista plegada y reconstruible del workflow.
//!
//! `WorkflowState` se deriva EXCLUSIVAMENTE de plegar un checkpoint (o el
//! estado inicial vacío) con los eventos posteriores, en orden estricto de
//! secuencia. El fold es determinista y sin efectos: replay del mismo rango
//! produce siempre el mismo estado, que es lo que hace válida la recuperación
//! tras un reinicio.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::event::{WorkflowEvent, WorkflowEventKind};
use crate::signal::WorkflowSignal;
use crate::state::WorkflowStatus;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowState {
    pub workflow_id: Uuid,
    pub status: WorkflowStatus,
    pub current_iteration: u32,
    pub max_iterations: u32,
    pub conversation_history: Vec<Value>,
    pub agent_steps: Vec<Value>,
    pub agent_edits: Vec<Value>,
    /// Señales sin procesar. No participa del fold (las señales viven en su
    /// propio store); el engine la rellena después de plegar.
    #[serde(default)]
    pub pending_signals: Vec<WorkflowSignal>,
    pub custom_state: Map<String, Value>,
    /// Secuencia del último evento plegado. 0 = estado inicial vacío.
    pub last_event_sequence: u64,
}

impl WorkflowState {
    /// Estado vacío previo a cualquier evento (punto de partida del replay
    /// cuando no existe checkpoint).
    pub fn initial(workflow_id: Uuid) -> Self {
        Self { workflow_id,
               status: WorkflowStatus::Pending,
               current_iteration: 0,
               max_iterations: 0,
               conversation_history: Vec::new(),
               agent_steps: Vec::new(),
               agent_edits: Vec::new(),
               pending_signals: Vec::new(),
               custom_state: Map::new(),
               last_event_sequence: 0 }
    }

    /// Aplica el efecto de un evento. Los eventos de transición actualizan el
    /// status vía `status_effect`; los de progreso acumulan en los vectores.
    pub fn apply(&mut self, event: &WorkflowEvent) {
        if let Some(status) = event.kind.status_effect() {
            self.status = status;
        }
        match &event.kind {
            WorkflowEventKind::WorkflowStarted { max_iterations, .. } => {
                self.max_iterations = *max_iterations;
                self.current_iteration = 0;
            }
            WorkflowEventKind::AgentStepRecorded { step } => {
                self.agent_steps.push(step.clone());
            }
            WorkflowEventKind::AgentEditRecorded { edit } => {
                self.agent_edits.push(edit.clone());
            }
            WorkflowEventKind::MessageAppended { message } => {
                self.conversation_history.push(message.clone());
            }
            WorkflowEventKind::IterationAdvanced { iteration } => {
                self.current_iteration = *iteration;
            }
            WorkflowEventKind::CustomStateUpdated { key, value } => {
                self.custom_state.insert(key.clone(), value.clone());
            }
            _ => {}
        }
        self.last_event_sequence = event.seq;
    }

    /// Pliega un rango de eventos sobre un estado base, en orden ascendente.
    pub fn fold(base: WorkflowState, events: &[WorkflowEvent]) -> WorkflowState {
        let mut state = base;
        for event in events {
            debug_assert!(event.seq > state.last_event_sequence,
                          "replay fuera de orden: seq {} tras {}",
                          event.seq,
                          state.last_event_sequence);
            state.apply(event);
        }
        state
    }
}
