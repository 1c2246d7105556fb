//! Snapshot completo del estado de un workflow, etiquetado por secuencia.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::WorkflowError;
use crate::state::WorkflowState;

/// Snapshot inmutable. Invariante: `seq` es la secuencia del último evento
/// plegado dentro de `state`; un checkpoint nunca se muta, sólo lo supersede
/// uno posterior con `seq` mayor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowCheckpoint {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub seq: u64,
    /// `WorkflowState` serializado. Opaco para los stores.
    pub state: Value,
    pub created_at: DateTime<Utc>,
    pub size_bytes: u64,
}

impl WorkflowCheckpoint {
    /// Congela un estado plegado en un snapshot nuevo.
    pub fn from_state(state: &WorkflowState) -> Result<Self, WorkflowError> {
        let payload = serde_json::to_value(state)?;
        let size_bytes = serde_json::to_vec(&payload)?.len() as u64;
        Ok(Self { id: Uuid::new_v4(),
                  workflow_id: state.workflow_id,
                  seq: state.last_event_sequence,
                  state: payload,
                  created_at: Utc::now(),
                  size_bytes })
    }

    /// Decodifica el estado embebido.
    pub fn decode_state(&self) -> Result<WorkflowState, WorkflowError> {
        Ok(serde_json::from_value(self.state.clone())?)
    }
}
