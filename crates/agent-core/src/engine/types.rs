//! Tipos de la API hacia el Agent Driver y metadata derivada del log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::WorkflowError;
use crate::event::{WorkflowEvent, WorkflowEventKind};
use crate::state::WorkflowStatus;

/// Request de arranque. `max_iterations == 0` delega en el default del
/// sustrato; `metadata` es un payload opaco del driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartWorkflowRequest {
    pub project_id: String,
    pub task: String,
    pub owner_id: String,
    pub max_iterations: u32,
    pub metadata: Option<Value>,
    pub git_url: Option<String>,
    pub branch: Option<String>,
    pub parent_workflow_id: Option<Uuid>,
}

impl StartWorkflowRequest {
    pub fn new(project_id: &str, task: &str, owner_id: &str, max_iterations: u32) -> Self {
        Self { project_id: project_id.to_string(),
               task: task.to_string(),
               owner_id: owner_id.to_string(),
               max_iterations,
               metadata: None,
               git_url: None,
               branch: None,
               parent_workflow_id: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartWorkflowResponse {
    pub workflow_id: Uuid,
    pub status: WorkflowStatus,
    pub created_at: DateTime<Utc>,
}

/// Metadata de ciclo de vida. Se deriva por completo del event log (el engine
/// no cachea nada entre llamadas): `created_at` es el ts del primer evento,
/// `updated_at` el del último evento de transición, `completed_at` se fija una
/// única vez al entrar a un status terminal y `version` es la última
/// secuencia conocida.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowMetadata {
    pub workflow_id: Uuid,
    pub project_id: String,
    pub task: String,
    pub status: WorkflowStatus,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub parent_workflow_id: Option<Uuid>,
    pub version: u64,
}

impl WorkflowMetadata {
    /// Reconstruye la metadata desde el replay completo del log.
    pub fn from_events(workflow_id: Uuid, events: &[WorkflowEvent]) -> Result<Self, WorkflowError> {
        let first = events.first().ok_or(WorkflowError::NotFound(workflow_id))?;
        let (project_id, task, owner_id, parent) = match &first.kind {
            WorkflowEventKind::WorkflowStarted { project_id,
                                                 task,
                                                 owner_id,
                                                 parent_workflow_id,
                                                 .. } => {
                (project_id.clone(), task.clone(), owner_id.clone(), *parent_workflow_id)
            }
            other => {
                return Err(WorkflowError::Serialization(format!(
                    "first event of {workflow_id} is not WorkflowStarted: {other:?}"
                )));
            }
        };

        let mut status = WorkflowStatus::Pending;
        let mut updated_at = first.ts;
        let mut completed_at = None;
        for event in events {
            if let Some(next) = event.kind.status_effect() {
                status = next;
                updated_at = event.ts;
                if next.is_terminal() && completed_at.is_none() {
                    completed_at = Some(event.ts);
                }
            }
        }

        Ok(Self { workflow_id,
                  project_id,
                  task,
                  status,
                  owner_id,
                  created_at: first.ts,
                  updated_at,
                  completed_at,
                  parent_workflow_id: parent,
                  version: events.last().map(|e| e.seq).unwrap_or(0) })
    }
}
