//! Tipos de evento del workflow y estructura `WorkflowEvent`.
//!
//! Rol en el sistema:
//! - Cada operación mutadora del `WorkflowEngine` emite eventos a un
//!   `EventLog` append-only.
//! - El estado actual (`WorkflowState`) se reconstruye exclusivamente
//!   plegando estos eventos en orden de secuencia (replay determinista).
//! - El enum `WorkflowEventKind` define el contrato observable y estable del
//!   sustrato; los payloads opacos (`step`, `edit`, `message`, `value`) son
//!   JSON que el motor nunca inspecciona.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::state::WorkflowStatus;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum WorkflowEventKind {
    /// Arranque del workflow. Invariante: debe ser el primer evento (seq 1)
    /// de un `workflow_id` y fija el presupuesto de iteraciones.
    WorkflowStarted {
        project_id: String,
        task: String,
        owner_id: String,
        max_iterations: u32,
        metadata: Option<Value>,
        git_url: Option<String>,
        branch: Option<String>,
        parent_workflow_id: Option<Uuid>,
    },
    /// Progreso del agente: un paso de razonamiento/herramienta (payload opaco).
    AgentStepRecorded { step: Value },
    /// Edición de archivo producida por el agente (payload opaco).
    AgentEditRecorded { edit: Value },
    /// Mensaje añadido a la conversación (payload opaco).
    MessageAppended { message: Value },
    /// Avance del contador de iteraciones del loop del agente.
    IterationAdvanced { iteration: u32 },
    /// Actualización de una clave del estado custom del driver.
    CustomStateUpdated { key: String, value: Value },
    /// RUNNING -> PAUSED: el workflow queda a la espera de input externo.
    WorkflowPaused { reason: Option<String> },
    /// PAUSED -> RUNNING.
    WorkflowResumed,
    /// Cierre terminal exitoso.
    WorkflowCompleted,
    /// Cierre terminal por error lógico irrecuperable del propio workflow.
    WorkflowFailed { reason: String },
    /// Cierre terminal por cancelación externa.
    WorkflowCancelled,
}

impl WorkflowEventKind {
    /// Status que este evento impone al estado plegado, si es un evento de
    /// transición. Lo consumen tanto el fold como la derivación de metadata,
    /// para que ambos lean el log de la misma manera.
    pub fn status_effect(&self) -> Option<WorkflowStatus> {
        match self {
            WorkflowEventKind::WorkflowStarted { .. } => Some(WorkflowStatus::Running),
            WorkflowEventKind::WorkflowPaused { .. } => Some(WorkflowStatus::Paused),
            WorkflowEventKind::WorkflowResumed => Some(WorkflowStatus::Running),
            WorkflowEventKind::WorkflowCompleted => Some(WorkflowStatus::Completed),
            WorkflowEventKind::WorkflowFailed { .. } => Some(WorkflowStatus::Failed),
            WorkflowEventKind::WorkflowCancelled => Some(WorkflowStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowEvent {
    pub id: Uuid,
    pub workflow_id: Uuid,
    /// Secuencia por workflow, estrictamente creciente desde 1, sin huecos.
    pub seq: u64,
    pub kind: WorkflowEventKind,
    pub ts: DateTime<Utc>, // metadato: no participa del fold
    /// Enlace opcional al checkpoint que cubre este evento. Lo rellenan los
    /// backends durables que etiquetan el log al compactar; el log en memoria
    /// lo deja en `None`.
    pub checkpoint_id: Option<Uuid>,
}
