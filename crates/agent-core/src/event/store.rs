use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use uuid::Uuid;

use super::{WorkflowEvent, WorkflowEventKind};
use crate::errors::WorkflowError;

/// Almacenamiento de eventos append-only, particionado por workflow.
///
/// Contrato de concurrencia: dos appends simultáneos sobre el mismo
/// `workflow_id` nunca pueden devolver la misma secuencia; el backend debe
/// serializarlos o fallar con `ConcurrencyConflict` para que el caller
/// reintente bajo el lock por-workflow del engine.
pub trait EventLog: Send + Sync {
    /// Agrega un evento a partir de su kind y devuelve el evento completo
    /// (con seq y ts asignados por el backend).
    fn append_kind(&self, workflow_id: Uuid, kind: WorkflowEventKind) -> Result<WorkflowEvent, WorkflowError>;

    /// Lista los eventos con `seq > after_seq`, en orden ascendente. Es la
    /// entrada del replay.
    fn read_from(&self, workflow_id: Uuid, after_seq: u64) -> Result<Vec<WorkflowEvent>, WorkflowError>;

    /// Replay completo desde el inicio del log.
    fn read_all(&self, workflow_id: Uuid) -> Result<Vec<WorkflowEvent>, WorkflowError> {
        self.read_from(workflow_id, 0)
    }
}

pub struct InMemoryEventLog {
    inner: Mutex<HashMap<Uuid, Vec<WorkflowEvent>>>,
}

impl Default for InMemoryEventLog {
    fn default() -> Self {
        Self { inner: Mutex::new(HashMap::new()) }
    }
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, HashMap<Uuid, Vec<WorkflowEvent>>> {
        // Un panic con el lock tomado no deja datos a medio escribir (los
        // appends son push únicos), así que el estado envenenado se recupera.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl EventLog for InMemoryEventLog {
    fn append_kind(&self, workflow_id: Uuid, kind: WorkflowEventKind) -> Result<WorkflowEvent, WorkflowError> {
        let mut map = self.guard();
        let events = map.entry(workflow_id).or_default();
        let seq = events.last().map(|e| e.seq).unwrap_or(0) + 1;
        let ev = WorkflowEvent { id: Uuid::new_v4(),
                                 workflow_id,
                                 seq,
                                 kind,
                                 ts: Utc::now(),
                                 checkpoint_id: None };
        events.push(ev.clone());
        Ok(ev)
    }

    fn read_from(&self, workflow_id: Uuid, after_seq: u64) -> Result<Vec<WorkflowEvent>, WorkflowError> {
        let map = self.guard();
        Ok(map.get(&workflow_id)
              .map(|events| events.iter().filter(|e| e.seq > after_seq).cloned().collect())
              .unwrap_or_default())
    }
}

// Los stores compartidos entre "procesos" simulados (tests de recovery) se
// pasan por Arc; delegación directa.
impl<E: EventLog + ?Sized> EventLog for Arc<E> {
    fn append_kind(&self, workflow_id: Uuid, kind: WorkflowEventKind) -> Result<WorkflowEvent, WorkflowError> {
        (**self).append_kind(workflow_id, kind)
    }
    fn read_from(&self, workflow_id: Uuid, after_seq: u64) -> Result<Vec<WorkflowEvent>, WorkflowError> {
        (**self).read_from(workflow_id, after_seq)
    }
}
