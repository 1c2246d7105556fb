use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use uuid::Uuid;

use super::WorkflowCheckpoint;
use crate::errors::WorkflowError;

/// Almacenamiento de checkpoints. Sólo crece: `save` exige secuencias
/// estrictamente monotónicas por workflow y `latest` devuelve el snapshot de
/// mayor secuencia.
pub trait CheckpointStore: Send + Sync {
    /// Persiste un checkpoint. Falla con `InvalidCheckpoint` si `seq` no
    /// supera al último almacenado para ese workflow.
    fn save(&self, checkpoint: WorkflowCheckpoint) -> Result<(), WorkflowError>;

    /// Snapshot de mayor secuencia, o `None` si aún no hay ninguno (la
    /// primera reconstrucción hace replay desde la secuencia 0).
    fn latest(&self, workflow_id: Uuid) -> Result<Option<WorkflowCheckpoint>, WorkflowError>;
}

pub struct InMemoryCheckpointStore {
    inner: Mutex<HashMap<Uuid, Vec<WorkflowCheckpoint>>>,
}

impl Default for InMemoryCheckpointStore {
    fn default() -> Self {
        Self { inner: Mutex::new(HashMap::new()) }
    }
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, HashMap<Uuid, Vec<WorkflowCheckpoint>>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CheckpointStore for InMemoryCheckpointStore {
    fn save(&self, checkpoint: WorkflowCheckpoint) -> Result<(), WorkflowError> {
        let mut map = self.guard();
        let stored = map.entry(checkpoint.workflow_id).or_default();
        if let Some(latest) = stored.last() {
            if checkpoint.seq <= latest.seq {
                return Err(WorkflowError::InvalidCheckpoint { proposed: checkpoint.seq,
                                                              latest: latest.seq });
            }
        }
        stored.push(checkpoint);
        Ok(())
    }

    fn latest(&self, workflow_id: Uuid) -> Result<Option<WorkflowCheckpoint>, WorkflowError> {
        let map = self.guard();
        Ok(map.get(&workflow_id).and_then(|v| v.last().cloned()))
    }
}

impl<C: CheckpointStore + ?Sized> CheckpointStore for Arc<C> {
    fn save(&self, checkpoint: WorkflowCheckpoint) -> Result<(), WorkflowError> {
        (**self).save(checkpoint)
    }
    fn latest(&self, workflow_id: Uuid) -> Result<Option<WorkflowCheckpoint>, WorkflowError> {
        (**self).latest(workflow_id)
    }
}
