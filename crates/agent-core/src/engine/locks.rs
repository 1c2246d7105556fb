//! Registro process-wide de locks por workflow.
//!
//! Toda operación mutadora sobre un `workflow_id` (append, checkpoint,
//! transición) se serializa tomando su lock exclusivo durante la operación
//! completa. El registro se crea una vez junto con el engine y muere con él;
//! nunca se accede por fuera de `scope`/`release`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use uuid::Uuid;

pub struct WorkflowLocks {
    inner: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl Default for WorkflowLocks {
    fn default() -> Self {
        Self { inner: Mutex::new(HashMap::new()) }
    }
}

impl WorkflowLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, HashMap<Uuid, Arc<Mutex<()>>>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Lock exclusivo del workflow, creado on-demand. El caller lo toma por
    /// la duración de la operación mutadora.
    pub fn scope(&self, workflow_id: Uuid) -> Arc<Mutex<()>> {
        let mut map = self.guard();
        map.entry(workflow_id).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// Descarta el lock de un workflow terminal si nadie lo tiene tomado.
    /// Si otro hilo conserva el `Arc`, la entrada se mantiene para no romper
    /// la exclusión mutua.
    pub fn release(&self, workflow_id: Uuid) {
        let mut map = self.guard();
        let idle = map.get(&workflow_id).map(|l| Arc::strong_count(l) == 1).unwrap_or(false);
        if idle {
            map.remove(&workflow_id);
        }
    }
}
