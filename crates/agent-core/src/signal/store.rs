use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use uuid::Uuid;

use super::WorkflowSignal;
use crate::errors::WorkflowError;

/// Cara durable del buzón de señales: es la interfaz que implementan los
/// backends de almacenamiento (en memoria, Postgres). La espera bloqueante
/// vive en `SignalMailbox`, no aquí.
pub trait SignalStore: Send + Sync {
    /// Persiste la señal con `processed = false`.
    fn enqueue(&self, signal: WorkflowSignal) -> Result<(), WorkflowError>;

    /// Señales sin procesar del workflow, la más antigua primero.
    fn unprocessed(&self, workflow_id: Uuid) -> Result<Vec<WorkflowSignal>, WorkflowError>;

    /// Marca una señal como procesada y devuelve el registro actualizado.
    /// Idempotente: sobre una señal ya procesada devuelve el registro tal
    /// cual. `SignalNotFound` para ids desconocidos.
    fn mark_processed(&self, signal_id: Uuid) -> Result<WorkflowSignal, WorkflowError>;
}

pub struct InMemorySignalStore {
    inner: Mutex<HashMap<Uuid, Vec<WorkflowSignal>>>,
}

impl Default for InMemorySignalStore {
    fn default() -> Self {
        Self { inner: Mutex::new(HashMap::new()) }
    }
}

impl InMemorySignalStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, HashMap<Uuid, Vec<WorkflowSignal>>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SignalStore for InMemorySignalStore {
    fn enqueue(&self, signal: WorkflowSignal) -> Result<(), WorkflowError> {
        let mut map = self.guard();
        map.entry(signal.workflow_id).or_default().push(signal);
        Ok(())
    }

    fn unprocessed(&self, workflow_id: Uuid) -> Result<Vec<WorkflowSignal>, WorkflowError> {
        let map = self.guard();
        Ok(map.get(&workflow_id)
              .map(|signals| signals.iter().filter(|s| !s.processed).cloned().collect())
              .unwrap_or_default())
    }

    fn mark_processed(&self, signal_id: Uuid) -> Result<WorkflowSignal, WorkflowError> {
        let mut map = self.guard();
        for signals in map.values_mut() {
            if let Some(signal) = signals.iter_mut().find(|s| s.id == signal_id) {
                if !signal.processed {
                    signal.processed = true;
                    signal.processed_at = Some(Utc::now());
                }
                return Ok(signal.clone());
            }
        }
        Err(WorkflowError::SignalNotFound(signal_id))
    }
}

impl<S: SignalStore + ?Sized> SignalStore for Arc<S> {
    fn enqueue(&self, signal: WorkflowSignal) -> Result<(), WorkflowError> {
        (**self).enqueue(signal)
    }
    fn unprocessed(&self, workflow_id: Uuid) -> Result<Vec<WorkflowSignal>, WorkflowError> {
        (**self).unprocessed(workflow_id)
    }
    fn mark_processed(&self, signal_id: Uuid) -> Result<WorkflowSignal, WorkflowError> {
        (**self).mark_processed(signal_id)
    }
}
