//! Buzón de señales con espera bloqueante y timeout.
//!
//! Compone un `SignalStore` (registro durable) con un registro process-wide
//! de "gates" de espera por workflow. El protocolo de `await_signal` es el de
//! dos fases que elimina el wakeup perdido:
//!
//! 1. tomar el gate del workflow y, con el lock tomado, revisar las señales
//!    sin procesar en busca del nombre pedido;
//! 2. si no hay match, bloquearse en la condvar del mismo gate — el lock se
//!    libera atómicamente dentro de `wait_timeout`, así que cualquier
//!    `enqueue` posterior a la fase 1 (que también toma el gate) despierta
//!    sí o sí al waiter;
//! 3. al despertar, re-chequear por nombre (pudo llegar otra señal) y repetir
//!    contra el deadline original.
//!
//! El gate se crea al primer uso y se desregistra en `release` sólo cuando
//! ningún waiter conserva una referencia, de modo que un waiter bloqueado
//! nunca queda escuchando un gate huérfano.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use uuid::Uuid;

use super::{SignalStore, WorkflowSignal};
use crate::errors::WorkflowError;

/// Punto de suscripción de un workflow: contador de llegadas + condvar.
/// El contador sólo existe para que el `Mutex` tenga contenido observable;
/// la verdad sobre las señales vive en el store.
struct WaitGate {
    arrivals: Mutex<u64>,
    signal_added: Condvar,
}

impl WaitGate {
    fn new() -> Self {
        Self { arrivals: Mutex::new(0),
               signal_added: Condvar::new() }
    }
}

pub struct SignalMailbox<S: SignalStore> {
    store: S,
    gates: Mutex<HashMap<Uuid, Arc<WaitGate>>>,
}

impl<S: SignalStore> SignalMailbox<S> {
    pub fn new(store: S) -> Self {
        Self { store,
               gates: Mutex::new(HashMap::new()) }
    }

    fn gates_guard(&self) -> MutexGuard<'_, HashMap<Uuid, Arc<WaitGate>>> {
        self.gates.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn gate(&self, workflow_id: Uuid) -> Arc<WaitGate> {
        let mut gates = self.gates_guard();
        gates.entry(workflow_id).or_insert_with(|| Arc::new(WaitGate::new())).clone()
    }

    /// Persiste la señal y despierta a cualquier waiter del workflow.
    pub fn enqueue(&self, signal: WorkflowSignal) -> Result<(), WorkflowError> {
        let gate = self.gate(signal.workflow_id);
        let mut arrivals = gate.arrivals.lock().unwrap_or_else(|e| e.into_inner());
        self.store.enqueue(signal)?;
        *arrivals += 1;
        gate.signal_added.notify_all();
        Ok(())
    }

    /// Primera señal sin procesar, sin bloquear y sin marcarla.
    pub fn poll(&self, workflow_id: Uuid) -> Result<Option<WorkflowSignal>, WorkflowError> {
        Ok(self.store.unprocessed(workflow_id)?.into_iter().next())
    }

    pub fn unprocessed(&self, workflow_id: Uuid) -> Result<Vec<WorkflowSignal>, WorkflowError> {
        self.store.unprocessed(workflow_id)
    }

    pub fn mark_processed(&self, signal_id: Uuid) -> Result<WorkflowSignal, WorkflowError> {
        self.store.mark_processed(signal_id)
    }

    /// Bloquea hasta que llegue una señal con `signal_name`, la marca como
    /// procesada y la devuelve. `Timeout` si el deadline vence sin match.
    pub fn await_signal(&self,
                        workflow_id: Uuid,
                        signal_name: &str,
                        timeout: Duration)
                        -> Result<WorkflowSignal, WorkflowError> {
        let gate = self.gate(workflow_id);
        let deadline = Instant::now() + timeout;
        let result = self.wait_on_gate(&gate, workflow_id, signal_name, timeout, deadline);
        drop(gate);
        self.release(workflow_id);
        result
    }

    fn wait_on_gate(&self,
                    gate: &WaitGate,
                    workflow_id: Uuid,
                    signal_name: &str,
                    timeout: Duration,
                    deadline: Instant)
                    -> Result<WorkflowSignal, WorkflowError> {
        let mut arrivals = gate.arrivals.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            // Fase 1: chequeo bajo el gate. Un enqueue concurrente o bien ya
            // escribió (lo vemos aquí) o bien espera el gate (nos despertará).
            let existing = self.store
                               .unprocessed(workflow_id)?
                               .into_iter()
                               .find(|s| s.signal_name == signal_name);
            if let Some(signal) = existing {
                return self.store.mark_processed(signal.id);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(WorkflowError::Timeout { signal_name: signal_name.to_string(),
                                                    waited_ms: timeout.as_millis() as u64 });
            }

            // Fase 2: bloqueo. El lock se libera dentro de wait_timeout, por
            // lo que no existe ventana entre el chequeo y la suscripción.
            // Los despertares espurios y las señales de otro nombre se
            // resuelven re-entrando al loop contra el deadline original.
            let (guard, _timed_out) = gate.signal_added
                                          .wait_timeout(arrivals, remaining)
                                          .unwrap_or_else(|e| e.into_inner());
            arrivals = guard;
        }
    }

    /// Desregistra el gate del workflow si nadie más lo referencia. Los
    /// waiters activos conservan su `Arc`, así que el gate que escuchan no
    /// puede ser reemplazado por debajo.
    pub fn release(&self, workflow_id: Uuid) {
        let mut gates = self.gates_guard();
        let idle = gates.get(&workflow_id).map(|g| Arc::strong_count(g) == 1).unwrap_or(false);
        if idle {
            gates.remove(&workflow_id);
        }
    }
}
