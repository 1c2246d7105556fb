//! Core WorkflowEngine implementation

use std::time::Duration;

use serde_json::Value;
use uuid::Uuid;

use crate::checkpoint::{CheckpointStore, WorkflowCheckpoint};
use crate::constants::DEFAULT_MAX_ITERATIONS;
use crate::engine::locks::WorkflowLocks;
use crate::engine::{StartWorkflowRequest, StartWorkflowResponse, WorkflowMetadata};
use crate::errors::WorkflowError;
use crate::event::{EventLog, WorkflowEvent, WorkflowEventKind};
use crate::signal::{SignalMailbox, SignalStore, WorkflowSignal};
use crate::state::{self, WorkflowState, WorkflowStatus};

/// Orquestador del sustrato de ejecución durable.
///
/// Compone el event log, el store de checkpoints y el buzón de señales.
/// No cachea estado mutable entre llamadas: `current_state` re-deriva
/// siempre desde storage, por lo que el engine puede compartirse entre
/// hilos detrás de un `Arc`.
pub struct WorkflowEngine<E, C, S>
    where E: EventLog,
          C: CheckpointStore,
          S: SignalStore
{
    pub event_log: E,
    pub checkpoints: C,
    pub mailbox: SignalMailbox<S>,
    locks: WorkflowLocks,
}

impl<E, C, S> WorkflowEngine<E, C, S>
    where E: EventLog,
          C: CheckpointStore,
          S: SignalStore
{
    /// Crea un engine con los stores proporcionados.
    pub fn new_with_stores(event_log: E, checkpoints: C, signals: S) -> Self {
        Self { event_log,
               checkpoints,
               mailbox: SignalMailbox::new(signals),
               locks: WorkflowLocks::new() }
    }

    /// Arranca un workflow: crea su metadata implícita, emite
    /// `WorkflowStarted` en la secuencia 1 y transiciona PENDING -> RUNNING.
    pub fn start(&self, request: StartWorkflowRequest) -> Result<StartWorkflowResponse, WorkflowError> {
        let workflow_id = Uuid::new_v4();
        let scope = self.locks.scope(workflow_id);
        let _guard = scope.lock().unwrap_or_else(|e| e.into_inner());

        let status = state::transition(WorkflowStatus::Pending, WorkflowStatus::Running)?;
        let max_iterations = if request.max_iterations == 0 {
            DEFAULT_MAX_ITERATIONS
        } else {
            request.max_iterations
        };
        let event = self.event_log.append_kind(workflow_id,
                                               WorkflowEventKind::WorkflowStarted {
                                                   project_id: request.project_id,
                                                   task: request.task,
                                                   owner_id: request.owner_id,
                                                   max_iterations,
                                                   metadata: request.metadata,
                                                   git_url: request.git_url,
                                                   branch: request.branch,
                                                   parent_workflow_id: request.parent_workflow_id,
                                               })?;
        Ok(StartWorkflowResponse { workflow_id,
                                   status,
                                   created_at: event.ts })
    }

    /// Registra un paso del agente (payload opaco). No crea checkpoint: la
    /// política de snapshots es decisión del caller vía `checkpoint_now`.
    pub fn record_step(&self, workflow_id: Uuid, step: Value) -> Result<WorkflowEvent, WorkflowError> {
        self.record_progress(workflow_id, WorkflowEventKind::AgentStepRecorded { step })
    }

    /// Registra una edición de archivo del agente.
    pub fn record_edit(&self, workflow_id: Uuid, edit: Value) -> Result<WorkflowEvent, WorkflowError> {
        self.record_progress(workflow_id, WorkflowEventKind::AgentEditRecorded { edit })
    }

    /// Añade un mensaje a la conversación.
    pub fn record_message(&self, workflow_id: Uuid, message: Value) -> Result<WorkflowEvent, WorkflowError> {
        self.record_progress(workflow_id, WorkflowEventKind::MessageAppended { message })
    }

    /// Actualiza una clave del estado custom del driver.
    pub fn update_custom_state(&self,
                               workflow_id: Uuid,
                               key: &str,
                               value: Value)
                               -> Result<WorkflowEvent, WorkflowError> {
        self.record_progress(workflow_id,
                             WorkflowEventKind::CustomStateUpdated { key: key.to_string(), value })
    }

    /// Avanza el contador de iteraciones. Falla con `IterationLimit` cuando
    /// el presupuesto del workflow ya se consumió.
    pub fn advance_iteration(&self, workflow_id: Uuid) -> Result<u32, WorkflowError> {
        let scope = self.locks.scope(workflow_id);
        let _guard = scope.lock().unwrap_or_else(|e| e.into_inner());

        let state = self.fold_state(workflow_id)?;
        self.require_running(&state)?;
        let next = state.current_iteration + 1;
        if next > state.max_iterations {
            return Err(WorkflowError::IterationLimit { limit: state.max_iterations });
        }
        self.event_log
            .append_kind(workflow_id, WorkflowEventKind::IterationAdvanced { iteration: next })?;
        Ok(next)
    }

    /// Pliega el estado actual y escribe un checkpoint en la última secuencia
    /// conocida. Si el checkpoint vigente ya cubre esa secuencia, lo devuelve
    /// sin escribir (no hay nada nuevo que congelar).
    pub fn checkpoint_now(&self, workflow_id: Uuid) -> Result<WorkflowCheckpoint, WorkflowError> {
        let scope = self.locks.scope(workflow_id);
        let _guard = scope.lock().unwrap_or_else(|e| e.into_inner());

        let state = self.fold_state(workflow_id)?;
        if let Some(latest) = self.checkpoints.latest(workflow_id)? {
            if latest.seq >= state.last_event_sequence {
                return Ok(latest);
            }
        }
        let checkpoint = WorkflowCheckpoint::from_state(&state)?;
        self.checkpoints.save(checkpoint.clone())?;
        Ok(checkpoint)
    }

    /// RUNNING -> PAUSED. El workflow queda a la espera de señales.
    pub fn pause(&self, workflow_id: Uuid, reason: Option<String>) -> Result<WorkflowEvent, WorkflowError> {
        self.apply_transition(workflow_id,
                              WorkflowStatus::Paused,
                              WorkflowEventKind::WorkflowPaused { reason })
    }

    /// PAUSED -> RUNNING.
    pub fn resume(&self, workflow_id: Uuid) -> Result<WorkflowEvent, WorkflowError> {
        self.apply_transition(workflow_id, WorkflowStatus::Running, WorkflowEventKind::WorkflowResumed)
    }

    /// Transición terminal exitosa.
    pub fn complete(&self, workflow_id: Uuid) -> Result<WorkflowEvent, WorkflowError> {
        self.apply_transition(workflow_id, WorkflowStatus::Completed, WorkflowEventKind::WorkflowCompleted)
    }

    /// Transición terminal por error lógico del propio workflow. Los errores
    /// transitorios de storage NO pasan por acá: se devuelven al driver como
    /// reintentables.
    pub fn fail(&self, workflow_id: Uuid, reason: &str) -> Result<WorkflowEvent, WorkflowError> {
        self.apply_transition(workflow_id,
                              WorkflowStatus::Failed,
                              WorkflowEventKind::WorkflowFailed { reason: reason.to_string() })
    }

    /// Transición terminal por cancelación externa.
    pub fn cancel(&self, workflow_id: Uuid) -> Result<WorkflowEvent, WorkflowError> {
        self.apply_transition(workflow_id, WorkflowStatus::Cancelled, WorkflowEventKind::WorkflowCancelled)
    }

    /// Entrega una señal externa. Sólo encola en el buzón: el status del
    /// workflow no cambia (la lógica de reanudación decide qué hacer cuando
    /// observe la señal vía `await_signal`/`poll_signal`).
    pub fn signal(&self, workflow_id: Uuid, name: &str, data: Value) -> Result<WorkflowSignal, WorkflowError> {
        self.fold_state(workflow_id)?; // NotFound si el workflow no existe
        let signal = WorkflowSignal::new(workflow_id, name, data);
        self.mailbox.enqueue(signal.clone())?;
        Ok(signal)
    }

    /// Espera bloqueante de una señal con nombre. No toma el lock mutador del
    /// workflow: la espera no puede retener a los appends concurrentes.
    pub fn await_signal(&self,
                        workflow_id: Uuid,
                        signal_name: &str,
                        timeout_ms: u64)
                        -> Result<WorkflowSignal, WorkflowError> {
        self.mailbox
            .await_signal(workflow_id, signal_name, Duration::from_millis(timeout_ms))
    }

    /// Primera señal sin procesar, sin bloquear.
    pub fn poll_signal(&self, workflow_id: Uuid) -> Result<Option<WorkflowSignal>, WorkflowError> {
        self.mailbox.poll(workflow_id)
    }

    pub fn unprocessed_signals(&self, workflow_id: Uuid) -> Result<Vec<WorkflowSignal>, WorkflowError> {
        self.mailbox.unprocessed(workflow_id)
    }

    /// Idempotente: re-marcar una señal procesada devuelve el registro tal cual.
    pub fn mark_processed(&self, signal_id: Uuid) -> Result<WorkflowSignal, WorkflowError> {
        self.mailbox.mark_processed(signal_id)
    }

    /// Único camino de recuperación tras un reinicio: último checkpoint (o
    /// estado inicial en secuencia 0) + fold de los eventos posteriores, más
    /// las señales pendientes del buzón.
    pub fn current_state(&self, workflow_id: Uuid) -> Result<WorkflowState, WorkflowError> {
        let mut state = self.fold_state(workflow_id)?;
        state.pending_signals = self.mailbox.unprocessed(workflow_id)?;
        Ok(state)
    }

    /// Metadata de ciclo de vida, derivada del replay completo del log.
    pub fn metadata(&self, workflow_id: Uuid) -> Result<WorkflowMetadata, WorkflowError> {
        let events = self.event_log.read_all(workflow_id)?;
        WorkflowMetadata::from_events(workflow_id, &events)
    }

    // ---- internos ----

    /// Fold puro: checkpoint (o inicial) + eventos posteriores. Deja
    /// `pending_signals` vacío para que el resultado dependa sólo del log.
    fn fold_state(&self, workflow_id: Uuid) -> Result<WorkflowState, WorkflowError> {
        let checkpoint = self.checkpoints.latest(workflow_id)?;
        let (base, after_seq) = match &checkpoint {
            Some(cp) => (cp.decode_state()?, cp.seq),
            None => (WorkflowState::initial(workflow_id), 0),
        };
        let events = self.event_log.read_from(workflow_id, after_seq)?;
        if checkpoint.is_none() && events.is_empty() {
            return Err(WorkflowError::NotFound(workflow_id));
        }
        Ok(WorkflowState::fold(base, &events))
    }

    fn record_progress(&self, workflow_id: Uuid, kind: WorkflowEventKind) -> Result<WorkflowEvent, WorkflowError> {
        let scope = self.locks.scope(workflow_id);
        let _guard = scope.lock().unwrap_or_else(|e| e.into_inner());

        let state = self.fold_state(workflow_id)?;
        self.require_running(&state)?;
        self.event_log.append_kind(workflow_id, kind)
    }

    fn apply_transition(&self,
                        workflow_id: Uuid,
                        target: WorkflowStatus,
                        kind: WorkflowEventKind)
                        -> Result<WorkflowEvent, WorkflowError> {
        let event = {
            let scope = self.locks.scope(workflow_id);
            let _guard = scope.lock().unwrap_or_else(|e| e.into_inner());

            let state = self.fold_state(workflow_id)?;
            state::transition(state.status, target)?;
            self.event_log.append_kind(workflow_id, kind)?
        };
        if target.is_terminal() {
            // Desmontaje del estado process-wide del workflow terminado.
            self.locks.release(workflow_id);
            self.mailbox.release(workflow_id);
        }
        Ok(event)
    }

    /// El progreso sólo se acepta con el workflow en RUNNING.
    fn require_running(&self, state: &WorkflowState) -> Result<(), WorkflowError> {
        if state.status == WorkflowStatus::Running {
            Ok(())
        } else {
            Err(WorkflowError::NotRunning { status: state.status })
        }
    }
}

impl WorkflowEngine<crate::event::InMemoryEventLog,
                    crate::checkpoint::InMemoryCheckpointStore,
                    crate::signal::InMemorySignalStore>
{
    /// Crea un nuevo builder con stores en memoria como punto de partida.
    #[inline]
    pub fn builder() -> crate::engine::EngineBuilder<crate::event::InMemoryEventLog,
                                                     crate::checkpoint::InMemoryCheckpointStore,
                                                     crate::signal::InMemorySignalStore> {
        crate::engine::EngineBuilder::new()
    }
}

impl Default
    for WorkflowEngine<crate::event::InMemoryEventLog,
                       crate::checkpoint::InMemoryCheckpointStore,
                       crate::signal::InMemorySignalStore>
{
    fn default() -> Self {
        Self::new_with_stores(crate::event::InMemoryEventLog::new(),
                              crate::checkpoint::InMemoryCheckpointStore::new(),
                              crate::signal::InMemorySignalStore::new())
    }
}
