//! Builder para `WorkflowEngine`.
//!
//! Permite sustituir cada store de forma independiente manteniendo defaults
//! en memoria. Cada setter cambia el parámetro de tipo correspondiente, así
//! que la mezcla de backends queda resuelta en compilación.
//!
//! ```ignore
//! // Construcción típica:
//! // let engine = WorkflowEngine::builder()
//! //     .event_log(PgEventLog::new(provider))
//! //     .build();
//! ```

use crate::checkpoint::{CheckpointStore, InMemoryCheckpointStore};
use crate::engine::WorkflowEngine;
use crate::event::{EventLog, InMemoryEventLog};
use crate::signal::{InMemorySignalStore, SignalStore};

pub struct EngineBuilder<E: EventLog, C: CheckpointStore, S: SignalStore> {
    event_log: E,
    checkpoints: C,
    signals: S,
}

impl EngineBuilder<InMemoryEventLog, InMemoryCheckpointStore, InMemorySignalStore> {
    /// Builder con los tres stores en memoria.
    pub fn new() -> Self {
        Self { event_log: InMemoryEventLog::new(),
               checkpoints: InMemoryCheckpointStore::new(),
               signals: InMemorySignalStore::new() }
    }
}

impl Default for EngineBuilder<InMemoryEventLog, InMemoryCheckpointStore, InMemorySignalStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: EventLog, C: CheckpointStore, S: SignalStore> EngineBuilder<E, C, S> {
    /// Reemplaza el event log.
    pub fn event_log<E2: EventLog>(self, event_log: E2) -> EngineBuilder<E2, C, S> {
        EngineBuilder { event_log,
                        checkpoints: self.checkpoints,
                        signals: self.signals }
    }

    /// Reemplaza el store de checkpoints.
    pub fn checkpoint_store<C2: CheckpointStore>(self, checkpoints: C2) -> EngineBuilder<E, C2, S> {
        EngineBuilder { event_log: self.event_log,
                        checkpoints,
                        signals: self.signals }
    }

    /// Reemplaza el store durable de señales.
    pub fn signal_store<S2: SignalStore>(self, signals: S2) -> EngineBuilder<E, C, S2> {
        EngineBuilder { event_log: self.event_log,
                        checkpoints: self.checkpoints,
                        signals }
    }

    /// Construye el engine final. Consume el builder.
    #[inline]
    pub fn build(self) -> WorkflowEngine<E, C, S> {
        WorkflowEngine::new_with_stores(self.event_log, self.checkpoints, self.signals)
    }
}
