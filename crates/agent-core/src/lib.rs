//! agent-core: sustrato de ejecución durable para workflows de agentes
//!
//! Provee las cuatro piezas que permiten que una tarea de agente de larga
//! duración sobreviva reinicios de proceso y se recupere de forma
//! determinista:
//! - `event`: log append-only por workflow con secuencias monotónicas.
//! - `checkpoint`: snapshots del estado plegado, etiquetados por secuencia.
//! - `signal`: buzón de señales externas con espera bloqueante y timeout.
//! - `state`: máquina de estados pura y replay (fold) de eventos.
//! - `engine`: orquestador sin estado que compone las piezas anteriores.
pub mod constants;
pub mod engine;
pub mod errors;
pub mod event;
pub mod checkpoint;
pub mod signal;
pub mod state;

pub use engine::{EngineBuilder, StartWorkflowRequest, StartWorkflowResponse, WorkflowEngine, WorkflowMetadata};
pub use errors::{classify_error, ErrorClass, WorkflowError};
pub use event::{EventLog, InMemoryEventLog, WorkflowEvent, WorkflowEventKind};
pub use checkpoint::{CheckpointStore, InMemoryCheckpointStore, WorkflowCheckpoint};
pub use signal::{InMemorySignalStore, SignalMailbox, SignalStore, WorkflowSignal};
pub use state::{transition, WorkflowState, WorkflowStatus};
