//! Errores del sustrato y su clasificación de propagación.

use thiserror::Error;
use uuid::Uuid;

use crate::state::WorkflowStatus;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum WorkflowError {
    #[error("workflow not found: {0}")]
    NotFound(Uuid),
    #[error("signal not found: {0}")]
    SignalNotFound(Uuid),
    #[error("invalid transition {from:?} -> {to:?}")]
    InvalidTransition { from: WorkflowStatus, to: WorkflowStatus },
    #[error("progress rejected: workflow is {status:?}, not RUNNING")]
    NotRunning { status: WorkflowStatus },
    #[error("concurrent append conflict on workflow {workflow_id} at seq {sequence}")]
    ConcurrencyConflict { workflow_id: Uuid, sequence: u64 },
    #[error("checkpoint seq {proposed} must exceed latest {latest}")]
    InvalidCheckpoint { proposed: u64, latest: u64 },
    #[error("timed out after {waited_ms}ms waiting for signal '{signal_name}'")]
    Timeout { signal_name: String, waited_ms: u64 },
    #[error("iteration limit {limit} reached")]
    IterationLimit { limit: u32 },
    #[error("serialization: {0}")]
    Serialization(String),
    #[error("storage: {0}")]
    Storage(String),
}

impl From<serde_json::Error> for WorkflowError {
    fn from(err: serde_json::Error) -> Self {
        WorkflowError::Serialization(err.to_string())
    }
}

/// Clase de propagación de un error (ver política en la capa de persistencia:
/// sólo los transitorios se reintentan; los lógicos vuelven al caller tal
/// cual; los recuperables los decide el driver).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Error lógico del dominio. Nunca se reintenta.
    Logical,
    /// Fallo transitorio de la capa de almacenamiento. Reintentable con
    /// backoff acotado.
    Transient,
    /// Condición esperada que el caller puede decidir reintentar (timeout de
    /// espera de señal, presupuesto de iteraciones agotado).
    Recoverable,
}

pub fn classify_error(error: &WorkflowError) -> ErrorClass {
    match error {
        WorkflowError::NotFound(_)
        | WorkflowError::SignalNotFound(_)
        | WorkflowError::InvalidTransition { .. }
        | WorkflowError::NotRunning { .. }
        | WorkflowError::InvalidCheckpoint { .. }
        | WorkflowError::Serialization(_) => ErrorClass::Logical,
        WorkflowError::ConcurrencyConflict { .. } | WorkflowError::Storage(_) => ErrorClass::Transient,
        WorkflowError::Timeout { .. } | WorkflowError::IterationLimit { .. } => ErrorClass::Recoverable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn logical_errors_are_never_retryable() {
        let errors = [WorkflowError::NotFound(Uuid::new_v4()),
                      WorkflowError::SignalNotFound(Uuid::new_v4()),
                      WorkflowError::InvalidTransition { from: WorkflowStatus::Completed,
                                                         to: WorkflowStatus::Running },
                      WorkflowError::NotRunning { status: WorkflowStatus::Paused },
                      WorkflowError::InvalidCheckpoint { proposed: 2, latest: 3 },
                      WorkflowError::Serialization("bad payload".into())];
        for err in errors {
            assert_eq!(classify_error(&err), ErrorClass::Logical, "{err}");
        }
    }

    #[test]
    fn storage_races_are_transient() {
        assert_eq!(classify_error(&WorkflowError::ConcurrencyConflict { workflow_id: Uuid::new_v4(),
                                                                        sequence: 7 }),
                   ErrorClass::Transient);
        assert_eq!(classify_error(&WorkflowError::Storage("connection reset".into())),
                   ErrorClass::Transient);
    }

    #[test]
    fn expected_waits_and_budgets_are_recoverable() {
        assert_eq!(classify_error(&WorkflowError::Timeout { signal_name: "approval".into(),
                                                            waited_ms: 50 }),
                   ErrorClass::Recoverable);
        assert_eq!(classify_error(&WorkflowError::IterationLimit { limit: 5 }),
                   ErrorClass::Recoverable);
    }
}
