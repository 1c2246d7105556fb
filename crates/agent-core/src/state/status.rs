use serde::{Deserialize, Serialize};

/// Ciclo de vida de un workflow.
///
/// Las transiciones válidas son:
/// - `Pending` -> `Running`, `Cancelled`
/// - `Running` -> `Paused`, `Completed`, `Failed`, `Cancelled`
/// - `Paused`  -> `Running`, `Cancelled`, `Failed`
///
/// `Completed`, `Failed` y `Cancelled` son terminales: no admiten salida.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStatus {
    /// Creado pero aún sin evento de arranque aplicado.
    Pending,
    /// El driver está avanzando el workflow.
    Running,
    /// A la espera de input externo (señal).
    Paused,
    /// Terminal exitoso.
    Completed,
    /// Terminal por error irrecuperable.
    Failed,
    /// Terminal por cancelación externa.
    Cancelled,
}

impl WorkflowStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self,
                 WorkflowStatus::Completed | WorkflowStatus::Failed | WorkflowStatus::Cancelled)
    }
}
