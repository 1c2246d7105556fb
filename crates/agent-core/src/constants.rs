//! Constantes del sustrato.

/// Primera secuencia válida de un workflow. El evento `WorkflowStarted`
/// siempre ocupa esta posición; `read_from(_, FIRST_SEQUENCE - 1)` equivale
/// a un replay completo.
pub const FIRST_SEQUENCE: u64 = 1;

/// Presupuesto de iteraciones por defecto cuando el request de inicio no
/// especifica uno (`max_iterations == 0`).
pub const DEFAULT_MAX_ITERATIONS: u32 = 25;
