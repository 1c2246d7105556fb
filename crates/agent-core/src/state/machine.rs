//! Máquina de estados pura: tabla de transiciones sin efectos ni storage.
//! El engine la consulta antes de mutar cualquier status.

use super::WorkflowStatus;
use crate::errors::WorkflowError;

/// Sucesores legales de un status.
pub fn allowed_transitions(from: WorkflowStatus) -> &'static [WorkflowStatus] {
    match from {
        WorkflowStatus::Pending => &[WorkflowStatus::Running, WorkflowStatus::Cancelled],
        WorkflowStatus::Running => &[WorkflowStatus::Paused,
                                     WorkflowStatus::Completed,
                                     WorkflowStatus::Failed,
                                     WorkflowStatus::Cancelled],
        WorkflowStatus::Paused => &[WorkflowStatus::Running,
                                    WorkflowStatus::Cancelled,
                                    WorkflowStatus::Failed],
        WorkflowStatus::Completed | WorkflowStatus::Failed | WorkflowStatus::Cancelled => &[],
    }
}

/// Valida `from -> to` contra la tabla. Devuelve el status destino para que
/// el caller pueda encadenarlo.
pub fn transition(from: WorkflowStatus, to: WorkflowStatus) -> Result<WorkflowStatus, WorkflowError> {
    if allowed_transitions(from).contains(&to) {
        Ok(to)
    } else {
        Err(WorkflowError::InvalidTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses_have_no_successors() {
        for status in [WorkflowStatus::Completed, WorkflowStatus::Failed, WorkflowStatus::Cancelled] {
            assert!(allowed_transitions(status).is_empty());
            assert!(status.is_terminal());
        }
    }

    #[test]
    fn pause_requires_running() {
        assert!(transition(WorkflowStatus::Running, WorkflowStatus::Paused).is_ok());
        assert_eq!(transition(WorkflowStatus::Pending, WorkflowStatus::Paused),
                   Err(WorkflowError::InvalidTransition { from: WorkflowStatus::Pending,
                                                          to: WorkflowStatus::Paused }));
    }
}
