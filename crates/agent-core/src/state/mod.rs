//! Estado del workflow: enum de status, máquina de transiciones pura y
//! snapshot plegable (replay).

mod machine;
mod snapshot;
mod status;

pub use machine::{allowed_transitions, transition};
pub use snapshot::WorkflowState;
pub use status::WorkflowStatus;
