//! Eventos del workflow y trait EventLog.

mod store;
mod types;

pub use store::{EventLog, InMemoryEventLog};
pub use types::{WorkflowEvent, WorkflowEventKind};
