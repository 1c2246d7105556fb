//! Señales externas: registro durable y buzón con espera bloqueante.

mod mailbox;
mod store;
mod types;

pub use mailbox::SignalMailbox;
pub use store::{InMemorySignalStore, SignalStore};
pub use types::WorkflowSignal;
