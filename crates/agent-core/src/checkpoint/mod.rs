//! Snapshots de estado y trait CheckpointStore.

mod store;
mod types;

pub use store::{CheckpointStore, InMemoryCheckpointStore};
pub use types::WorkflowCheckpoint;
