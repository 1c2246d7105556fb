//! Engine module for WorkflowEngine implementation
//!
//! Provides the stateless orchestrator, its builder and the driver-facing
//! request/response types.

pub mod builder;
pub mod core;
pub mod locks;
pub mod types;

pub use builder::EngineBuilder;
pub use core::WorkflowEngine;
pub use locks::WorkflowLocks;
pub use types::{StartWorkflowRequest, StartWorkflowResponse, WorkflowMetadata};
