//! Registro durable de una señal entregada externamente.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Invariante: `processed` pasa de false a true exactamente una vez;
/// re-marcar una señal ya procesada es un no-op, no un error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowSignal {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub signal_name: String,
    /// Payload opaco del emisor; el sustrato no lo inspecciona.
    pub signal_data: Value,
    pub received_at: DateTime<Utc>,
    pub processed: bool,
    pub processed_at: Option<DateTime<Utc>>,
}

impl WorkflowSignal {
    pub fn new(workflow_id: Uuid, signal_name: &str, signal_data: Value) -> Self {
        Self { id: Uuid::new_v4(),
               workflow_id,
               signal_name: signal_name.to_string(),
               signal_data,
               received_at: Utc::now(),
               processed: false,
               processed_at: None }
    }
}
