//! State-management types: persisted snapshots, transition audit entries and
//! derived execution metrics.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::workflow::WorkflowContext;

/// A timestamped deep copy of a workflow context.
///
/// This is also the on-disk format: one JSON object per workflow id,
/// `{ id, workflow_id, timestamp, state, metadata }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// UUIDv7, unique per save.
    pub id: Uuid,
    pub workflow_id: String,
    pub timestamp: DateTime<Utc>,
    pub state: WorkflowContext,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl StateSnapshot {
    /// Capture `context` as a new snapshot.
    pub fn capture(
        workflow_id: &str,
        context: &WorkflowContext,
        metadata: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            workflow_id: workflow_id.to_string(),
            timestamp: Utc::now(),
            state: context.clone(),
            metadata,
        }
    }
}

/// Audit entry for a state change. Reporting only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Execution metrics derived from a context's step history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowMetrics {
    /// Last step's end minus first step's start.
    pub total_duration_ms: u64,
    /// Duration per step name. Duplicate names keep the later step's value.
    pub step_durations: HashMap<String, u64>,
    pub error_count: usize,
    pub retry_count: u32,
    /// Consecutive step pairs whose application tags differ.
    pub application_switches: usize,
    pub completed_steps: usize,
    pub failed_steps: usize,
    pub total_steps: usize,
    /// `completed_steps / max(total_steps, 1)`.
    pub success_rate: f64,
}
