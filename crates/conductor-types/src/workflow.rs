//! Workflow execution types for Conductor.
//!
//! `WorkflowContext` is the state threaded through a run and captured in
//! snapshots and checkpoints. `StepResult` and `WorkflowError` are the
//! append-only history entries the engine writes as steps settle.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Status enums
// ---------------------------------------------------------------------------

/// Overall status of a workflow run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl WorkflowStatus {
    /// Whether the run has reached a final state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Status of an individual step execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// StepResult
// ---------------------------------------------------------------------------

/// Outcome record for one attempted step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    /// 1-based position in the workflow.
    pub step_number: usize,
    pub name: String,
    /// Logical application tag the step targeted.
    pub application: String,
    pub status: StepStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// Derived from `ended_at - started_at` once the step settles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Value produced by the step, if it completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Total attempts made (1 unless the step was retried).
    #[serde(default = "default_attempts")]
    pub attempts: u32,
}

fn default_attempts() -> u32 {
    1
}

impl StepResult {
    /// Create a result in the `Running` state, stamped with the current time.
    pub fn running(step_number: usize, name: &str, application: &str) -> Self {
        Self {
            step_number,
            name: name.to_string(),
            application: application.to_string(),
            status: StepStatus::Running,
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: None,
            error: None,
            data: None,
            attempts: 1,
        }
    }

    /// Settle as completed with the produced value.
    ///
    /// No-op unless the result is still `Running`.
    pub fn complete(&mut self, data: serde_json::Value) {
        if self.status != StepStatus::Running {
            return;
        }
        self.status = StepStatus::Completed;
        self.data = Some(data);
        self.settle();
    }

    /// Settle as failed with the given message.
    ///
    /// No-op unless the result is still `Running`.
    pub fn fail(&mut self, error: impl Into<String>) {
        if self.status != StepStatus::Running {
            return;
        }
        self.status = StepStatus::Failed;
        self.error = Some(error.into());
        self.settle();
    }

    /// Number of re-attempts beyond the first.
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }

    fn settle(&mut self) {
        let ended = Utc::now();
        let millis = (ended - self.started_at).num_milliseconds().max(0) as u64;
        self.ended_at = Some(ended);
        self.duration_ms = Some(millis);
    }
}

// ---------------------------------------------------------------------------
// WorkflowError
// ---------------------------------------------------------------------------

/// A step failure recorded in the context's error list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowError {
    /// 1-based number of the failing step.
    pub step_number: usize,
    pub step_name: String,
    pub message: String,
    /// Copied from the step definition's `recoverable` flag.
    pub recoverable: bool,
    /// True if the failure was a deadline expiry rather than a thrown error.
    #[serde(default)]
    pub timed_out: bool,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// WorkflowContext
// ---------------------------------------------------------------------------

/// Mutable execution state owned by a single engine run.
///
/// Cloning produces a structural deep copy, which is what snapshots and
/// checkpoints store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowContext {
    pub workflow_id: String,
    pub run_id: Uuid,
    pub status: WorkflowStatus,
    /// Step outputs keyed by each step's `store_as` key. Last writer wins.
    #[serde(default)]
    pub data: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub step_results: Vec<StepResult>,
    #[serde(default)]
    pub errors: Vec<WorkflowError>,
    pub current_step: usize,
    pub total_steps: usize,
    pub started_at: DateTime<Utc>,
    /// Re-attempts made by the engine across the whole run.
    #[serde(default)]
    pub retry_count: u32,
}

impl WorkflowContext {
    /// Create an empty `Pending` context for a workflow.
    pub fn new(workflow_id: impl Into<String>, total_steps: usize) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            run_id: Uuid::now_v7(),
            status: WorkflowStatus::Pending,
            data: HashMap::new(),
            step_results: Vec::new(),
            errors: Vec::new(),
            current_step: 0,
            total_steps,
            started_at: Utc::now(),
            retry_count: 0,
        }
    }

    /// Look up a stored step output.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Number of step results with `Completed` status.
    pub fn completed_count(&self) -> usize {
        self.step_results
            .iter()
            .filter(|r| r.status == StepStatus::Completed)
            .count()
    }

    /// Number of step results with `Failed` status.
    pub fn failed_count(&self) -> usize {
        self.step_results
            .iter()
            .filter(|r| r.status == StepStatus::Failed)
            .count()
    }

    /// The most recently recorded error, if any.
    pub fn last_error(&self) -> Option<&WorkflowError> {
        self.errors.last()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
