//! Workflow engine: sequential step execution with per-step deadlines,
//! retries, cooperative cancellation and optional state management.
//!
//! # Execution flow
//!
//! 1. Transition the context `pending -> running`.
//! 2. For each step, in insertion order: check for cancellation, run the
//!    step body as its own task under the step's deadline, retrying per its
//!    `RetryPolicy`, then settle a `StepResult`.
//! 3. On failure, record a `WorkflowError` and either stop (default) or move
//!    on (`continue_on_error`).
//! 4. Transition to the terminal status and, with a state manager attached,
//!    persist a final snapshot.
//!
//! A step that outlives its deadline is detached rather than aborted: its
//! side effects may still complete after the engine has recorded it failed.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use conductor_types::config::EngineConfig;
use conductor_types::workflow::{
    StepResult, StepStatus, WorkflowContext, WorkflowError, WorkflowStatus,
};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::state::manager::StateManager;
use crate::state::store::{InMemorySnapshotStore, SnapshotStore};

use super::retry::RetryHandler;
use super::step::{StepDefinition, StepError};
use super::validation::{Precondition, ValidationReport};

// ---------------------------------------------------------------------------
// FailureHook
// ---------------------------------------------------------------------------

/// Side-effecting hook invoked for each failed step when
/// `capture_screenshots` is enabled (screenshots, page dumps, HAR files).
pub trait FailureHook: Send + Sync {
    fn on_step_failed<'a>(
        &'a self,
        result: &'a StepResult,
        context: &'a WorkflowContext,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

// ---------------------------------------------------------------------------
// ExecutionOutcome
// ---------------------------------------------------------------------------

/// Result of a finished (or cancelled) run.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    /// Terminal status of the run.
    pub status: WorkflowStatus,
    /// Final context (step results, errors, stored data).
    pub context: WorkflowContext,
    /// Names of defined steps that were never attempted.
    pub not_attempted: Vec<String>,
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        self.status == WorkflowStatus::Completed
    }
}

// ---------------------------------------------------------------------------
// EngineError
// ---------------------------------------------------------------------------

/// Errors from engine operations. Step failures are never reported this way,
/// they are recorded in the context.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The requested resume index is beyond what the context or plan allows.
    #[error("cannot resume at step index {requested}: only {available} step(s) available")]
    InvalidResumePoint { requested: usize, available: usize },

    /// The context belongs to a different workflow.
    #[error("context belongs to workflow '{found}', expected '{expected}'")]
    WorkflowMismatch { expected: String, found: String },
}

// ---------------------------------------------------------------------------
// WorkflowEngine
// ---------------------------------------------------------------------------

/// Executes an ordered list of steps against a fresh or restored context.
///
/// Generic over the snapshot store of an optional attached `StateManager`.
pub struct WorkflowEngine<S: SnapshotStore = InMemorySnapshotStore> {
    workflow_id: String,
    config: EngineConfig,
    steps: Vec<StepDefinition>,
    preconditions: Vec<Box<dyn Precondition>>,
    failure_hook: Option<Arc<dyn FailureHook>>,
    state: Option<StateManager<S>>,
    cancel_token: CancellationToken,
}

impl WorkflowEngine<InMemorySnapshotStore> {
    /// Create an engine without state management.
    pub fn new(workflow_id: impl Into<String>, config: EngineConfig) -> Self {
        Self::build(workflow_id.into(), config, None)
    }
}

impl<S: SnapshotStore> WorkflowEngine<S> {
    /// Create an engine that records transitions and snapshots through
    /// `state`. The workflow id is taken from the manager.
    pub fn with_state_manager(config: EngineConfig, state: StateManager<S>) -> Self {
        let workflow_id = state.workflow_id().to_string();
        Self::build(workflow_id, config, Some(state))
    }

    fn build(workflow_id: String, config: EngineConfig, state: Option<StateManager<S>>) -> Self {
        Self {
            workflow_id,
            config,
            steps: Vec::new(),
            preconditions: Vec::new(),
            failure_hook: None,
            state,
            cancel_token: CancellationToken::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Definition
    // -----------------------------------------------------------------------

    /// Append a step to the plan. Names are not checked for uniqueness.
    pub fn add_step(&mut self, step: StepDefinition) -> &mut Self {
        self.steps.push(step);
        self
    }

    /// Register a pre-flight check consulted by [`validate`](Self::validate).
    pub fn add_precondition(&mut self, precondition: impl Precondition + 'static) -> &mut Self {
        self.preconditions.push(Box::new(precondition));
        self
    }

    /// Register the hook used when `capture_screenshots` is enabled.
    pub fn set_failure_hook(&mut self, hook: Arc<dyn FailureHook>) -> &mut Self {
        self.failure_hook = Some(hook);
        self
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    pub fn state_manager(&self) -> Option<&StateManager<S>> {
        self.state.as_ref()
    }

    pub fn state_manager_mut(&mut self) -> Option<&mut StateManager<S>> {
        self.state.as_mut()
    }

    /// Run every registered precondition and collect the failures.
    ///
    /// With no preconditions the workflow is always valid.
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::ok();
        for precondition in &self.preconditions {
            if let Err(message) = precondition.check() {
                report.push(message);
            }
        }
        if !report.valid {
            tracing::warn!(
                workflow = self.workflow_id.as_str(),
                errors = report.errors.len(),
                "workflow validation failed"
            );
        }
        report
    }

    // -----------------------------------------------------------------------
    // Cancellation
    // -----------------------------------------------------------------------

    /// Request cancellation. Honoured before the next step starts; a step
    /// already executing runs to completion (or its deadline).
    pub fn cancel(&self) {
        tracing::info!(workflow = self.workflow_id.as_str(), "workflow cancellation requested");
        self.cancel_token.cancel();
    }

    /// Token step bodies may capture to poll for cancellation themselves.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    // -----------------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------------

    /// Execute all steps against a fresh context.
    ///
    /// Never fails: step failures are recorded in the returned context.
    pub async fn run(&mut self) -> ExecutionOutcome {
        let context = WorkflowContext::new(self.workflow_id.clone(), self.steps.len());
        self.execute_from(context, 0, 0, "run started".to_string()).await
    }

    /// Continue a previous run from the 0-based step index `from_step`,
    /// usually the state manager's recovery point.
    ///
    /// Step results before `from_step` are kept; later ones are discarded and
    /// their steps re-attempted, each counted as a retry. Recorded errors are
    /// kept as history. The resumed run gets a new `run_id`.
    pub async fn resume(
        &mut self,
        mut context: WorkflowContext,
        from_step: usize,
    ) -> Result<ExecutionOutcome, EngineError> {
        if context.workflow_id != self.workflow_id {
            return Err(EngineError::WorkflowMismatch {
                expected: self.workflow_id.clone(),
                found: context.workflow_id,
            });
        }
        let available = context.step_results.len().min(self.steps.len());
        if from_step > available {
            return Err(EngineError::InvalidResumePoint {
                requested: from_step,
                available,
            });
        }

        let previously_attempted = context.step_results.len();
        context.run_id = Uuid::now_v7();
        context.step_results.truncate(from_step);
        context.current_step = from_step;
        context.total_steps = self.steps.len();

        tracing::info!(
            workflow = self.workflow_id.as_str(),
            run_id = %context.run_id,
            from_step,
            "resuming workflow"
        );

        let reason = format!("resumed at step {}", from_step + 1);
        Ok(self
            .execute_from(context, from_step, previously_attempted, reason)
            .await)
    }

    /// Step loop shared by `run` and `resume`.
    ///
    /// Steps below `reattempt_until` had already been attempted by an earlier
    /// run, so executing them again counts as a retry.
    async fn execute_from(
        &mut self,
        mut ctx: WorkflowContext,
        start: usize,
        reattempt_until: usize,
        reason: String,
    ) -> ExecutionOutcome {
        self.transition(&mut ctx, WorkflowStatus::Running, Some(reason));

        tracing::info!(
            workflow = self.workflow_id.as_str(),
            run_id = %ctx.run_id,
            steps = self.steps.len(),
            start,
            "starting workflow execution"
        );

        let mut any_failed = false;
        let mut cancelled = false;

        for index in start..self.steps.len() {
            if self.cancel_token.is_cancelled() {
                cancelled = true;
                break;
            }

            let step = self.steps[index].clone();
            if index < reattempt_until {
                ctx.retry_count += 1;
            }

            let result = self.execute_step(&step, index + 1, &mut ctx).await;
            let failed = result.status == StepStatus::Failed;

            if failed && self.config.capture_screenshots {
                if let Some(hook) = &self.failure_hook {
                    hook.on_step_failed(&result, &ctx).await;
                }
            }

            ctx.step_results.push(result);
            ctx.current_step += 1;

            if self.config.snapshot_each_step {
                if let Some(state) = self.state.as_mut() {
                    let mut metadata = HashMap::new();
                    metadata.insert("step".to_string(), json!(index + 1));
                    metadata.insert("step_name".to_string(), json!(step.name()));
                    state.save_state(&ctx, metadata).await;
                }
            }

            if failed {
                any_failed = true;
                if !self.config.continue_on_error {
                    tracing::warn!(
                        workflow = self.workflow_id.as_str(),
                        step = step.name(),
                        "step failed, aborting workflow"
                    );
                    break;
                }
            }
        }

        // Failures kept from an earlier run still count.
        let any_failed = any_failed
            || ctx
                .step_results
                .iter()
                .any(|r| r.status == StepStatus::Failed);

        let (status, reason) = if cancelled {
            // Later runs on this engine start with a fresh token.
            self.cancel_token = CancellationToken::new();
            (WorkflowStatus::Cancelled, "cancelled at step boundary")
        } else if any_failed {
            (WorkflowStatus::Failed, "one or more steps failed")
        } else {
            (WorkflowStatus::Completed, "all steps completed")
        };
        self.transition(&mut ctx, status, Some(reason.to_string()));

        if let Some(state) = self.state.as_mut() {
            let mut metadata = HashMap::new();
            metadata.insert("final".to_string(), json!(true));
            metadata.insert("transitions".to_string(), json!(state.transitions()));
            state.save_state(&ctx, metadata).await;
        }

        tracing::info!(
            workflow = self.workflow_id.as_str(),
            run_id = %ctx.run_id,
            status = %status,
            completed = ctx.completed_count(),
            errors = ctx.errors.len(),
            "workflow finished"
        );

        let not_attempted = self
            .steps
            .iter()
            .skip(ctx.step_results.len())
            .map(|s| s.name().to_string())
            .collect();

        ExecutionOutcome {
            status,
            context: ctx,
            not_attempted,
        }
    }

    /// Execute one step, including retries, and settle its result.
    ///
    /// On success the value is stored under the step's `store_as` key. On
    /// final failure a `WorkflowError` is appended to the context.
    async fn execute_step(
        &self,
        step: &StepDefinition,
        step_number: usize,
        ctx: &mut WorkflowContext,
    ) -> StepResult {
        let mut result = StepResult::running(step_number, step.name(), step.application());
        let deadline = step
            .step_timeout()
            .unwrap_or_else(|| Duration::from_millis(self.config.step_timeout_ms));

        tracing::debug!(
            step = step.name(),
            application = step.application(),
            step_number,
            timeout_ms = deadline.as_millis() as u64,
            "step started"
        );

        loop {
            match Self::attempt(step, deadline, ctx.clone()).await {
                Ok(value) => {
                    if let Some(key) = step.store_key() {
                        ctx.data.insert(key.to_string(), value.clone());
                    }
                    result.complete(value);
                    tracing::debug!(
                        step = step.name(),
                        duration_ms = result.duration_ms.unwrap_or(0),
                        attempts = result.attempts,
                        "step completed"
                    );
                    return result;
                }
                Err(err) => {
                    let timed_out = err.is_timeout();
                    if RetryHandler::should_retry(step.retry_policy(), result.attempts, timed_out) {
                        tracing::warn!(
                            step = step.name(),
                            attempt = result.attempts,
                            error = %err,
                            "step failed, retrying"
                        );
                        result.attempts += 1;
                        ctx.retry_count += 1;
                        if let Some(policy) = step.retry_policy() {
                            if policy.backoff_ms > 0 {
                                tokio::time::sleep(policy.backoff()).await;
                            }
                        }
                        continue;
                    }

                    let message = err.to_string();
                    tracing::warn!(
                        step = step.name(),
                        step_number,
                        recoverable = step.is_recoverable(),
                        timed_out,
                        error = message.as_str(),
                        "step failed"
                    );
                    result.fail(message.clone());
                    ctx.errors.push(WorkflowError {
                        step_number,
                        step_name: step.name().to_string(),
                        message,
                        recoverable: step.is_recoverable(),
                        timed_out,
                        timestamp: Utc::now(),
                    });
                    return result;
                }
            }
        }
    }

    /// One attempt: run the body as a task and race it against the deadline.
    ///
    /// On timeout the task handle is dropped, which detaches the task.
    async fn attempt(
        step: &StepDefinition,
        deadline: Duration,
        ctx: WorkflowContext,
    ) -> Result<Value, StepError> {
        let handle = tokio::spawn(step.action.execute(ctx));

        match tokio::time::timeout(deadline, handle).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(join_err)) => Err(StepError::Panicked(join_err.to_string())),
            Err(_elapsed) => Err(StepError::Timeout {
                step: step.name().to_string(),
                timeout_ms: deadline.as_millis() as u64,
            }),
        }
    }

    /// Move the context to `to`, mirroring the change into the state
    /// manager's transition log when one is attached.
    fn transition(&mut self, ctx: &mut WorkflowContext, to: WorkflowStatus, reason: Option<String>) {
        let from = ctx.status;
        ctx.status = to;
        if let Some(state) = self.state.as_mut() {
            state.record_transition(from.to_string(), to.to_string(), reason);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
