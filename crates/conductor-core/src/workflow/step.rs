//! Step definitions and the step-execution contract.
//!
//! A step is a named, application-tagged unit of work. Its body is any
//! `Fn(WorkflowContext) -> Future<Output = Result<Value, StepError>>`; the
//! engine hands each invocation an owned deep copy of the running context, so
//! step bodies can never observe or corrupt the live state directly.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use conductor_types::workflow::WorkflowContext;
use futures_util::future::BoxFuture;
use serde_json::Value;

use super::retry::RetryPolicy;

// ---------------------------------------------------------------------------
// StepError
// ---------------------------------------------------------------------------

/// Errors a step attempt can settle with.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StepError {
    /// The step body returned an error.
    #[error("step execution failed: {0}")]
    Failed(String),

    /// The step exceeded its deadline.
    #[error("step '{step}' timed out after {timeout_ms}ms")]
    Timeout { step: String, timeout_ms: u64 },

    /// The task running the step body panicked or was aborted.
    #[error("step task panicked: {0}")]
    Panicked(String),
}

impl StepError {
    /// Shorthand for `StepError::Failed`.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Whether this failure was a deadline expiry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

// ---------------------------------------------------------------------------
// StepAction
// ---------------------------------------------------------------------------

/// Boxed future returned by a step body.
pub type StepFuture = BoxFuture<'static, Result<Value, StepError>>;

/// The step-execution contract.
///
/// Implemented for every `Fn(WorkflowContext) -> impl Future` closure, so most
/// callers never name this trait.
pub trait StepAction: Send + Sync {
    fn execute(&self, context: WorkflowContext) -> StepFuture;
}

impl<F, Fut> StepAction for F
where
    F: Fn(WorkflowContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, StepError>> + Send + 'static,
{
    fn execute(&self, context: WorkflowContext) -> StepFuture {
        Box::pin(self(context))
    }
}

// ---------------------------------------------------------------------------
// StepDefinition
// ---------------------------------------------------------------------------

/// A single step in a workflow plan. Immutable once added to an engine.
#[derive(Clone)]
pub struct StepDefinition {
    pub(crate) name: String,
    pub(crate) application: String,
    pub(crate) action: Arc<dyn StepAction>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) recoverable: bool,
    pub(crate) store_as: Option<String>,
    pub(crate) retry: Option<RetryPolicy>,
}

impl StepDefinition {
    /// Define a step named `name` targeting the logical `application`.
    pub fn new(
        name: impl Into<String>,
        application: impl Into<String>,
        action: impl StepAction + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            application: application.into(),
            action: Arc::new(action),
            timeout: None,
            recoverable: false,
            store_as: None,
            retry: None,
        }
    }

    /// Override the workflow-wide deadline for this step.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Mark failures of this step as recoverable.
    pub fn recoverable(mut self, recoverable: bool) -> Self {
        self.recoverable = recoverable;
        self
    }

    /// Store the step's result in the context under `key`.
    pub fn store_as(mut self, key: impl Into<String>) -> Self {
        self.store_as = Some(key.into());
        self
    }

    /// Re-attempt the step on failure according to `policy`.
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn application(&self) -> &str {
        &self.application
    }

    pub fn is_recoverable(&self) -> bool {
        self.recoverable
    }

    pub fn store_key(&self) -> Option<&str> {
        self.store_as.as_deref()
    }

    pub fn step_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn retry_policy(&self) -> Option<&RetryPolicy> {
        self.retry.as_ref()
    }
}

impl fmt::Debug for StepDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDefinition")
            .field("name", &self.name)
            .field("application", &self.application)
            .field("timeout", &self.timeout)
            .field("recoverable", &self.recoverable)
            .field("store_as", &self.store_as)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
