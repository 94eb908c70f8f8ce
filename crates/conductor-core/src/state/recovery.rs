//! Recovery analysis over a workflow context.
//!
//! Pure functions: they never mutate the context and never fail.

use conductor_types::workflow::{StepStatus, WorkflowContext, WorkflowStatus};

/// Whether a partially executed workflow can be resumed.
///
/// - `Completed` and `Cancelled` runs are never recoverable.
/// - A `Running` run (e.g. interrupted by a crash) is always recoverable.
/// - Otherwise the run is recoverable iff at least one recorded error was
///   flagged recoverable by its step.
pub fn can_recover(context: &WorkflowContext) -> bool {
    match context.status {
        WorkflowStatus::Completed | WorkflowStatus::Cancelled => false,
        WorkflowStatus::Running => true,
        WorkflowStatus::Pending | WorkflowStatus::Failed => {
            context.errors.iter().any(|e| e.recoverable)
        }
    }
}

/// 0-based index of the step to (re-)execute when resuming.
///
/// `None` when the context is not recoverable. Otherwise one past the last
/// completed step (scanning backward), or 0 if no step completed.
pub fn recovery_point(context: &WorkflowContext) -> Option<usize> {
    if !can_recover(context) {
        return None;
    }
    let point = context
        .step_results
        .iter()
        .rposition(|r| r.status == StepStatus::Completed)
        .map_or(0, |idx| idx + 1);
    Some(point)
}

/// Signed form of [`recovery_point`]: -1 when not recoverable.
pub fn recovery_index(context: &WorkflowContext) -> i64 {
    recovery_point(context).map_or(-1, |p| p as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use conductor_types::workflow::{StepResult, WorkflowError};
    use serde_json::json;

    fn ctx_with(statuses: &[StepStatus], recoverable_error: bool) -> WorkflowContext {
        let mut ctx = WorkflowContext::new("wf", statuses.len() + 1);
        for (i, status) in statuses.iter().enumerate() {
            let mut result = StepResult::running(i + 1, &format!("s{}", i + 1), "app");
            match status {
                StepStatus::Completed => result.complete(json!(null)),
                StepStatus::Failed => {
                    result.fail("boom");
                    ctx.errors.push(WorkflowError {
                        step_number: i + 1,
                        step_name: result.name.clone(),
                        message: "boom".to_string(),
                        recoverable: recoverable_error,
                        timed_out: false,
                        timestamp: Utc::now(),
                    });
                }
                _ => {}
            }
            ctx.step_results.push(result);
        }
        ctx.current_step = statuses.len();
        ctx
    }

    #[test]
    fn terminal_success_and_cancel_are_not_recoverable() {
        let mut ctx = ctx_with(&[StepStatus::Completed, StepStatus::Failed], true);
        ctx.status = WorkflowStatus::Completed;
        assert!(!can_recover(&ctx));
        assert_eq!(recovery_point(&ctx), None);
        assert_eq!(recovery_index(&ctx), -1);

        ctx.status = WorkflowStatus::Cancelled;
        assert!(!can_recover(&ctx));
    }

    #[test]
    fn running_is_always_recoverable() {
        let mut ctx = ctx_with(&[], false);
        ctx.status = WorkflowStatus::Running;
        assert!(can_recover(&ctx));
        assert_eq!(recovery_point(&ctx), Some(0));
    }

    #[test]
    fn failed_needs_a_recoverable_error() {
        let mut ctx = ctx_with(&[StepStatus::Completed, StepStatus::Failed], false);
        ctx.status = WorkflowStatus::Failed;
        assert!(!can_recover(&ctx));

        let mut ctx = ctx_with(&[StepStatus::Completed, StepStatus::Failed], true);
        ctx.status = WorkflowStatus::Failed;
        assert!(can_recover(&ctx));
        assert_eq!(recovery_point(&ctx), Some(1));
    }

    #[test]
    fn recovery_point_is_after_last_completed() {
        let mut ctx = ctx_with(
            &[StepStatus::Completed, StepStatus::Failed, StepStatus::Completed, StepStatus::Failed],
            true,
        );
        ctx.status = WorkflowStatus::Failed;
        assert_eq!(recovery_point(&ctx), Some(3));
    }

    #[test]
    fn no_completed_steps_resumes_from_start() {
        let mut ctx = ctx_with(&[StepStatus::Failed], true);
        ctx.status = WorkflowStatus::Failed;
        assert_eq!(recovery_point(&ctx), Some(0));
        assert_eq!(recovery_index(&ctx), 0);
    }
}
