//! Execution metrics derived from a context's step history.

use std::collections::HashMap;

use conductor_types::state::WorkflowMetrics;
use conductor_types::workflow::WorkflowContext;

/// Compute metrics for `context`.
///
/// - Total duration: last step's `ended_at` minus first step's `started_at`
///   (0 when there are no steps or the last step has not settled).
/// - Retry count: the engine's structured counter, not inferred from messages.
/// - Application switches: adjacent step results with different tags.
/// - Success rate: completed steps over `max(total_steps, 1)`.
pub fn calculate_metrics(context: &WorkflowContext) -> WorkflowMetrics {
    let results = &context.step_results;

    let total_duration_ms = match (results.first(), results.last()) {
        (Some(first), Some(last)) => last
            .ended_at
            .map(|end| (end - first.started_at).num_milliseconds().max(0) as u64)
            .unwrap_or(0),
        _ => 0,
    };

    let step_durations: HashMap<String, u64> = results
        .iter()
        .filter_map(|r| r.duration_ms.map(|d| (r.name.clone(), d)))
        .collect();

    let application_switches = results
        .windows(2)
        .filter(|pair| pair[0].application != pair[1].application)
        .count();

    let completed_steps = context.completed_count();
    let success_rate = completed_steps as f64 / context.total_steps.max(1) as f64;

    WorkflowMetrics {
        total_duration_ms,
        step_durations,
        error_count: context.errors.len(),
        retry_count: context.retry_count,
        application_switches,
        completed_steps,
        failed_steps: context.failed_count(),
        total_steps: context.total_steps,
        success_rate: success_rate.clamp(0.0, 1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use conductor_types::workflow::{StepResult, StepStatus};
    use serde_json::json;

    fn settled(
        base: DateTime<Utc>,
        number: usize,
        name: &str,
        app: &str,
        start_offset_ms: i64,
        len_ms: i64,
        ok: bool,
    ) -> StepResult {
        let mut r = StepResult::running(number, name, app);
        r.started_at = base + Duration::milliseconds(start_offset_ms);
        r.ended_at = Some(r.started_at + Duration::milliseconds(len_ms));
        r.duration_ms = Some(len_ms as u64);
        r.status = if ok { StepStatus::Completed } else { StepStatus::Failed };
        r.data = ok.then(|| json!(null));
        r
    }

    #[test]
    fn empty_context() {
        let ctx = WorkflowContext::new("wf", 0);
        let m = calculate_metrics(&ctx);
        assert_eq!(m.total_duration_ms, 0);
        assert_eq!(m.success_rate, 0.0);
        assert_eq!(m.application_switches, 0);
        assert!(m.step_durations.is_empty());
    }

    #[test]
    fn durations_switches_and_rate() {
        let base = Utc::now();
        let mut ctx = WorkflowContext::new("wf", 4);
        ctx.step_results = vec![
            settled(base, 1, "upload", "portal", 0, 100, true),
            settled(base, 2, "index", "search", 100, 50, true),
            settled(base, 3, "verify", "search", 150, 25, false),
        ];
        ctx.current_step = 3;
        ctx.retry_count = 2;

        let m = calculate_metrics(&ctx);
        assert_eq!(m.total_duration_ms, 175);
        assert_eq!(m.step_durations.get("index"), Some(&50));
        assert_eq!(m.application_switches, 1);
        assert_eq!(m.completed_steps, 2);
        assert_eq!(m.failed_steps, 1);
        assert_eq!(m.retry_count, 2);
        assert!((m.success_rate - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn unsettled_last_step_yields_zero_duration() {
        let base = Utc::now();
        let mut ctx = WorkflowContext::new("wf", 2);
        ctx.step_results = vec![
            settled(base, 1, "a", "x", 0, 10, true),
            StepResult::running(2, "b", "y"),
        ];
        assert_eq!(calculate_metrics(&ctx).total_duration_ms, 0);
    }

    #[test]
    fn success_rate_stays_in_unit_interval() {
        // total_steps understated relative to recorded results
        let base = Utc::now();
        let mut ctx = WorkflowContext::new("wf", 1);
        ctx.step_results = vec![
            settled(base, 1, "a", "x", 0, 10, true),
            settled(base, 2, "b", "x", 10, 10, true),
        ];
        let m = calculate_metrics(&ctx);
        assert!(m.success_rate <= 1.0);
        assert!(m.success_rate >= 0.0);
    }
}
