//! Human-readable reports over a workflow context.
//!
//! Output is plain text for humans and CI logs; nothing parses it.

use std::fmt::Write as _;

use conductor_types::state::{StateTransition, WorkflowMetrics};
use conductor_types::workflow::{StepStatus, WorkflowContext, WorkflowStatus};

use super::metrics::calculate_metrics;
use super::recovery::{can_recover, recovery_index};

/// Full report: metrics block, per-step detail, errors, transitions and
/// recovery analysis.
pub fn render_report(context: &WorkflowContext, transitions: &[StateTransition]) -> String {
    let metrics = calculate_metrics(context);
    let mut out = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(out, "Workflow Report: {}", context.workflow_id);
    let _ = writeln!(out, "Run:      {}", context.run_id);
    let _ = writeln!(out, "Status:   {}", context.status);
    let _ = writeln!(out, "Started:  {}", context.started_at.to_rfc3339());
    let _ = writeln!(out);

    render_metrics(&mut out, &metrics);

    let _ = writeln!(out, "Steps");
    for result in &context.step_results {
        let duration = result
            .duration_ms
            .map_or_else(|| "-".to_string(), |d| format!("{d} ms"));
        let _ = write!(
            out,
            "  [{}] {} ({}) {} {}",
            result.step_number, result.name, result.application, result.status, duration
        );
        if result.attempts > 1 {
            let _ = write!(out, " (attempts: {})", result.attempts);
        }
        let _ = writeln!(out);
        if let Some(error) = &result.error {
            let _ = writeln!(out, "      error: {error}");
        }
    }
    let unattempted = context.total_steps.saturating_sub(context.step_results.len());
    if unattempted > 0 {
        let _ = writeln!(out, "  ({unattempted} step(s) not attempted)");
    }
    let _ = writeln!(out);

    if !context.errors.is_empty() {
        let _ = writeln!(out, "Errors");
        for error in &context.errors {
            let tag = if error.recoverable { "recoverable" } else { "fatal" };
            let kind = if error.timed_out { ", timeout" } else { "" };
            let _ = writeln!(
                out,
                "  step {} {} [{tag}{kind}]: {}",
                error.step_number, error.step_name, error.message
            );
        }
        let _ = writeln!(out);
    }

    if !transitions.is_empty() {
        let _ = writeln!(out, "Transitions");
        for t in transitions {
            let _ = write!(out, "  {} {} -> {}", t.timestamp.to_rfc3339(), t.from, t.to);
            if let Some(reason) = &t.reason {
                let _ = write!(out, " ({reason})");
            }
            let _ = writeln!(out);
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "Recovery");
    let recoverable = can_recover(context);
    let _ = writeln!(out, "  Recoverable:    {}", if recoverable { "yes" } else { "no" });
    let _ = writeln!(out, "  Recovery point: {}", recovery_index(context));

    out
}

fn render_metrics(out: &mut String, metrics: &WorkflowMetrics) {
    let _ = writeln!(out, "Metrics");
    let _ = writeln!(out, "  Total duration:       {} ms", metrics.total_duration_ms);
    let _ = writeln!(
        out,
        "  Steps completed:      {} / {}",
        metrics.completed_steps, metrics.total_steps
    );
    let _ = writeln!(out, "  Steps failed:         {}", metrics.failed_steps);
    let _ = writeln!(out, "  Success rate:         {:.1}%", metrics.success_rate * 100.0);
    let _ = writeln!(out, "  Errors:               {}", metrics.error_count);
    let _ = writeln!(out, "  Retries:              {}", metrics.retry_count);
    let _ = writeln!(out, "  Application switches: {}", metrics.application_switches);
    let _ = writeln!(out);
}

/// Short summary: status, progress, current step and last error.
pub fn render_summary(context: &WorkflowContext) -> String {
    let metrics = calculate_metrics(context);
    let mut out = format!(
        "{} [{}]: {}/{} steps completed ({:.1}%), {} error(s), {} retr{}, {} ms",
        context.workflow_id,
        context.status,
        metrics.completed_steps,
        metrics.total_steps,
        metrics.success_rate * 100.0,
        metrics.error_count,
        metrics.retry_count,
        if metrics.retry_count == 1 { "y" } else { "ies" },
        metrics.total_duration_ms,
    );

    if let Some(current) = context.step_results.last() {
        let _ = write!(out, "; last step: {} ({})", current.name, current.status);
    }
    if let Some(error) = context.last_error() {
        let _ = write!(out, "; last error: {}", error.message);
    }
    if context.status != WorkflowStatus::Completed
        && context.step_results.iter().any(|r| r.status == StepStatus::Failed)
    {
        let _ = write!(out, "; recovery point: {}", recovery_index(context));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use conductor_types::workflow::{StepResult, WorkflowError};
    use serde_json::json;

    fn failed_context() -> WorkflowContext {
        let mut ctx = WorkflowContext::new("doc-pipeline", 3);
        let mut a = StepResult::running(1, "upload", "portal");
        a.complete(json!({"id": 1}));
        let mut b = StepResult::running(2, "verify", "search");
        b.attempts = 2;
        b.fail("index not ready");
        ctx.step_results = vec![a, b];
        ctx.errors.push(WorkflowError {
            step_number: 2,
            step_name: "verify".to_string(),
            message: "index not ready".to_string(),
            recoverable: true,
            timed_out: false,
            timestamp: Utc::now(),
        });
        ctx.current_step = 2;
        ctx.retry_count = 1;
        ctx.status = WorkflowStatus::Failed;
        ctx
    }

    #[test]
    fn report_reflects_metrics() {
        let ctx = failed_context();
        let transitions = vec![StateTransition {
            from: "pending".to_string(),
            to: "running".to_string(),
            reason: Some("run started".to_string()),
            timestamp: Utc::now(),
        }];
        let report = render_report(&ctx, &transitions);

        assert!(report.contains("Workflow Report: doc-pipeline"));
        assert!(report.contains("Status:   failed"));
        assert!(report.contains("Steps completed:      1 / 3"));
        assert!(report.contains("Success rate:         33.3%"));
        assert!(report.contains("Retries:              1"));
        assert!(report.contains("Application switches: 1"));
        assert!(report.contains("[2] verify (search) failed"));
        assert!(report.contains("(attempts: 2)"));
        assert!(report.contains("(1 step(s) not attempted)"));
        assert!(report.contains("[recoverable]: index not ready"));
        assert!(report.contains("pending -> running (run started)"));
        assert!(report.contains("Recovery point: 1"));
    }

    #[test]
    fn summary_is_single_line() {
        let ctx = failed_context();
        let summary = render_summary(&ctx);
        assert!(!summary.contains('\n'));
        assert!(summary.starts_with("doc-pipeline [failed]: 1/3 steps completed"));
        assert!(summary.contains("1 retry"));
        assert!(summary.contains("last error: index not ready"));
        assert!(summary.contains("recovery point: 1"));
    }
}
