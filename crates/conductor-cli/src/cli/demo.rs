//! Built-in demo workflow.
//!
//! Simulates a document hand-off across three applications (a portal, a
//! search index and a mail service) so the engine, persistence and recovery
//! can be exercised without external systems. `--fail-at N` makes step N fail
//! with a recoverable error; `--resume` continues the saved run from its
//! recovery point.

use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use clap::Args;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;
use serde_json::{json, Value};

use conductor_core::state::recovery;
use conductor_core::workflow::engine::{ExecutionOutcome, WorkflowEngine};
use conductor_core::workflow::retry::RetryPolicy;
use conductor_core::workflow::step::{StepDefinition, StepError};
use conductor_types::workflow::WorkflowContext;

use super::status_cell;
use crate::state::AppState;

/// Simulated latency per step.
const STEP_LATENCY: Duration = Duration::from_millis(40);

#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Make the given 1-based step fail.
    #[arg(long)]
    pub fail_at: Option<usize>,

    /// Keep going after a failed step.
    #[arg(long)]
    pub continue_on_error: bool,

    /// Resume the saved run from its recovery point.
    #[arg(long)]
    pub resume: bool,

    /// Workflow id used for persistence.
    #[arg(long, default_value = "demo")]
    pub id: String,
}

/// A step that sleeps briefly, then returns `output` (or fails when it is the
/// `fail_at` step).
fn simulated_step(
    number: usize,
    name: &str,
    application: &str,
    fail_at: Option<usize>,
    output: Value,
) -> StepDefinition {
    let fail = fail_at == Some(number);
    StepDefinition::new(name, application, move |_ctx: WorkflowContext| {
        let output = output.clone();
        async move {
            tokio::time::sleep(STEP_LATENCY).await;
            if fail {
                Err(StepError::failed(format!("simulated failure at step {number}")))
            } else {
                Ok(output)
            }
        }
    })
    .recoverable(true)
}

/// The demo plan, in execution order.
pub fn demo_steps(fail_at: Option<usize>) -> Vec<StepDefinition> {
    let verify_fails = fail_at == Some(4);

    vec![
        simulated_step(1, "sign in", "portal", fail_at, json!({"session": "demo-session"}))
            .store_as("session"),
        simulated_step(
            2,
            "upload document",
            "portal",
            fail_at,
            json!({"document_id": "DOC-1042", "pages": 3}),
        )
        .store_as("document"),
        simulated_step(3, "wait for indexing", "search", fail_at, json!({"indexed": true}))
            .retry(RetryPolicy::new(3).with_backoff(Duration::from_millis(25))),
        StepDefinition::new("verify search result", "search", move |ctx: WorkflowContext| async move {
            tokio::time::sleep(STEP_LATENCY).await;
            if verify_fails {
                return Err(StepError::failed("simulated failure at step 4"));
            }
            let document_id = ctx
                .get("document")
                .and_then(|d| d.get("document_id"))
                .cloned()
                .ok_or_else(|| StepError::failed("no uploaded document in context"))?;
            Ok::<_, StepError>(json!({"found": document_id}))
        })
        .recoverable(true)
        .store_as("verification"),
        simulated_step(5, "notify reviewer", "mail", fail_at, json!({"sent": true})),
    ]
}

pub async fn handle_demo(state: &AppState, args: DemoArgs, json: bool) -> Result<()> {
    let mut config = state.config.engine.clone();
    if args.continue_on_error {
        config.continue_on_error = true;
    }

    let manager = state.state_manager(&args.id);
    let previous = if args.resume {
        Some(manager.load_state().await.ok_or_else(|| {
            anyhow!("No saved state for workflow '{}' to resume", args.id)
        })?)
    } else {
        None
    };

    let mut engine = WorkflowEngine::with_state_manager(config, manager);
    for step in demo_steps(args.fail_at) {
        engine.add_step(step);
    }

    let validation = engine.validate();
    if !validation.valid {
        bail!("Demo workflow is invalid: {}", validation.errors.join("; "));
    }

    // Ctrl-C stops the run at the next step boundary.
    let token = engine.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    let outcome = match previous {
        Some(snapshot) => {
            let point = recovery::recovery_point(&snapshot.state)
                .ok_or_else(|| anyhow!("Workflow '{}' cannot be recovered", args.id))?;
            engine.resume(snapshot.state, point).await?
        }
        None => engine.run().await,
    };

    print_outcome(&outcome, json)?;

    if !outcome.is_success() {
        bail!("Workflow '{}' finished with status {}", args.id, outcome.status);
    }
    Ok(())
}

fn print_outcome(outcome: &ExecutionOutcome, json: bool) -> Result<()> {
    let ctx = &outcome.context;

    if json {
        let out = json!({
            "status": outcome.status.to_string(),
            "context": ctx,
            "not_attempted": outcome.not_attempted,
            "recovery_point": recovery::recovery_index(ctx),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("#").fg(Color::Cyan),
            Cell::new("Step"),
            Cell::new("App"),
            Cell::new("Status"),
            Cell::new("Duration"),
            Cell::new("Attempts"),
            Cell::new("Error"),
        ]);

    for r in &ctx.step_results {
        let duration = r
            .duration_ms
            .map(|d| format!("{d} ms"))
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            Cell::new(r.step_number),
            Cell::new(&r.name),
            Cell::new(&r.application),
            status_cell(&r.status.to_string()),
            Cell::new(duration),
            Cell::new(r.attempts),
            Cell::new(r.error.as_deref().unwrap_or("")),
        ]);
    }
    for name in &outcome.not_attempted {
        table.add_row(vec![
            Cell::new("-"),
            Cell::new(name),
            Cell::new(""),
            Cell::new("not attempted").fg(Color::Grey),
            Cell::new("-"),
            Cell::new(0),
            Cell::new(""),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!("  {}", conductor_core::state::report::render_summary(ctx));
    if recovery::can_recover(ctx) {
        println!(
            "  Resume with: {}",
            style(format!("conductor demo --id {} --resume", ctx.workflow_id)).dim()
        );
    }
    println!();
    Ok(())
}
