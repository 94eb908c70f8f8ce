//! State inspection subcommands: list, report, summary, recover, clean.

use anyhow::{anyhow, Context, Result};
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;

use conductor_core::state::manager::retention_cutoff;
use conductor_core::state::recovery::recovery_index;
use conductor_core::state::report::render_report;
use conductor_core::state::store::SnapshotStore;
use conductor_types::state::{StateSnapshot, StateTransition};

use super::status_cell;
use crate::state::{AppState, ConcreteStateManager};

/// Load the persisted snapshot for `workflow_id` or fail with a hint.
async fn require_snapshot(manager: &ConcreteStateManager, workflow_id: &str) -> Result<StateSnapshot> {
    manager.load_state().await.ok_or_else(|| {
        anyhow!(
            "No saved state for workflow '{workflow_id}' in {}",
            manager.store().dir().display()
        )
    })
}

/// Transition log stored in a final snapshot's metadata, if any.
fn persisted_transitions(snapshot: &StateSnapshot) -> Vec<StateTransition> {
    snapshot
        .metadata
        .get("transitions")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default()
}

pub async fn handle_list(state: &AppState, json: bool) -> Result<()> {
    let snapshots = state
        .store
        .list()
        .await
        .map_err(|e| anyhow!("Failed to list snapshots: {e}"))?;

    if json {
        let out: Vec<_> = snapshots
            .iter()
            .map(|s| {
                serde_json::json!({
                    "workflow_id": s.workflow_id,
                    "status": s.state.status.to_string(),
                    "completed": s.state.completed_count(),
                    "total_steps": s.state.total_steps,
                    "errors": s.state.errors.len(),
                    "saved_at": s.timestamp.to_rfc3339(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if snapshots.is_empty() {
        println!();
        println!("  No saved workflows in {}.", state.store.dir().display());
        println!("  Try one with: {}", style("conductor demo").dim());
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Workflow").fg(Color::Cyan),
            Cell::new("Status"),
            Cell::new("Steps"),
            Cell::new("Errors"),
            Cell::new("Saved"),
        ]);

    for s in &snapshots {
        table.add_row(vec![
            Cell::new(&s.workflow_id),
            status_cell(&s.state.status.to_string()),
            Cell::new(format!("{}/{}", s.state.completed_count(), s.state.total_steps)),
            Cell::new(s.state.errors.len()),
            Cell::new(s.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}

pub async fn handle_report(state: &AppState, workflow_id: &str, json: bool) -> Result<()> {
    let manager = state.state_manager(workflow_id);
    let snapshot = require_snapshot(&manager, workflow_id).await?;

    if json {
        let out = serde_json::json!({
            "snapshot": snapshot,
            "metrics": manager.calculate_metrics(&snapshot.state),
            "recoverable": manager.can_recover(&snapshot.state),
            "recovery_point": recovery_index(&snapshot.state),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let transitions = persisted_transitions(&snapshot);
    print!("{}", render_report(&snapshot.state, &transitions));
    Ok(())
}

pub async fn handle_summary(state: &AppState, workflow_id: &str, json: bool) -> Result<()> {
    let manager = state.state_manager(workflow_id);
    let snapshot = require_snapshot(&manager, workflow_id).await?;
    let summary = manager.get_state_summary(&snapshot.state);

    if json {
        let out = serde_json::json!({
            "workflow_id": workflow_id,
            "summary": summary,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{summary}");
    }
    Ok(())
}

pub async fn handle_recover(state: &AppState, workflow_id: &str, json: bool) -> Result<()> {
    let manager = state.state_manager(workflow_id);
    let snapshot = require_snapshot(&manager, workflow_id).await?;
    let ctx = &snapshot.state;
    let point = manager.get_recovery_point(ctx);

    if json {
        let out = serde_json::json!({
            "workflow_id": workflow_id,
            "status": ctx.status.to_string(),
            "recoverable": point.is_some(),
            "recovery_point": recovery_index(ctx),
            "resume_step": point.and_then(|p| ctx.step_results.get(p)).map(|r| r.name.clone()),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    match point {
        Some(p) => {
            let step = ctx
                .step_results
                .get(p)
                .map(|r| format!(" ('{}')", r.name))
                .unwrap_or_default();
            println!(
                "  {} Workflow '{}' is recoverable from step index {}{}",
                style("✓").green(),
                style(workflow_id).cyan(),
                p,
                step
            );
            if let Some(err) = ctx.last_error() {
                println!("    last error: {}", style(&err.message).dim());
            }
        }
        None => {
            println!(
                "  {} Workflow '{}' is not recoverable (status: {})",
                style("✗").red(),
                style(workflow_id).cyan(),
                ctx.status
            );
        }
    }
    println!();
    Ok(())
}

pub async fn handle_clean(state: &AppState, days: Option<u32>, json: bool) -> Result<()> {
    let days = days.unwrap_or(state.config.state.days_to_keep);
    let cutoff = retention_cutoff(days);

    let deleted = state
        .store
        .clean_older_than(cutoff)
        .await
        .with_context(|| format!("Failed to clean {}", state.store.dir().display()))?;

    tracing::info!(deleted, days_to_keep = days, "cleaned old snapshots");

    if json {
        let out = serde_json::json!({ "deleted": deleted, "days_to_keep": days });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!();
        println!(
            "  {} Removed {} snapshot(s) older than {} day(s)",
            style("✓").green(),
            deleted,
            days
        );
        println!();
    }
    Ok(())
}
