//! State manager: snapshots, checkpoints, transition audit and recovery
//! analysis for one workflow id.
//!
//! The manager only ever stores deep copies of the contexts it is handed, so
//! a running workflow and its saved history can never contaminate each other.
//! Persistence is best-effort: every `StoreError` is logged and swallowed.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use conductor_types::state::{StateSnapshot, StateTransition, WorkflowMetrics};
use conductor_types::workflow::WorkflowContext;
use serde_json::Value;

use super::metrics::calculate_metrics;
use super::recovery;
use super::report::{render_report, render_summary};
use super::store::SnapshotStore;

/// Oldest timestamp kept when retaining `days_to_keep` days of snapshots.
///
/// Saturates to `DateTime::<Utc>::MIN_UTC` when the window reaches past the
/// representable range, so nothing is deleted.
pub fn retention_cutoff(days_to_keep: u32) -> DateTime<Utc> {
    TimeDelta::try_days(i64::from(days_to_keep))
        .and_then(|window| Utc::now().checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Snapshot, checkpoint and recovery bookkeeping for one workflow id.
///
/// Generic over `S: SnapshotStore` for storage flexibility.
pub struct StateManager<S: SnapshotStore> {
    workflow_id: String,
    store: S,
    history: Vec<StateSnapshot>,
    checkpoints: HashMap<String, WorkflowContext>,
    transitions: Vec<StateTransition>,
}

impl<S: SnapshotStore> StateManager<S> {
    /// Create a manager for `workflow_id` persisting through `store`.
    pub fn new(workflow_id: impl Into<String>, store: S) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            store,
            history: Vec::new(),
            checkpoints: HashMap::new(),
            transitions: Vec::new(),
        }
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    /// Access the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    /// Snapshot `context`, append it to the in-memory history and persist it,
    /// overwriting the previously persisted snapshot for this workflow id.
    ///
    /// Persistence failures are logged and otherwise ignored.
    pub async fn save_state(
        &mut self,
        context: &WorkflowContext,
        metadata: HashMap<String, Value>,
    ) -> StateSnapshot {
        let snapshot = StateSnapshot::capture(&self.workflow_id, context, metadata);

        match self.store.save(&snapshot).await {
            Ok(()) => tracing::debug!(
                workflow_id = self.workflow_id.as_str(),
                snapshot_id = %snapshot.id,
                step = context.current_step,
                "saved workflow state"
            ),
            Err(e) => tracing::warn!(
                workflow_id = self.workflow_id.as_str(),
                error = %e,
                "failed to persist workflow state"
            ),
        }

        self.history.push(snapshot.clone());
        snapshot
    }

    /// Load the most recently persisted snapshot for this workflow id.
    ///
    /// Missing, unreadable and corrupt snapshots all yield `None`.
    pub async fn load_state(&self) -> Option<StateSnapshot> {
        match self.store.load(&self.workflow_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(
                    workflow_id = self.workflow_id.as_str(),
                    error = %e,
                    "failed to load workflow state, treating as absent"
                );
                None
            }
        }
    }

    /// Snapshots saved through this manager, oldest first.
    pub fn history(&self) -> &[StateSnapshot] {
        &self.history
    }

    /// Delete persisted snapshots older than `days_to_keep` days.
    ///
    /// Returns the number deleted; failures are logged and count as zero.
    pub async fn clean_old_states(&self, days_to_keep: u32) -> usize {
        let cutoff = retention_cutoff(days_to_keep);
        match self.store.clean_older_than(cutoff).await {
            Ok(deleted) => {
                tracing::info!(deleted, days_to_keep, "cleaned old workflow states");
                deleted
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to clean old workflow states");
                0
            }
        }
    }

    // -----------------------------------------------------------------------
    // Checkpoints
    // -----------------------------------------------------------------------

    /// Store a named deep copy of `context`, replacing any checkpoint with
    /// the same name.
    pub fn create_checkpoint(&mut self, name: impl Into<String>, context: &WorkflowContext) {
        let name = name.into();
        tracing::debug!(
            workflow_id = self.workflow_id.as_str(),
            checkpoint = name.as_str(),
            step = context.current_step,
            "created checkpoint"
        );
        self.checkpoints.insert(name, context.clone());
    }

    /// Return a fresh deep copy of the named checkpoint.
    pub fn restore_checkpoint(&self, name: &str) -> Option<WorkflowContext> {
        let restored = self.checkpoints.get(name).cloned();
        if restored.is_none() {
            tracing::debug!(
                workflow_id = self.workflow_id.as_str(),
                checkpoint = name,
                "checkpoint not found"
            );
        }
        restored
    }

    /// Remove a checkpoint. Returns `true` if it existed.
    pub fn delete_checkpoint(&mut self, name: &str) -> bool {
        self.checkpoints.remove(name).is_some()
    }

    /// Names of all checkpoints, sorted.
    pub fn checkpoint_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.checkpoints.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Append an audit entry. Has no effect on control flow.
    pub fn record_transition(
        &mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        reason: Option<String>,
    ) {
        let transition = StateTransition {
            from: from.into(),
            to: to.into(),
            reason,
            timestamp: Utc::now(),
        };
        tracing::debug!(
            workflow_id = self.workflow_id.as_str(),
            from = transition.from.as_str(),
            to = transition.to.as_str(),
            "state transition"
        );
        self.transitions.push(transition);
    }

    pub fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }

    // -----------------------------------------------------------------------
    // Analysis
    // -----------------------------------------------------------------------

    /// See [`recovery::can_recover`].
    pub fn can_recover(&self, context: &WorkflowContext) -> bool {
        recovery::can_recover(context)
    }

    /// See [`recovery::recovery_point`].
    pub fn get_recovery_point(&self, context: &WorkflowContext) -> Option<usize> {
        recovery::recovery_point(context)
    }

    pub fn calculate_metrics(&self, context: &WorkflowContext) -> WorkflowMetrics {
        calculate_metrics(context)
    }

    /// Full text report including this manager's transition history.
    pub fn generate_report(&self, context: &WorkflowContext) -> String {
        render_report(context, &self.transitions)
    }

    pub fn get_state_summary(&self, context: &WorkflowContext) -> String {
        render_summary(context)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::store::InMemorySnapshotStore;
    use conductor_types::error::StoreError;
    use conductor_types::workflow::{StepResult, WorkflowStatus};
    use serde_json::json;

    /// Store whose every operation fails.
    struct BrokenStore;

    impl SnapshotStore for BrokenStore {
        async fn save(&self, _snapshot: &StateSnapshot) -> Result<(), StoreError> {
            Err(StoreError::Io(std::io::Error::other("disk full")))
        }

        async fn load(&self, _workflow_id: &str) -> Result<Option<StateSnapshot>, StoreError> {
            Err(StoreError::Io(std::io::Error::other("permission denied")))
        }

        async fn clean_older_than(
            &self,
            _cutoff: chrono::DateTime<Utc>,
        ) -> Result<usize, StoreError> {
            Err(StoreError::Io(std::io::Error::other("permission denied")))
        }
    }

    fn sample_context() -> WorkflowContext {
        let mut ctx = WorkflowContext::new("checkout", 2);
        let mut step = StepResult::running(1, "login", "shop");
        step.complete(json!({"session": "abc"}));
        ctx.step_results.push(step);
        ctx.data.insert("session".to_string(), json!({"session": "abc"}));
        ctx.current_step = 1;
        ctx.status = WorkflowStatus::Running;
        ctx
    }

    #[tokio::test]
    async fn snapshot_roundtrip() {
        let mut manager = StateManager::new("checkout", InMemorySnapshotStore::new());
        let ctx = sample_context();

        let mut metadata = HashMap::new();
        metadata.insert("reason".to_string(), json!("manual"));
        let saved = manager.save_state(&ctx, metadata).await;

        let loaded = manager.load_state().await.unwrap();
        assert_eq!(loaded.id, saved.id);
        assert_eq!(loaded.state, ctx);
        assert_eq!(loaded.metadata.get("reason"), Some(&json!("manual")));
        assert_eq!(manager.history().len(), 1);
    }

    #[tokio::test]
    async fn latest_save_wins_on_load() {
        let mut manager = StateManager::new("checkout", InMemorySnapshotStore::new());
        let mut ctx = sample_context();
        manager.save_state(&ctx, HashMap::new()).await;
        ctx.current_step = 2;
        ctx.status = WorkflowStatus::Completed;
        manager.save_state(&ctx, HashMap::new()).await;

        let loaded = manager.load_state().await.unwrap();
        assert_eq!(loaded.state.current_step, 2);
        assert_eq!(manager.history().len(), 2);
        assert_eq!(manager.store().len(), 1);
    }

    #[tokio::test]
    async fn snapshot_is_isolated_from_live_context() {
        let mut manager = StateManager::new("checkout", InMemorySnapshotStore::new());
        let mut ctx = sample_context();
        manager.save_state(&ctx, HashMap::new()).await;

        ctx.data.insert("late".to_string(), json!(true));
        assert!(!manager.history()[0].state.data.contains_key("late"));
    }

    #[tokio::test]
    async fn missing_and_corrupt_state_load_as_none() {
        let store = InMemorySnapshotStore::new();
        let manager = StateManager::new("checkout", store);
        assert!(manager.load_state().await.is_none());

        manager.store().insert_raw("checkout", "{\"id\": 12", Utc::now());
        assert!(manager.load_state().await.is_none());
    }

    #[tokio::test]
    async fn persistence_failures_are_swallowed() {
        let mut manager = StateManager::new("checkout", BrokenStore);
        let ctx = sample_context();

        let snapshot = manager.save_state(&ctx, HashMap::new()).await;
        assert_eq!(snapshot.state, ctx);
        assert_eq!(manager.history().len(), 1);
        assert!(manager.load_state().await.is_none());
        assert_eq!(manager.clean_old_states(1).await, 0);
    }

    #[test]
    fn checkpoint_restore_is_a_fresh_copy() {
        let mut manager = StateManager::new("checkout", InMemorySnapshotStore::new());
        let ctx = sample_context();
        manager.create_checkpoint("after-login", &ctx);

        let mut first = manager.restore_checkpoint("after-login").unwrap();
        assert_eq!(first, ctx);
        first.data.insert("mutated".to_string(), json!(1));
        first.step_results.clear();

        let second = manager.restore_checkpoint("after-login").unwrap();
        assert_eq!(second, ctx);
        assert!(manager.restore_checkpoint("missing").is_none());
    }

    #[test]
    fn checkpoint_names_and_delete() {
        let mut manager = StateManager::new("checkout", InMemorySnapshotStore::new());
        let ctx = sample_context();
        manager.create_checkpoint("b", &ctx);
        manager.create_checkpoint("a", &ctx);
        assert_eq!(manager.checkpoint_names(), vec!["a", "b"]);
        assert!(manager.delete_checkpoint("a"));
        assert!(!manager.delete_checkpoint("a"));
        assert_eq!(manager.checkpoint_names(), vec!["b"]);
    }

    #[test]
    fn transitions_appear_in_report() {
        let mut manager = StateManager::new("checkout", InMemorySnapshotStore::new());
        manager.record_transition("pending", "running", Some("run started".to_string()));
        manager.record_transition("running", "failed", None);
        assert_eq!(manager.transitions().len(), 2);

        let ctx = sample_context();
        let report = manager.generate_report(&ctx);
        assert!(report.contains("pending -> running (run started)"));
        assert!(report.contains("running -> failed"));
        assert!(manager.get_state_summary(&ctx).starts_with("checkout [running]"));
    }

    #[tokio::test]
    async fn clean_old_states_counts_deletions() {
        let store = InMemorySnapshotStore::new();
        store.insert_raw("stale", "{}", Utc::now() - chrono::Duration::days(30));
        store.insert_raw("recent", "{}", Utc::now());
        let manager = StateManager::new("checkout", store);

        assert_eq!(manager.clean_old_states(7).await, 1);
        assert_eq!(manager.store().len(), 1);
    }

    #[tokio::test]
    async fn huge_retention_window_deletes_nothing() {
        let store = InMemorySnapshotStore::new();
        store.insert_raw("ancient", "{}", Utc::now() - chrono::Duration::days(36_500));
        let manager = StateManager::new("checkout", store);

        assert_eq!(manager.clean_old_states(u32::MAX).await, 0);
        assert_eq!(manager.store().len(), 1);
        assert_eq!(retention_cutoff(u32::MAX), DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn retention_cutoff_is_days_before_now() {
        let cutoff = retention_cutoff(7);
        let age = Utc::now() - cutoff;
        assert!(age >= TimeDelta::days(7));
        assert!(age < TimeDelta::days(7) + TimeDelta::minutes(1));
    }
}
