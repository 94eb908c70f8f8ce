//! Snapshot persistence port.
//!
//! Defines the storage interface the state manager writes through. The
//! infrastructure layer (conductor-infra) implements it on the filesystem;
//! `InMemorySnapshotStore` backs tests and ephemeral runs.

use std::future::Future;

use chrono::{DateTime, Utc};
use conductor_types::error::StoreError;
use conductor_types::state::StateSnapshot;
use dashmap::DashMap;

/// Storage for the current snapshot of each workflow id.
///
/// Saving overwrites any previous snapshot for the same workflow id; there is
/// no on-disk history.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait SnapshotStore: Send + Sync {
    /// Persist `snapshot`, replacing the stored one for its workflow id.
    fn save(
        &self,
        snapshot: &StateSnapshot,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Load the stored snapshot for `workflow_id`, if any.
    ///
    /// Returns `StoreError::Corrupt` when stored bytes cannot be decoded.
    fn load(
        &self,
        workflow_id: &str,
    ) -> impl Future<Output = Result<Option<StateSnapshot>, StoreError>> + Send;

    /// Delete every stored snapshot last written before `cutoff`.
    ///
    /// Returns the number of snapshots deleted.
    fn clean_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> impl Future<Output = Result<usize, StoreError>> + Send;
}

// ---------------------------------------------------------------------------
// InMemorySnapshotStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct StoredSnapshot {
    json: String,
    written_at: DateTime<Utc>,
}

/// Process-local snapshot store.
///
/// Snapshots are kept as serialized JSON so loads exercise the same decoding
/// path as a durable store.
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    entries: DashMap<String, StoredSnapshot>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of workflow ids with a stored snapshot.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Store raw bytes for `workflow_id` as if written at `written_at`.
    pub fn insert_raw(&self, workflow_id: &str, json: impl Into<String>, written_at: DateTime<Utc>) {
        self.entries.insert(
            workflow_id.to_string(),
            StoredSnapshot {
                json: json.into(),
                written_at,
            },
        );
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    async fn save(&self, snapshot: &StateSnapshot) -> Result<(), StoreError> {
        let json = serde_json::to_string(snapshot)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.insert_raw(&snapshot.workflow_id, json, Utc::now());
        Ok(())
    }

    async fn load(&self, workflow_id: &str) -> Result<Option<StateSnapshot>, StoreError> {
        let Some(entry) = self.entries.get(workflow_id) else {
            return Ok(None);
        };
        serde_json::from_str(&entry.json)
            .map(Some)
            .map_err(|e| StoreError::Corrupt {
                workflow_id: workflow_id.to_string(),
                reason: e.to_string(),
            })
    }

    async fn clean_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let before = self.entries.len();
        self.entries.retain(|_, stored| stored.written_at >= cutoff);
        Ok(before - self.entries.len())
    }
}
