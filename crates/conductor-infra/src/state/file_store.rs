//! Filesystem snapshot store.
//!
//! Implements the `SnapshotStore` trait from `conductor-core` with one JSON
//! file per workflow id:
//!
//! ```text
//! {state_dir}/
//!   checkout-flow.json
//!   nightly_import.json
//! ```
//!
//! Each save overwrites the workflow's file. Writes go to a temporary file in
//! the same directory first and are renamed into place.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use conductor_core::state::store::SnapshotStore;
use conductor_types::error::StoreError;
use conductor_types::state::StateSnapshot;

const SNAPSHOT_EXT: &str = "json";

/// Snapshot store rooted at a state directory.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    /// Create a store rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the snapshot file for `workflow_id`.
    pub fn snapshot_path(&self, workflow_id: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{SNAPSHOT_EXT}", sanitize_file_stem(workflow_id)))
    }

    /// Load every readable snapshot in the directory, newest first.
    ///
    /// Files that cannot be read or decoded are skipped with a warning.
    pub async fn list(&self) -> Result<Vec<StateSnapshot>, StoreError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut snapshots = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !is_snapshot_file(&path) {
                continue;
            }
            let content = match tokio::fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping unreadable snapshot");
                    continue;
                }
            };
            match serde_json::from_str::<StateSnapshot>(&content) {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping unreadable snapshot");
                }
            }
        }

        snapshots.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(snapshots)
    }
}

impl SnapshotStore for FileSnapshotStore {
    async fn save(&self, snapshot: &StateSnapshot) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let json = serde_json::to_string_pretty(snapshot)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let path = self.snapshot_path(&snapshot.workflow_id);
        let tmp = path.with_extension(format!("{SNAPSHOT_EXT}.tmp"));
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;

        tracing::debug!(
            workflow = snapshot.workflow_id.as_str(),
            path = %path.display(),
            "snapshot written"
        );
        Ok(())
    }

    async fn load(&self, workflow_id: &str) -> Result<Option<StateSnapshot>, StoreError> {
        let path = self.snapshot_path(workflow_id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let snapshot: StateSnapshot =
            serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
                workflow_id: workflow_id.to_string(),
                reason: e.to_string(),
            })?;

        // Two ids can sanitize to the same file name.
        if snapshot.workflow_id != workflow_id {
            tracing::debug!(
                requested = workflow_id,
                found = snapshot.workflow_id.as_str(),
                "snapshot file belongs to a different workflow"
            );
            return Ok(None);
        }
        Ok(Some(snapshot))
    }

    async fn clean_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err.into()),
        };

        let mut candidates = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if is_snapshot_file(&path) {
                candidates.push(path);
            }
        }
        Ok(remove_stale_files(&candidates, cutoff).await)
    }
}

/// Delete every file in `paths` last modified before `cutoff`.
///
/// Per-file failures are logged and skipped; returns the number deleted.
async fn remove_stale_files(paths: &[PathBuf], cutoff: DateTime<Utc>) -> usize {
    let mut deleted = 0;
    for path in paths {
        match remove_if_stale(path, cutoff).await {
            Ok(true) => {
                tracing::debug!(path = %path.display(), "removed stale snapshot");
                deleted += 1;
            }
            Ok(false) => {}
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "failed to remove stale snapshot");
            }
        }
    }
    deleted
}

async fn remove_if_stale(path: &Path, cutoff: DateTime<Utc>) -> std::io::Result<bool> {
    let modified: DateTime<Utc> = tokio::fs::metadata(path).await?.modified()?.into();
    if modified >= cutoff {
        return Ok(false);
    }
    tokio::fs::remove_file(path).await?;
    Ok(true)
}

/// Map a workflow id onto a safe file stem.
///
/// ASCII alphanumerics, `-`, `_` and `.` are kept; everything else becomes
/// `_`. Leading dots are replaced so ids never produce hidden files or `..`.
pub fn sanitize_file_stem(workflow_id: &str) -> String {
    let mut stem: String = workflow_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if stem.starts_with('.') {
        stem.replace_range(..1, "_");
    }
    if stem.is_empty() {
        stem.push('_');
    }
    stem
}

fn is_snapshot_file(path: &Path) -> bool {
    path.is_file() && path.extension().is_some_and(|ext| ext == SNAPSHOT_EXT)
}
