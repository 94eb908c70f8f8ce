//! Application state shared by the CLI commands.
//!
//! Pins the state manager to the filesystem snapshot store.

use std::path::Path;

use conductor_core::state::manager::StateManager;
use conductor_infra::config::{load_config, resolve_config_path};
use conductor_infra::state::file_store::FileSnapshotStore;
use conductor_types::config::ConductorConfig;

pub type ConcreteStateManager = StateManager<FileSnapshotStore>;

pub struct AppState {
    pub config: ConductorConfig,
    pub store: FileSnapshotStore,
}

impl AppState {
    /// Load configuration and open the snapshot directory.
    ///
    /// `state_dir` overrides the configured directory when given.
    pub async fn init(config_path: Option<&Path>, state_dir: Option<&Path>) -> anyhow::Result<Self> {
        let path = resolve_config_path(config_path);
        let mut config = load_config(&path).await;
        if let Some(dir) = state_dir {
            config.state.state_dir = dir.to_path_buf();
        }

        tracing::debug!(
            config = %path.display(),
            state_dir = %config.state.state_dir.display(),
            "conductor initialized"
        );

        let store = FileSnapshotStore::new(config.state.state_dir.clone());
        Ok(Self { config, store })
    }

    /// A state manager for `workflow_id` backed by the shared store.
    pub fn state_manager(&self, workflow_id: &str) -> ConcreteStateManager {
        StateManager::new(workflow_id, self.store.clone())
    }
}
