//! Configuration types for Conductor.
//!
//! `ConductorConfig` mirrors the optional `conductor.toml` file. Every field
//! has a default, so an empty file (or no file) yields a usable config.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default per-step deadline (5 minutes).
pub const DEFAULT_STEP_TIMEOUT_MS: u64 = 300_000;

/// Default retention for persisted snapshots.
pub const DEFAULT_DAYS_TO_KEEP: u32 = 7;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConductorConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub state: StateConfig,
}

/// Options recognised by the workflow engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Keep executing after a failed step instead of aborting the run.
    #[serde(default)]
    pub continue_on_error: bool,

    /// Invoke the failure hook (screenshot capture etc.) for failed steps.
    #[serde(default)]
    pub capture_screenshots: bool,

    /// Workflow-wide default deadline for a step, in milliseconds.
    #[serde(default = "default_step_timeout_ms")]
    pub step_timeout_ms: u64,

    /// Persist a snapshot after every settled step when a state manager is
    /// attached.
    #[serde(default = "default_true")]
    pub snapshot_each_step: bool,
}

fn default_step_timeout_ms() -> u64 {
    DEFAULT_STEP_TIMEOUT_MS
}

fn default_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            continue_on_error: false,
            capture_screenshots: false,
            step_timeout_ms: default_step_timeout_ms(),
            snapshot_each_step: true,
        }
    }
}

/// Options for the state manager's persistence medium.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// Directory holding one snapshot file per workflow id.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// Retention used by `clean` when no explicit value is given.
    #[serde(default = "default_days_to_keep")]
    pub days_to_keep: u32,
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".conductor/state")
}

fn default_days_to_keep() -> u32 {
    DEFAULT_DAYS_TO_KEEP
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            days_to_keep: default_days_to_keep(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ConductorConfig::default();
        assert!(!config.engine.continue_on_error);
        assert!(!config.engine.capture_screenshots);
        assert_eq!(config.engine.step_timeout_ms, 300_000);
        assert!(config.engine.snapshot_each_step);
        assert_eq!(config.state.days_to_keep, 7);
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config: ConductorConfig = toml::from_str("").unwrap();
        assert_eq!(config.engine.step_timeout_ms, DEFAULT_STEP_TIMEOUT_MS);
        assert_eq!(config.state.state_dir, PathBuf::from(".conductor/state"));
    }

    #[test]
    fn partial_toml_overrides() {
        let toml_str = r#"
[engine]
continue_on_error = true
step_timeout_ms = 2500

[state]
state_dir = "/tmp/conductor"
"#;
        let config: ConductorConfig = toml::from_str(toml_str).unwrap();
        assert!(config.engine.continue_on_error);
        assert_eq!(config.engine.step_timeout_ms, 2500);
        assert!(config.engine.snapshot_each_step);
        assert_eq!(config.state.state_dir, PathBuf::from("/tmp/conductor"));
        assert_eq!(config.state.days_to_keep, DEFAULT_DAYS_TO_KEEP);
    }
}
