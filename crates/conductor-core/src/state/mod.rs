//! Workflow state: snapshots, checkpoints, transitions and analysis.
//!
//! - `store` -- `SnapshotStore` port and the in-memory store
//! - `manager` -- per-workflow `StateManager`
//! - `recovery` -- recoverability and resume point
//! - `metrics` -- derived execution metrics
//! - `report` -- human-readable report and summary

pub mod manager;
pub mod metrics;
pub mod recovery;
pub mod report;
pub mod store;
