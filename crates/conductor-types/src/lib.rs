//! Shared domain types for Conductor.
//!
//! Workflow contexts, step results, snapshots, metrics and configuration.
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod state;
pub mod workflow;
